//! File globbing for building multi-file readers from a pattern.
//!
//! Matches are returned sorted so that a group reader built from a pattern has
//! a deterministic member order, which concatenation mode relies on.
//!
//! ```no_run
//! use rowshuffle::io::glob::expand_glob;
//!
//! let shards = expand_glob("data/train/part-*.parquet")?;
//! # Ok::<(), rowshuffle::ReaderError>(())
//! ```

use crate::error::{ReaderError, Result};
use glob::glob;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

static GLOB_META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*?\[]").expect("valid glob regex"));

/// Whether `pattern` contains glob metacharacters (`*`, `?` or `[`).
#[must_use]
pub fn is_glob_pattern(pattern: &str) -> bool {
    GLOB_META.is_match(pattern)
}

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories are skipped. No matches yields an empty vector.
///
/// # Errors
///
/// Returns [`ReaderError::InvalidOptions`] if the pattern is malformed, or
/// [`ReaderError::Io`] if a matched entry cannot be inspected.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).map_err(|e| {
        ReaderError::invalid_options(format!("invalid glob pattern {pattern}: {e}"))
    })?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            ReaderError::io(path, e.into())
        })?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// Like [`expand_glob`], but zero matches is an error.
///
/// # Errors
///
/// As [`expand_glob`], plus [`ReaderError::NoFiles`] when nothing matches.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        return Err(ReaderError::NoFiles {
            pattern: pattern.to_string(),
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, create_dir_all};

    #[test]
    fn detects_metacharacters() {
        assert!(is_glob_pattern("data/*.parquet"));
        assert!(is_glob_pattern("part-?.parquet"));
        assert!(is_glob_pattern("part-[0-3].parquet"));
        assert!(!is_glob_pattern("data/part-0.parquet"));
    }

    #[test]
    fn expands_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.parquet", "a.parquet", "c.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        create_dir_all(dir.path().join("d.parquet")).unwrap();

        let pattern = format!("{}/*.parquet", dir.path().display());
        let files = expand_glob(&pattern).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.parquet", "b.parquet"]);
    }

    #[test]
    fn required_fails_on_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.parquet", dir.path().display());
        assert!(expand_glob(&pattern).unwrap().is_empty());
        assert!(matches!(
            expand_glob_required(&pattern),
            Err(ReaderError::NoFiles { .. })
        ));
    }

    #[test]
    fn malformed_pattern() {
        assert!(expand_glob("data/[.parquet").is_err());
    }
}
