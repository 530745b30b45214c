//! Pre-built datasets whose rows identify their own origin.

use serde::{Deserialize, Serialize};
#[cfg(feature = "io-parquet")]
use std::path::{Path, PathBuf};

/// A row that records which file it came from and its position in that file.
///
/// Iterating fixtures made of these rows lets tests check completeness and
/// ordering without any side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexedRow {
    pub file: u32,
    pub index: u64,
}

/// Rows `0..n` of file `file`, in file order.
///
/// ```
/// use rowshuffle::testing::indexed_rows;
///
/// let rows = indexed_rows(2, 3);
/// assert_eq!(rows.len(), 3);
/// assert!(rows.iter().all(|r| r.file == 2));
/// assert_eq!(rows[2].index, 2);
/// ```
#[must_use]
pub fn indexed_rows(file: u32, n: u64) -> Vec<IndexedRow> {
    (0..n).map(|index| IndexedRow { file, index }).collect()
}

/// Conventional file name for fixture file number `file`.
#[must_use]
pub fn fixture_file_name(file: u32) -> String {
    format!("part-{file:05}.parquet")
}

/// Write `indexed_rows(file, n)` to `dir` as Parquet, with a new row group
/// every `rows_per_group` rows. Returns the file path.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
#[cfg(feature = "io-parquet")]
pub fn write_indexed_parquet(
    dir: &Path,
    file: u32,
    n: u64,
    rows_per_group: usize,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(fixture_file_name(file));
    crate::io::parquet::write_parquet_row_groups(&path, &indexed_rows(file, n), rows_per_group)?;
    Ok(path)
}

/// Write one fixture file per entry of `sizes` (file numbers `0..`), returning
/// their paths in order.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
#[cfg(feature = "io-parquet")]
pub fn write_indexed_dataset(
    dir: &Path,
    sizes: &[u64],
    rows_per_group: usize,
) -> anyhow::Result<Vec<PathBuf>> {
    sizes
        .iter()
        .zip(0u32..)
        .map(|(&n, file)| write_indexed_parquet(dir, file, n, rows_per_group))
        .collect()
}
