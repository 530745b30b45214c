//! Iteration options shared by both reader kinds.
//!
//! Options are plain serde structs so they can live in a job's JSON config:
//!
//! ```
//! use rowshuffle::options::{IterOptions, Selection};
//!
//! let opts: IterOptions<()> =
//!     IterOptions::from_json_str(r#"{ "shuffle": true, "chunk_size": 64, "seed": 7 }"#).unwrap();
//! assert!(opts.shuffle);
//! assert_eq!(opts.chunk_size, 64);
//! assert_eq!(opts.selection, Selection::Uniform);
//! ```

use crate::error::{ReaderError, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of rows decoded per chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 128;

/// How a shuffled group iterator chooses the member that supplies the next row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Every still-active file is equally likely, regardless of rows left.
    #[default]
    Uniform,
    /// Files are picked in proportion to their remaining rows, which makes each
    /// remaining row equally likely to come next.
    Weighted,
}

/// Options for [`SingleFileReader::iter`](crate::reader::SingleFileReader::iter)
/// and [`MultiFileReader::iter`](crate::reader::MultiFileReader::iter).
///
/// `O` is the decoder's own option bag; it is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterOptions<O> {
    /// Shuffle chunk order within each file, and interleave files at random.
    pub shuffle: bool,
    /// Rows per decode call. Must be at least 1.
    pub chunk_size: u64,
    /// Seed for all randomness. `None` draws from the OS.
    pub seed: Option<u64>,
    /// Member selection policy for shuffled group iteration.
    pub selection: Selection,
    /// Decoder-specific options.
    pub decoder: O,
}

impl<O: Default> Default for IterOptions<O> {
    fn default() -> Self {
        Self {
            shuffle: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            seed: None,
            selection: Selection::Uniform,
            decoder: O::default(),
        }
    }
}

impl<O: Default> IterOptions<O> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O> IterOptions<O> {
    #[must_use]
    pub const fn shuffled(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    #[must_use]
    pub fn with_decoder_options(mut self, decoder: O) -> Self {
        self.decoder = decoder;
        self
    }

    /// Check invariants that cannot be expressed in the type.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidOptions`] if `chunk_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ReaderError::invalid_options("chunk_size must be at least 1"));
        }
        Ok(())
    }

    /// Build the RNG described by `seed`.
    #[must_use]
    pub fn rng(&self) -> ChaCha8Rng {
        self.seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64)
    }
}

impl<O: DeserializeOwned + Default> IterOptions<O> {
    /// Parse options from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidOptions`] if the JSON is malformed or the
    /// parsed options fail [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| ReaderError::invalid_options(format!("parse options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read and parse a JSON options file.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Io`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ReaderError::io(path, e))?;
        Self::from_json_str(&text)
    }
}
