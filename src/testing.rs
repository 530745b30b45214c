//! Testing utilities for code built on the readers.
//!
//! - **Fixtures**: [`IndexedRow`] datasets where every row names its file and
//!   position, written to Parquet with a chosen row-group layout
//! - **Instrumented decoders**: [`CountingDecoder`] records every metadata and
//!   chunk call, [`FaultyDecoder`] injects failures at a chosen call
//! - **Assertions**: exactly-once and per-file ordering checks
//!
//! ```no_run
//! use rowshuffle::testing::*;
//! use rowshuffle::io::parquet::ParquetDecoder;
//! use rowshuffle::{IterOptions, SingleFileReader};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let path = write_indexed_parquet(dir.path(), 0, 1000, 100)?;
//!
//! let decoder = CountingDecoder::new(ParquetDecoder::<IndexedRow>::new());
//! let calls = decoder.calls();
//! let mut reader = SingleFileReader::new(&path, decoder);
//! let rows = reader
//!     .iter(&IterOptions::new().shuffled(true).with_seed(3))?
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! assert_exactly_once(&rows, &indexed_rows(0, 1000));
//! assert_eq!(calls.chunk_reads(), 8);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod decoders;
pub mod fixtures;

pub use assertions::*;
pub use decoders::*;
pub use fixtures::*;
