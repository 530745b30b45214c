//! Readers: the per-file reader, the group reader and their lazy row sequences.
//!
//! Both reader kinds move through the same lifecycle:
//!
//! ```text
//! Unopened --first metadata/row_count/iter--> Open --close--> Closed
//! ```
//!
//! `Closed` is terminal. `close` is idempotent; anything else on a closed
//! reader fails with [`ReaderError::Closed`](crate::ReaderError::Closed).
//!
//! # Example
//!
//! ```no_run
//! use rowshuffle::io::parquet::ParquetDecoder;
//! use rowshuffle::{IterOptions, MultiFileReader};
//! # #[derive(serde::Deserialize)]
//! # struct Sample { id: u64 }
//!
//! let mut reader = MultiFileReader::open_pattern("train/*.parquet", ParquetDecoder::<Sample>::new())?;
//! println!("{} rows", reader.row_count()?);
//!
//! let opts = IterOptions::new().shuffled(true).with_chunk_size(256).with_seed(17);
//! for row in reader.iter(&opts)? {
//!     let sample = row?;
//!     // feed the training step
//! #   let _ = sample.id;
//! }
//! reader.close()?;
//! # Ok::<(), rowshuffle::ReaderError>(())
//! ```

mod chunked;
mod multi;
mod single;

pub use chunked::ChunkedRows;
pub use multi::{GroupRows, MultiFileReader};
pub use single::SingleFileReader;
