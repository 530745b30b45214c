//! # Rowshuffle
//!
//! **Randomized, chunked, memory-bounded iteration** over collections of
//! columnar files. Rowshuffle is meant for feeding training loops from large
//! Parquet datasets: every row is delivered exactly once per pass, in an order
//! that is shuffled at chunk granularity, while only one chunk of rows per
//! file is ever resident.
//!
//! ## Key Features
//!
//! - **Lazy everything** - files open on first use, metadata is decoded once
//!   and cached, rows are decoded one chunk at a time as they are pulled
//! - **Chunk shuffling** - the row space of each file is split into contiguous
//!   chunks whose order is permuted; rows within a chunk keep file order
//! - **Multi-file interleave** - rows from many files are merged either by
//!   concatenation or by picking a random active file for every row
//! - **Exactly once** - both modes yield each row of each file exactly once
//! - **Reproducible** - a single `seed` fixes the full traversal
//! - **Pluggable decoding** - the [`RowDecoder`] trait separates iteration
//!   from the file format; Parquet ships behind the `io-parquet` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use rowshuffle::*;
//! # use anyhow::Result;
//! # #[derive(serde::Deserialize)]
//! # struct Sample { id: u64, label: String }
//!
//! # fn main() -> Result<()> {
//! let mut reader = MultiFileReader::open_pattern(
//!     "data/train-*.parquet",
//!     ParquetDecoder::<Sample>::new(),
//! )?;
//! println!("epoch size: {}", reader.row_count()?);
//!
//! for epoch in 0..3 {
//!     let opts = IterOptions::new().shuffled(true).with_seed(epoch);
//!     for row in reader.iter(&opts)? {
//!         let sample = row?;
//!         // train on sample
//! #       let _ = (sample.id, sample.label);
//!     }
//! }
//! reader.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Chunk plan
//!
//! A file of `N` rows read with chunk size `C` is covered by `ceil(N / C)`
//! half-open ranges `[i*C, min((i+1)*C, N))`. See [`chunk_plan`].
//!
//! ### Readers
//!
//! [`SingleFileReader`] owns one file; [`MultiFileReader`] owns an ordered
//! list of them. Both go `Unopened -> Open -> Closed`, and a closed reader
//! rejects every call except `close` with [`ReaderError::Closed`].
//!
//! ### Row sequences
//!
//! `iter` returns a plain [`Iterator`] of `Result<Row>`: [`ChunkedRows`] for one
//! file and [`GroupRows`] for a group. An error is yielded once and ends the
//! sequence. Dropping a sequence early performs no further I/O.
//!
//! ### Options
//!
//! [`IterOptions`] carries `shuffle`, `chunk_size`, `seed`, the member
//! [`Selection`] policy and the decoder's own options. It deserializes from
//! JSON with defaults for missing fields.
//!
//! ## Feature Flags
//!
//! - `io-parquet` (default) - [`ParquetDecoder`] and the typed Parquet writers
//!
//! ## Module Overview
//!
//! - [`plan`] - chunk plan generation
//! - [`io`] - byte source, glob expansion, Parquet binding
//! - [`decode`] - the [`RowDecoder`] trait
//! - [`reader`] - readers and row sequences
//! - [`options`] - iteration options
//! - [`error`] - error type
//! - [`testing`] - fixtures, instrumented decoders and assertions for tests

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod decode;
pub mod error;
pub mod io;
pub mod options;
pub mod plan;
pub mod reader;
pub mod testing;

// General re-exports
pub use decode::RowDecoder;
pub use error::{ErrorKind, ReaderError, Result};
pub use io::ByteSource;
pub use io::glob::{expand_glob, is_glob_pattern};
pub use options::{IterOptions, Selection, DEFAULT_CHUNK_SIZE};
pub use plan::{chunk_plan, chunk_starts, ChunkRange};
pub use reader::{ChunkedRows, GroupRows, MultiFileReader, SingleFileReader};

// Gated re-exports
#[cfg(feature = "io-parquet")]
pub use io::parquet::{
    write_parquet_row_groups, write_parquet_vec, ParquetDecoder, ParquetFileMetadata,
    ParquetReadOptions,
};
