//! The seam between the iteration engine and a columnar decoder.
//!
//! Readers never parse file contents themselves. They hand an open
//! [`ByteSource`] to a [`RowDecoder`], which extracts metadata once per file
//! and then decodes arbitrary row sub-ranges on demand. The parquet binding
//! lives in [`crate::io::parquet`]; tests wrap decoders to count or fail calls.

use crate::error::Result;
use crate::io::ByteSource;
use crate::plan::ChunkRange;
use std::fmt::Debug;

/// A decoder for one columnar file format.
///
/// Implementations must be able to decode any valid sub-range of the row
/// space, returning exactly `range.len()` rows in ascending index order, with
/// memory proportional to the range length.
pub trait RowDecoder: Send + Sync {
    /// Parsed footer/metadata, cached by the reader for the file's lifetime.
    type Metadata: Clone + Send + Sync;
    /// A decoded row.
    type Row: Send;
    /// Opaque option bag forwarded unchanged from the iteration options.
    type Options: Clone + Default + Debug + Send + Sync;

    /// Parse the file's metadata.
    ///
    /// # Errors
    ///
    /// Returns a format error if the content is not valid for this decoder, or
    /// an I/O error if the bytes cannot be read.
    fn read_metadata(&self, source: &ByteSource) -> Result<Self::Metadata>;

    /// Total number of rows described by `metadata`.
    fn row_count(&self, metadata: &Self::Metadata) -> u64;

    /// Decode the rows in `range`.
    ///
    /// # Errors
    ///
    /// Returns a format or decode error if the row data cannot be decoded, or
    /// an I/O error if the bytes cannot be read.
    fn read_rows(
        &self,
        source: &ByteSource,
        metadata: &Self::Metadata,
        range: ChunkRange,
        options: &Self::Options,
    ) -> Result<Vec<Self::Row>>;
}
