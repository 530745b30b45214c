//! Parquet binding for the iteration engine.
//!
//! This module provides:
//! - **Byte access**: [`ByteSource`] implements parquet's [`ChunkReader`], so the
//!   arrow reader pulls pages through the reader-owned handle.
//! - **Row decoding**: [`ParquetDecoder<T>`] loads [`ArrowReaderMetadata`] once
//!   and decodes any `[start, end)` row range into typed rows via `serde_arrow`.
//!   Only the row groups overlapping the range are fetched, and a
//!   [`RowSelection`] trims the edges.
//! - **Typed writing**: [`write_parquet_vec`] and [`write_parquet_row_groups`]
//!   for producing datasets and test fixtures.

use crate::decode::RowDecoder;
use crate::error::{ReaderError, Result};
use crate::io::ByteSource;
use crate::plan::ChunkRange;
use arrow::datatypes::FieldRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{
    ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder, RowSelection,
    RowSelector,
};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::errors::ParquetError;
use parquet::file::metadata::ParquetMetaData;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{ChunkReader, Length};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};
use serde_arrow::{from_record_batch, to_record_batch};
use std::fs::File;
use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// ChunkReader over ByteSource
// ============================================================================

impl Length for ByteSource {
    fn len(&self) -> u64 {
        self.size()
    }
}

impl ChunkReader for ByteSource {
    type T = RangeReader;

    fn get_read(&self, start: u64) -> parquet::errors::Result<Self::T> {
        Ok(RangeReader {
            source: self.clone(),
            pos: start,
        })
    }

    fn get_bytes(&self, start: u64, length: usize) -> parquet::errors::Result<Bytes> {
        let end = start.saturating_add(length as u64);
        let data = self
            .read_range(start, end)
            .map_err(|e| ParquetError::External(Box::new(e)))?;
        if data.len() < length {
            return Err(ParquetError::EOF(format!(
                "expected {length} bytes at offset {start} in {}, got {}",
                self.path().display(),
                data.len()
            )));
        }
        Ok(Bytes::from(data))
    }
}

/// Sequential reader from a fixed offset to the end of a [`ByteSource`].
pub struct RangeReader {
    source: ByteSource,
    pos: u64,
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let end = self.pos.saturating_add(buf.len() as u64);
        let data = self
            .source
            .read_range(self.pos, end)
            .map_err(std::io::Error::other)?;
        buf[..data.len()].copy_from_slice(&data);
        self.pos += data.len() as u64;
        Ok(data.len())
    }
}

/// Map a parquet error to a reader error, recovering byte-source failures that
/// travelled through parquet as `External`.
fn from_parquet(
    source: &ByteSource,
    err: ParquetError,
    fallback: impl FnOnce(String) -> ReaderError,
) -> ReaderError {
    if source.is_closed() {
        return ReaderError::closed(source.path());
    }
    match err {
        ParquetError::External(inner) => from_external(source, inner, fallback),
        other => fallback(other.to_string()),
    }
}

/// Map an arrow error raised while decoding `range`. Errors that started in the
/// byte source keep their I/O classification.
fn from_arrow(source: &ByteSource, range: ChunkRange, err: ArrowError) -> ReaderError {
    if source.is_closed() {
        return ReaderError::closed(source.path());
    }
    let fallback = |m: String| ReaderError::decode(source.path(), range, m);
    match err {
        ArrowError::ExternalError(inner) => match inner.downcast::<ParquetError>() {
            Ok(parquet_err) => from_parquet(source, *parquet_err, fallback),
            Err(other) => from_external(source, other, fallback),
        },
        ArrowError::IoError(_, io) => from_io(source, io),
        other => fallback(other.to_string()),
    }
}

fn from_external(
    source: &ByteSource,
    inner: Box<dyn std::error::Error + Send + Sync>,
    fallback: impl FnOnce(String) -> ReaderError,
) -> ReaderError {
    match inner.downcast::<ReaderError>() {
        Ok(reader_err) => *reader_err,
        Err(other) => match other.downcast::<std::io::Error>() {
            Ok(io) => from_io(source, *io),
            Err(other) => fallback(other.to_string()),
        },
    }
}

/// `RangeReader` smuggles reader errors through `std::io::Error`; unwrap them.
fn from_io(source: &ByteSource, io: std::io::Error) -> ReaderError {
    if io.get_ref().is_some_and(|e| e.is::<ReaderError>()) {
        if let Some(Ok(reader_err)) = io.into_inner().map(|e| e.downcast::<ReaderError>()) {
            return *reader_err;
        }
        return ReaderError::io(source.path(), std::io::Error::other("byte source failure"));
    }
    ReaderError::io(source.path(), io)
}

// ============================================================================
// Decoder
// ============================================================================

/// Options forwarded to the arrow reader for each chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetReadOptions {
    /// Leaf column names to decode. `None` decodes every column.
    pub columns: Option<Vec<String>>,
    /// Maximum rows per arrow batch while decoding a chunk.
    pub batch_size: usize,
}

impl Default for ParquetReadOptions {
    fn default() -> Self {
        Self {
            columns: None,
            batch_size: 8 * 1024,
        }
    }
}

/// Decodes Parquet rows into `T` through Arrow and `serde_arrow`.
///
/// `T` must deserialize from the (projected) Arrow schema of the file.
pub struct ParquetDecoder<T> {
    _t: PhantomData<fn() -> T>,
}

impl<T> ParquetDecoder<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { _t: PhantomData }
    }
}

impl<T> Default for ParquetDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ParquetDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ParquetDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetDecoder")
            .field("row", &std::any::type_name::<T>())
            .finish()
    }
}

/// Parquet footer metadata, checked for consistent row counts.
#[derive(Debug, Clone)]
pub struct ParquetFileMetadata {
    arrow: ArrowReaderMetadata,
    rows: u64,
    group_rows: Vec<u64>,
}

impl ParquetFileMetadata {
    /// Validate the row counts in `arrow`.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Format`] if the file or any row group declares a
    /// negative row count, or if the row groups do not add up to the file total.
    pub fn try_new(path: &Path, arrow: ArrowReaderMetadata) -> Result<Self> {
        let meta = arrow.metadata();
        let group_rows = meta
            .row_groups()
            .iter()
            .enumerate()
            .map(|(i, g)| {
                u64::try_from(g.num_rows()).map_err(|_| {
                    ReaderError::format(
                        path,
                        format!("row group {i} declares {} rows", g.num_rows()),
                    )
                })
            })
            .collect::<Result<Vec<u64>>>()?;

        let declared = meta.file_metadata().num_rows();
        let rows = u64::try_from(declared)
            .map_err(|_| ReaderError::format(path, format!("file declares {declared} rows")))?;
        let summed: u64 = group_rows.iter().sum();
        if summed != rows {
            return Err(ReaderError::format(
                path,
                format!("file declares {rows} rows but its row groups hold {summed}"),
            ));
        }
        Ok(Self {
            arrow,
            rows,
            group_rows,
        })
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<ParquetMetaData> {
        self.arrow.metadata()
    }

    #[must_use]
    pub const fn arrow(&self) -> &ArrowReaderMetadata {
        &self.arrow
    }

    #[must_use]
    pub const fn row_count(&self) -> u64 {
        self.rows
    }

    /// Row count of every row group, in file order.
    #[must_use]
    pub fn row_group_rows(&self) -> &[u64] {
        &self.group_rows
    }
}

/// Row groups overlapping `range` and the selection that trims them to it.
///
/// `group_rows` holds the row count of every row group in file order.
fn plan_selection(group_rows: &[u64], range: ChunkRange) -> (Vec<usize>, RowSelection) {
    let mut groups = Vec::new();
    let mut first_offset = None;
    let mut selected_rows = 0u64;
    let mut offset = 0u64;
    for (i, &n) in group_rows.iter().enumerate() {
        let group = ChunkRange::new(offset, offset + n);
        if n > 0 && group.start < range.end && group.end > range.start {
            groups.push(i);
            first_offset.get_or_insert(group.start);
            selected_rows += n;
        }
        offset = group.end;
    }

    let first = first_offset.unwrap_or(range.start);
    let lead = range.start - first;
    let trail = selected_rows.saturating_sub(lead + range.len());
    let mut selectors = Vec::with_capacity(3);
    if lead > 0 {
        selectors.push(RowSelector::skip(to_usize(lead)));
    }
    selectors.push(RowSelector::select(to_usize(range.len())));
    if trail > 0 {
        selectors.push(RowSelector::skip(to_usize(trail)));
    }
    (groups, RowSelection::from(selectors))
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

impl<T> RowDecoder for ParquetDecoder<T>
where
    T: DeserializeOwned + Send,
{
    type Metadata = ParquetFileMetadata;
    type Row = T;
    type Options = ParquetReadOptions;

    fn read_metadata(&self, source: &ByteSource) -> Result<Self::Metadata> {
        let arrow = ArrowReaderMetadata::load(source, ArrowReaderOptions::new()).map_err(|e| {
            from_parquet(source, e, |m| ReaderError::format(source.path(), m))
        })?;
        let meta = ParquetFileMetadata::try_new(source.path(), arrow)?;
        debug!(
            path = %source.path().display(),
            rows = meta.row_count(),
            row_groups = meta.row_group_rows().len(),
            "loaded parquet metadata"
        );
        Ok(meta)
    }

    fn row_count(&self, metadata: &Self::Metadata) -> u64 {
        metadata.row_count()
    }

    fn read_rows(
        &self,
        source: &ByteSource,
        metadata: &Self::Metadata,
        range: ChunkRange,
        options: &Self::Options,
    ) -> Result<Vec<Self::Row>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let total = metadata.row_count();
        if range.end > total {
            return Err(ReaderError::format(
                source.path(),
                format!("row range {range} exceeds row count {total}"),
            ));
        }

        let (groups, selection) = plan_selection(metadata.row_group_rows(), range);

        let mut builder = ParquetRecordBatchReaderBuilder::new_with_metadata(
            source.clone(),
            metadata.arrow().clone(),
        );
        if let Some(columns) = &options.columns {
            let mask = ProjectionMask::columns(
                builder.parquet_schema(),
                columns.iter().map(String::as_str),
            );
            builder = builder.with_projection(mask);
        }
        let reader = builder
            .with_row_groups(groups)
            .with_row_selection(selection)
            .with_batch_size(options.batch_size.max(1))
            .build()
            .map_err(|e| from_parquet(source, e, |m| ReaderError::format(source.path(), m)))?;

        let mut out: Vec<T> = Vec::with_capacity(to_usize(range.len()));
        for batch in reader {
            let batch = batch.map_err(|e| from_arrow(source, range, e))?;
            let mut rows: Vec<T> = from_record_batch(&batch).map_err(|e| {
                ReaderError::decode(source.path(), range, format!("deserialize rows: {e}"))
            })?;
            out.append(&mut rows);
        }
        Ok(out)
    }
}

// ============================================================================
// Writing
// ============================================================================

/// Write a typed slice to a Parquet file as a single row group.
///
/// The Arrow schema is inferred from `T` with `serde_arrow`, so this works for
/// an empty slice too.
///
/// # Errors
///
/// Returns an error if schema inference, conversion, or writing fails.
pub fn write_parquet_vec<T>(path: impl AsRef<Path>, data: &[T]) -> anyhow::Result<usize>
where
    T: Serialize + Deserialize<'static>,
{
    write_parquet_row_groups(path, data, data.len().max(1))
}

/// Write a typed slice to a Parquet file, starting a new row group every
/// `rows_per_group` rows.
///
/// # Errors
///
/// Returns an error if schema inference, conversion, file creation, or writing fails.
pub fn write_parquet_row_groups<T>(
    path: impl AsRef<Path>,
    data: &[T],
    rows_per_group: usize,
) -> anyhow::Result<usize>
where
    T: Serialize + Deserialize<'static>,
{
    use anyhow::Context;

    let path = path.as_ref();
    let fields: Vec<FieldRef> = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
        .context("infer Arrow schema from type T")?;

    let batches: Vec<RecordBatch> = if data.is_empty() {
        vec![to_record_batch(&fields, &data).context("convert rows to RecordBatch")?]
    } else {
        data.chunks(rows_per_group.max(1))
            .map(|group| to_record_batch(&fields, &group).context("convert rows to RecordBatch"))
            .collect::<anyhow::Result<_>>()?
    };

    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batches[0].schema(), Some(props))
        .context("create ArrowWriter")?;

    // One flush per batch closes the current row group.
    for batch in &batches {
        writer.write(batch).context("write batch to parquet")?;
        writer.flush().context("flush row group")?;
    }
    writer.close().context("close ArrowWriter")?;

    Ok(data.len())
}
