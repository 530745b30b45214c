//! Decoder wrappers that observe or sabotage calls to an inner decoder.

use crate::decode::RowDecoder;
use crate::error::{ReaderError, Result};
use crate::io::ByteSource;
use crate::plan::ChunkRange;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared record of the calls a [`CountingDecoder`] has forwarded.
#[derive(Debug, Default)]
pub struct CallLog {
    metadata_reads: AtomicUsize,
    chunk_reads: AtomicUsize,
    ranges: Mutex<Vec<ChunkRange>>,
}

impl CallLog {
    #[must_use]
    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn chunk_reads(&self) -> usize {
        self.chunk_reads.load(Ordering::SeqCst)
    }

    /// Ranges passed to `read_rows`, in call order.
    #[must_use]
    pub fn ranges(&self) -> Vec<ChunkRange> {
        self.ranges.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        self.metadata_reads.store(0, Ordering::SeqCst);
        self.chunk_reads.store(0, Ordering::SeqCst);
        if let Ok(mut r) = self.ranges.lock() {
            r.clear();
        }
    }
}

/// Forwards to an inner decoder and counts every call.
///
/// The [`CallLog`] stays reachable through [`calls`](Self::calls) after the
/// decoder has been moved into a reader.
#[derive(Debug)]
pub struct CountingDecoder<D> {
    inner: D,
    log: Arc<CallLog>,
}

impl<D> CountingDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            log: Arc::new(CallLog::default()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Arc<CallLog> {
        Arc::clone(&self.log)
    }
}

impl<D: RowDecoder> RowDecoder for CountingDecoder<D> {
    type Metadata = D::Metadata;
    type Row = D::Row;
    type Options = D::Options;

    fn read_metadata(&self, source: &ByteSource) -> Result<Self::Metadata> {
        self.log.metadata_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_metadata(source)
    }

    fn row_count(&self, metadata: &Self::Metadata) -> u64 {
        self.inner.row_count(metadata)
    }

    fn read_rows(
        &self,
        source: &ByteSource,
        metadata: &Self::Metadata,
        range: ChunkRange,
        options: &Self::Options,
    ) -> Result<Vec<Self::Row>> {
        self.log.chunk_reads.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut r) = self.log.ranges.lock() {
            r.push(range);
        }
        self.inner.read_rows(source, metadata, range, options)
    }
}

/// Where a [`FaultyDecoder`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every metadata read fails with a format error.
    Metadata,
    /// The `n`-th chunk read (zero-based, per decoder) fails with a decode error.
    Chunk(usize),
    /// The `n`-th chunk read returns one row fewer than requested.
    ShortChunk(usize),
}

/// Forwards to an inner decoder, failing at a configured point.
#[derive(Debug)]
pub struct FaultyDecoder<D> {
    inner: D,
    fault: Fault,
    chunk_calls: AtomicUsize,
}

impl<D> FaultyDecoder<D> {
    pub fn new(inner: D, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            chunk_calls: AtomicUsize::new(0),
        }
    }
}

impl<D: RowDecoder> RowDecoder for FaultyDecoder<D> {
    type Metadata = D::Metadata;
    type Row = D::Row;
    type Options = D::Options;

    fn read_metadata(&self, source: &ByteSource) -> Result<Self::Metadata> {
        if self.fault == Fault::Metadata {
            return Err(ReaderError::format(source.path(), "injected metadata failure"));
        }
        self.inner.read_metadata(source)
    }

    fn row_count(&self, metadata: &Self::Metadata) -> u64 {
        self.inner.row_count(metadata)
    }

    fn read_rows(
        &self,
        source: &ByteSource,
        metadata: &Self::Metadata,
        range: ChunkRange,
        options: &Self::Options,
    ) -> Result<Vec<Self::Row>> {
        let call = self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Chunk(n) if n == call => Err(ReaderError::decode(
                source.path(),
                range,
                "injected chunk failure",
            )),
            Fault::ShortChunk(n) if n == call => {
                let mut rows = self.inner.read_rows(source, metadata, range, options)?;
                rows.pop();
                Ok(rows)
            }
            _ => self.inner.read_rows(source, metadata, range, options),
        }
    }
}
