use crate::decode::RowDecoder;
use crate::error::{ReaderError, Result};
use crate::io::ByteSource;
use crate::plan::ChunkRange;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Lazy row sequence over one file, driven by a chunk plan.
///
/// The iterator holds the remaining plan and the rows of the current chunk.
/// Each time the buffer runs dry it issues exactly one decode call for the next
/// planned range, so at most one chunk of rows is resident at a time and no
/// read happens ahead of demand. Dropping the iterator mid-stream performs no
/// further I/O and leaves the owning reader's handle open until it is closed.
///
/// Errors are yielded once as `Some(Err(_))`; the iterator then ends.
/// A sequence cannot be restarted: ask the reader for a new one.
pub struct ChunkedRows<D: RowDecoder> {
    source: ByteSource,
    metadata: D::Metadata,
    decoder: Arc<D>,
    options: D::Options,
    plan: std::vec::IntoIter<ChunkRange>,
    buffer: std::vec::IntoIter<D::Row>,
    remaining: u64,
    chunks_read: usize,
    done: bool,
}

impl<D: RowDecoder> ChunkedRows<D> {
    pub(crate) fn new(
        source: ByteSource,
        metadata: D::Metadata,
        decoder: Arc<D>,
        plan: Vec<ChunkRange>,
        options: D::Options,
    ) -> Self {
        let remaining = plan.iter().map(ChunkRange::len).sum();
        Self {
            source,
            metadata,
            decoder,
            options,
            plan: plan.into_iter(),
            buffer: Vec::new().into_iter(),
            remaining,
            chunks_read: 0,
            done: false,
        }
    }

    /// Path of the file this sequence reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.source.path()
    }

    /// Rows planned but not yet yielded.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        if self.done { 0 } else { self.remaining }
    }

    /// Number of decode calls issued so far.
    #[must_use]
    pub const fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Ranges that have not been decoded yet, in the order they will be read.
    #[must_use]
    pub fn pending_chunks(&self) -> &[ChunkRange] {
        self.plan.as_slice()
    }

    fn load(&mut self, range: ChunkRange) -> Result<()> {
        trace!(path = %self.source.path().display(), %range, "decoding chunk");
        let rows = self
            .decoder
            .read_rows(&self.source, &self.metadata, range, &self.options)?;
        self.chunks_read += 1;
        if rows.len() as u64 != range.len() {
            return Err(ReaderError::decode(
                self.source.path(),
                range,
                format!("decoder returned {} rows, expected {}", rows.len(), range.len()),
            ));
        }
        self.buffer = rows.into_iter();
        Ok(())
    }
}

impl<D: RowDecoder> Iterator for ChunkedRows<D> {
    type Item = Result<D::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(row) = self.buffer.next() {
                self.remaining -= 1;
                return Some(Ok(row));
            }
            let Some(range) = self.plan.next() else {
                self.done = true;
                break;
            };
            if let Err(e) = self.load(range) {
                self.done = true;
                return Some(Err(e));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        // Buffered rows are already decoded; later chunks may still fail.
        let upper = usize::try_from(self.remaining).ok();
        (self.buffer.len(), upper)
    }
}

impl<D: RowDecoder> std::fmt::Debug for ChunkedRows<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedRows")
            .field("path", &self.source.path())
            .field("remaining", &self.remaining())
            .field("chunks_read", &self.chunks_read)
            .field("pending_chunks", &self.plan.len())
            .finish_non_exhaustive()
    }
}

impl<D: RowDecoder> std::iter::FusedIterator for ChunkedRows<D> {}
