use crate::decode::RowDecoder;
use crate::error::{ReaderError, Result};
use crate::io::ByteSource;
use crate::options::IterOptions;
use crate::plan::chunk_plan;
use crate::reader::ChunkedRows;
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

struct Cached<M> {
    metadata: M,
    rows: u64,
}

struct OpenFile<M> {
    source: ByteSource,
    cached: Option<Cached<M>>,
}

enum State<M> {
    Unopened,
    Open(OpenFile<M>),
    Closed,
}

/// Reader for one columnar file.
///
/// Construction does no I/O. The file is opened on the first call that needs
/// it, its metadata is decoded once and cached together with the row count,
/// and [`close`](Self::close) releases the handle and clears the cache. A
/// closed reader stays closed: every later call except `close` fails with
/// [`ReaderError::Closed`].
pub struct SingleFileReader<D: RowDecoder> {
    path: PathBuf,
    decoder: Arc<D>,
    state: State<D::Metadata>,
}

impl<D: RowDecoder> SingleFileReader<D> {
    pub fn new(path: impl Into<PathBuf>, decoder: D) -> Self {
        Self::with_shared_decoder(path, Arc::new(decoder))
    }

    /// Build a reader that shares `decoder` with other readers.
    pub fn with_shared_decoder(path: impl Into<PathBuf>, decoder: Arc<D>) -> Self {
        Self {
            path: path.into(),
            decoder,
            state: State::Unopened,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// The byte source, once the file has been opened and until it is closed.
    #[must_use]
    pub fn source(&self) -> Option<&ByteSource> {
        match &self.state {
            State::Open(open) => Some(&open.source),
            State::Unopened | State::Closed => None,
        }
    }

    fn open(&mut self) -> Result<&mut OpenFile<D::Metadata>> {
        if let State::Unopened = self.state {
            let source = ByteSource::open(&self.path)?;
            self.state = State::Open(OpenFile {
                source,
                cached: None,
            });
        }
        match &mut self.state {
            State::Open(open) => Ok(open),
            State::Unopened | State::Closed => Err(ReaderError::closed(&self.path)),
        }
    }

    fn load(&mut self) -> Result<(&ByteSource, &Cached<D::Metadata>)> {
        let decoder = Arc::clone(&self.decoder);
        let open = self.open()?;
        let cached = match open.cached.take() {
            Some(cached) => cached,
            None => {
                let metadata = decoder.read_metadata(&open.source)?;
                let rows = decoder.row_count(&metadata);
                debug!(path = %open.source.path().display(), rows, "cached file metadata");
                Cached { metadata, rows }
            }
        };
        let cached = open.cached.insert(cached);
        Ok((&open.source, cached))
    }

    /// File metadata, decoded on first use and cached until [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Io`] if the file cannot be opened, a format error
    /// if the decoder rejects it, or [`ReaderError::Closed`] after `close`.
    pub fn metadata(&mut self) -> Result<&D::Metadata> {
        Ok(&self.load()?.1.metadata)
    }

    /// Number of rows in the file.
    ///
    /// # Errors
    ///
    /// As [`metadata`](Self::metadata).
    pub fn row_count(&mut self) -> Result<u64> {
        Ok(self.load()?.1.rows)
    }

    /// Lazy row sequence over the whole file.
    ///
    /// Chunk order is shuffled when `options.shuffle` is set, using the RNG
    /// built from `options.seed`. Rows inside a chunk always keep file order.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidOptions`] for a zero chunk size, otherwise
    /// as [`metadata`](Self::metadata).
    pub fn iter(&mut self, options: &IterOptions<D::Options>) -> Result<ChunkedRows<D>> {
        let mut rng = options.rng();
        self.iter_with_rng(options, &mut rng)
    }

    /// Like [`iter`](Self::iter), drawing the chunk permutation from `rng`.
    ///
    /// # Errors
    ///
    /// As [`iter`](Self::iter).
    pub fn iter_with_rng<R: Rng + ?Sized>(
        &mut self,
        options: &IterOptions<D::Options>,
        rng: &mut R,
    ) -> Result<ChunkedRows<D>> {
        options.validate()?;
        let decoder = Arc::clone(&self.decoder);
        let (source, cached) = self.load()?;

        let mut plan = chunk_plan(cached.rows, options.chunk_size);
        if options.shuffle {
            plan.shuffle(rng);
        }
        debug!(
            path = %source.path().display(),
            rows = cached.rows,
            chunks = plan.len(),
            shuffle = options.shuffle,
            "created row iterator"
        );
        Ok(ChunkedRows::new(
            source.clone(),
            cached.metadata.clone(),
            decoder,
            plan,
            options.decoder.clone(),
        ))
    }

    /// Release the file handle and cached metadata. Idempotent.
    ///
    /// Iterators created before the close fail on their next decode.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle could not be released cleanly; the
    /// reader is closed regardless.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(open) => {
                debug!(path = %self.path.display(), "closing reader");
                open.source.close()
            }
            State::Unopened | State::Closed => Ok(()),
        }
    }
}

impl<D: RowDecoder> std::fmt::Debug for SingleFileReader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Unopened => "unopened",
            State::Open(_) => "open",
            State::Closed => "closed",
        };
        f.debug_struct("SingleFileReader")
            .field("path", &self.path)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}
