//! Random-access byte source over one open file.
//!
//! [`ByteSource`] is the handle a reader owns for its file: it is opened once,
//! knows the file size, serves arbitrary `[start, end)` byte ranges and is
//! released deterministically by [`ByteSource::close`]. Clones share the same
//! handle, so closing through any clone invalidates all of them; later reads
//! fail with [`ReaderError::Closed`] instead of silently reopening the file.

use crate::error::{ReaderError, Result};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    size: u64,
    file: Mutex<Option<File>>,
}

/// Shared, closable handle to a file's bytes.
#[derive(Debug, Clone)]
pub struct ByteSource {
    inner: Arc<Inner>,
}

impl ByteSource {
    /// Open `path` read-only and record its size.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Io`] if the file cannot be opened or stat-ed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ReaderError::io(&path, e))?;
        let size = file.metadata().map_err(|e| ReaderError::io(&path, e))?.len();
        debug!(path = %path.display(), size, "opened byte source");
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                size,
                file: Mutex::new(Some(file)),
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Size of the file in bytes, as observed when it was opened.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().map_or(true, |guard| guard.is_none())
    }

    /// Read the bytes in `[start, end)`.
    ///
    /// `end` is clamped to the file size. Short reads from the OS are retried
    /// until the range is filled or EOF is reached, so the returned buffer is
    /// only shorter than requested if the file ended early.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Closed`] after [`close`](Self::close),
    /// [`ReaderError::InvalidOptions`] if `start > end`, or
    /// [`ReaderError::Io`] if seeking or reading fails.
    pub fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if start > end {
            return Err(ReaderError::invalid_options(format!(
                "byte range start {start} is after end {end}"
            )));
        }
        let end = end.min(self.size());
        if start >= end {
            return Ok(Vec::new());
        }
        let len = usize::try_from(end - start).map_err(|_| {
            ReaderError::invalid_options(format!("byte range [{start}, {end}) is too large"))
        })?;

        let mut guard = self.lock()?;
        let file = guard.as_mut().ok_or_else(|| ReaderError::closed(self.path()))?;
        file.seek(SeekFrom::Start(start))
            .map_err(|e| ReaderError::io(self.path(), e))?;

        let mut buf = vec![0u8; len];
        let filled = read_fully(file, &mut buf).map_err(|e| ReaderError::io(self.path(), e))?;
        buf.truncate(filled);
        Ok(buf)
    }

    /// Release the file handle. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Io`] if the handle's lock was poisoned by a
    /// panicking reader; the handle is still dropped in that case.
    pub fn close(&self) -> Result<()> {
        match self.inner.file.lock() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    debug!(path = %self.path().display(), "closed byte source");
                }
                Ok(())
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
                Err(ReaderError::io(
                    self.path(),
                    std::io::Error::other("file handle lock poisoned"),
                ))
            }
        }
    }

    /// Poison the handle lock by panicking while holding it.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let inner = Arc::clone(&self.inner);
        let _ = std::thread::spawn(move || {
            let _guard = inner.file.lock();
            panic!("poisoning file handle lock");
        })
        .join();
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<File>>> {
        self.inner.file.lock().map_err(|_| {
            ReaderError::io(self.path(), std::io::Error::other("file handle lock poisoned"))
        })
    }
}

/// Fill `buf` from `reader`, retrying short and interrupted reads.
///
/// Returns the number of bytes written, which is less than `buf.len()` only at EOF.
///
/// # Errors
///
/// Propagates any read error other than [`ErrorKind::Interrupted`].
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
