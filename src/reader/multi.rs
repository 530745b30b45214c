use crate::decode::RowDecoder;
use crate::error::{ReaderError, Result};
use crate::io::glob::{expand_glob_required, is_glob_pattern};
use crate::options::{IterOptions, Selection};
use crate::reader::{ChunkedRows, SingleFileReader};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Reader over an ordered list of files sharing one decoder.
///
/// Members are prepared (opened, metadata decoded, iterators planned) in
/// parallel on the rayon pool; iteration itself pulls from one member at a
/// time. The aggregate row count is computed once and memoized.
pub struct MultiFileReader<D: RowDecoder> {
    readers: Vec<SingleFileReader<D>>,
    row_count: Option<u64>,
    closed: bool,
}

impl<D: RowDecoder> MultiFileReader<D> {
    /// Build a reader over `paths`, in the given order. No I/O happens here.
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>, decoder: D) -> Self {
        let decoder = Arc::new(decoder);
        let readers = paths
            .into_iter()
            .map(|p| SingleFileReader::with_shared_decoder(p, Arc::clone(&decoder)))
            .collect();
        Self {
            readers,
            row_count: None,
            closed: false,
        }
    }

    /// Build a reader from a single path or a glob pattern.
    ///
    /// Glob matches are sorted lexicographically so member order is stable.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NoFiles`] if the pattern matches nothing, or an
    /// error if the pattern is malformed.
    pub fn open_pattern(pattern: &str, decoder: D) -> Result<Self> {
        let paths = if is_glob_pattern(pattern) {
            expand_glob_required(pattern)?
        } else {
            vec![PathBuf::from(pattern)]
        };
        debug!(pattern, files = paths.len(), "resolved reader pattern");
        Ok(Self::new(paths, decoder))
    }

    #[must_use]
    pub fn readers(&self) -> &[SingleFileReader<D>] {
        &self.readers
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.readers.iter().map(SingleFileReader::path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            let path = self.readers.first().map_or_else(PathBuf::new, |r| r.path().to_path_buf());
            return Err(ReaderError::closed(path));
        }
        Ok(())
    }

    /// Sum of every member's row count, memoized after the first call.
    ///
    /// # Errors
    ///
    /// Returns the first member error encountered, or [`ReaderError::Closed`]
    /// after [`close`](Self::close).
    pub fn row_count(&mut self) -> Result<u64> {
        self.ensure_open()?;
        if let Some(n) = self.row_count {
            return Ok(n);
        }
        let counts: Vec<u64> = self
            .readers
            .par_iter_mut()
            .map(SingleFileReader::row_count)
            .collect::<Result<_>>()?;
        let total = counts.iter().sum();
        self.row_count = Some(total);
        Ok(total)
    }

    /// Merged lazy row sequence over all members.
    ///
    /// Without shuffle, members are drained one after another in order. With
    /// shuffle, each member's chunk order is shuffled and the next row comes
    /// from a randomly chosen active member (see [`Selection`]). Either way
    /// every row of every file is yielded exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidOptions`] for a zero chunk size, the
    /// first member error while preparing iterators, or
    /// [`ReaderError::Closed`] after [`close`](Self::close).
    pub fn iter(&mut self, options: &IterOptions<D::Options>) -> Result<GroupRows<D>> {
        options.validate()?;
        self.ensure_open()?;

        let mut rng = options.rng();
        let seeds: Vec<u64> = self.readers.iter().map(|_| rng.r#gen()).collect();
        let members: Vec<ChunkedRows<D>> = self
            .readers
            .par_iter_mut()
            .zip(seeds.par_iter())
            .map(|(reader, &seed)| {
                let mut member_rng = ChaCha8Rng::seed_from_u64(seed);
                reader.iter_with_rng(options, &mut member_rng)
            })
            .collect::<Result<_>>()?;

        debug!(
            members = members.len(),
            shuffle = options.shuffle,
            selection = ?options.selection,
            "created group iterator"
        );
        Ok(GroupRows {
            active: members,
            shuffle: options.shuffle,
            selection: options.selection,
            rng,
        })
    }

    /// Close every member, even if some fail. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Close`] listing every member that failed.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.row_count = None;
        let results: Vec<Result<()>> = self
            .readers
            .iter_mut()
            .map(|reader| {
                let res = reader.close();
                if let Err(e) = &res {
                    warn!(path = %reader.path().display(), error = %e, "failed to close member");
                }
                res
            })
            .collect();
        ReaderError::aggregate_close(results)
    }
}

impl<D: RowDecoder> std::fmt::Debug for MultiFileReader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiFileReader")
            .field("readers", &self.readers)
            .field("row_count", &self.row_count)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Merged row sequence produced by [`MultiFileReader::iter`].
///
/// Holds the set of member sequences that have not reported exhaustion yet.
/// A member is removed the first time it returns `None`; the sequence ends
/// when the set is empty. The first member error is yielded and then ends the
/// whole sequence.
pub struct GroupRows<D: RowDecoder> {
    active: Vec<ChunkedRows<D>>,
    shuffle: bool,
    selection: Selection,
    rng: ChaCha8Rng,
}

impl<D: RowDecoder> GroupRows<D> {
    /// Number of member sequences not yet exhausted.
    #[must_use]
    pub fn active_members(&self) -> usize {
        self.active.len()
    }

    /// Rows not yet yielded, summed over active members.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.active.iter().map(ChunkedRows::remaining).sum()
    }

    fn pick(&mut self) -> usize {
        if !self.shuffle {
            return 0;
        }
        match self.selection {
            Selection::Uniform => self.rng.gen_range(0..self.active.len()),
            Selection::Weighted => {
                let total = self.remaining();
                if total == 0 {
                    return 0;
                }
                let mut ticket = self.rng.gen_range(0..total);
                for (i, member) in self.active.iter().enumerate() {
                    let weight = member.remaining();
                    if ticket < weight {
                        return i;
                    }
                    ticket -= weight;
                }
                self.active.len() - 1
            }
        }
    }
}

impl<D: RowDecoder> Iterator for GroupRows<D> {
    type Item = Result<D::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.active.is_empty() {
            let idx = self.pick();
            trace!(member = idx, active = self.active.len(), "picked member");
            match self.active[idx].next() {
                Some(Ok(row)) => return Some(Ok(row)),
                Some(Err(e)) => {
                    self.active.clear();
                    return Some(Err(e));
                }
                None => {
                    let done = if self.shuffle {
                        self.active.swap_remove(idx)
                    } else {
                        self.active.remove(idx)
                    };
                    trace!(path = %done.path().display(), left = self.active.len(), "member exhausted");
                }
            }
        }
        None
    }
}

impl<D: RowDecoder> std::fmt::Debug for GroupRows<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRows")
            .field("active", &self.active)
            .field("shuffle", &self.shuffle)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl<D: RowDecoder> std::iter::FusedIterator for GroupRows<D> {}

#[cfg(all(test, feature = "io-parquet"))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::ByteSource;
    use crate::io::parquet::{ParquetDecoder, ParquetReadOptions};
    use crate::testing::{
        assert_exactly_once, assert_file_order, indexed_rows, rows_per_file,
        write_indexed_dataset, CountingDecoder, Fault, FaultyDecoder, IndexedRow,
    };
    use anyhow::Result;

    type Opts = IterOptions<ParquetReadOptions>;

    fn decoder() -> ParquetDecoder<IndexedRow> {
        ParquetDecoder::new()
    }

    fn expected(sizes: &[u64]) -> Vec<IndexedRow> {
        sizes
            .iter()
            .zip(0u32..)
            .flat_map(|(&n, file)| indexed_rows(file, n))
            .collect()
    }

    fn collect<D: RowDecoder>(rows: GroupRows<D>) -> Result<Vec<D::Row>> {
        Ok(rows.collect::<crate::error::Result<Vec<_>>>()?)
    }

    #[test]
    fn row_count_sums_members_and_is_memoized() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[3, 5, 0, 12], 4)?;
        let counting = CountingDecoder::new(decoder());
        let calls = counting.calls();
        let mut reader = MultiFileReader::new(paths, counting);

        assert_eq!(reader.row_count()?, 20);
        assert_eq!(reader.row_count()?, 20);
        assert_eq!(calls.metadata_reads(), 4);
        Ok(())
    }

    #[test]
    fn unshuffled_concatenates_in_member_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sizes = [3, 5, 0, 12];
        let paths = write_indexed_dataset(dir.path(), &sizes, 4)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        for chunk_size in [1, 3, 128] {
            let rows = collect(reader.iter(&Opts::new().with_chunk_size(chunk_size))?)?;
            assert_eq!(rows, expected(&sizes));
        }
        Ok(())
    }

    #[test]
    fn shuffled_interleave_is_exactly_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sizes = [3, 5];
        let paths = write_indexed_dataset(dir.path(), &sizes, 2)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        for seed in 0..20 {
            let opts = Opts::new().shuffled(true).with_chunk_size(2).with_seed(seed);
            let rows = collect(reader.iter(&opts)?)?;
            assert_eq!(rows.len(), 8);
            let counts = rows_per_file(&rows);
            assert_eq!(counts[&0], 3);
            assert_eq!(counts[&1], 5);
            assert_exactly_once(&rows, &expected(&sizes));
        }
        Ok(())
    }

    #[test]
    fn interleave_mixes_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[200, 200], 50)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        let opts = Opts::new().shuffled(true).with_chunk_size(1000).with_seed(9);
        let rows = collect(reader.iter(&opts)?)?;
        // One chunk per file keeps each file in order while files alternate.
        assert_file_order(&rows);
        let switches = rows.windows(2).filter(|w| w[0].file != w[1].file).count();
        assert!(switches > 10, "only {switches} switches between files");
        Ok(())
    }

    #[test]
    fn weighted_selection_is_exactly_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let sizes = [1, 40, 7];
        let paths = write_indexed_dataset(dir.path(), &sizes, 8)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        let opts = Opts::new()
            .shuffled(true)
            .with_chunk_size(5)
            .with_seed(3)
            .with_selection(Selection::Weighted);
        let rows = collect(reader.iter(&opts)?)?;
        assert_exactly_once(&rows, &expected(&sizes));
        Ok(())
    }

    #[test]
    fn seed_reproduces_group_traversal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[30, 17, 25], 10)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        let opts = Opts::new().shuffled(true).with_chunk_size(4).with_seed(1234);
        let first = collect(reader.iter(&opts)?)?;
        let second = collect(reader.iter(&opts)?)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn progress_counts_down() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[6, 4], 3)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        let mut rows = reader.iter(&Opts::new().shuffled(true).with_seed(1))?;
        assert_eq!(rows.remaining(), 10);
        assert_eq!(rows.active_members(), 2);
        rows.by_ref().take(4).collect::<crate::error::Result<Vec<_>>>()?;
        assert_eq!(rows.remaining(), 6);
        assert_eq!(rows.by_ref().count(), 6);
        assert_eq!(rows.active_members(), 0);
        Ok(())
    }

    #[test]
    fn member_error_ends_group() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[10, 10], 5)?;
        let mut reader =
            MultiFileReader::new(paths, FaultyDecoder::new(decoder(), Fault::Chunk(1)));

        let items: Vec<_> = reader.iter(&Opts::new().with_chunk_size(5))?.collect();
        assert_eq!(items.len(), 6);
        assert!(items[..5].iter().all(std::result::Result::is_ok));
        assert_eq!(items[5].as_ref().unwrap_err().kind(), ErrorKind::Decode);
        Ok(())
    }

    #[test]
    fn missing_member_fails_iteration() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut paths = write_indexed_dataset(dir.path(), &[4], 4)?;
        paths.push(dir.path().join("missing.parquet"));
        let mut reader = MultiFileReader::new(paths, decoder());

        assert_eq!(reader.row_count().unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(reader.iter(&Opts::new()).unwrap_err().kind(), ErrorKind::Io);
        reader.close()?;
        Ok(())
    }

    #[test]
    fn empty_group() -> Result<()> {
        let mut reader = MultiFileReader::new(Vec::<PathBuf>::new(), decoder());
        assert!(reader.is_empty());
        assert_eq!(reader.row_count()?, 0);
        assert!(collect(reader.iter(&Opts::new().shuffled(true))?)?.is_empty());
        reader.close()?;
        Ok(())
    }

    #[test]
    fn close_closes_every_member() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[2, 2, 2], 2)?;
        let mut reader = MultiFileReader::new(paths, decoder());

        reader.row_count()?;
        reader.close()?;
        assert!(reader.readers().iter().all(SingleFileReader::is_closed));
        reader.close()?;
        assert_eq!(reader.row_count().unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(reader.iter(&Opts::new()).unwrap_err().kind(), ErrorKind::Closed);
        Ok(())
    }

    #[test]
    fn close_failure_does_not_skip_siblings() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = write_indexed_dataset(dir.path(), &[2, 2, 2], 2)?;
        let mut reader = MultiFileReader::new(paths, decoder());
        reader.row_count()?;

        let sources: Vec<ByteSource> = reader
            .readers()
            .iter()
            .filter_map(|r| r.source().cloned())
            .collect();
        assert_eq!(sources.len(), 3);
        sources[1].poison();

        let err = reader.close().unwrap_err();
        match err {
            ReaderError::Close { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].kind(), ErrorKind::Io);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sources.iter().all(ByteSource::is_closed));
        assert!(reader.readers().iter().all(SingleFileReader::is_closed));
        Ok(())
    }

    #[test]
    fn open_pattern_sorts_matches() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_indexed_dataset(dir.path(), &[1, 2, 3], 2)?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let pattern = format!("{}/part-*.parquet", dir.path().display());
        let mut reader = MultiFileReader::open_pattern(&pattern, decoder())?;
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.row_count()?, 6);
        let rows = collect(reader.iter(&Opts::new())?)?;
        assert_eq!(rows, expected(&[1, 2, 3]));

        let none = format!("{}/*.arrow", dir.path().display());
        let err = MultiFileReader::open_pattern(&none, decoder()).unwrap_err();
        assert!(matches!(err, ReaderError::NoFiles { .. }));
        Ok(())
    }
}
