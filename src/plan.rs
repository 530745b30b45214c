//! Chunk planning: splitting a file's row space into contiguous read units.
//!
//! A plan for `row_count` rows and a chunk size `c` is the sequence of
//! half-open ranges `[i*c, min((i+1)*c, row_count))`. Every range except the
//! last is exactly `c` rows long; the last holds the remainder. Concatenating
//! the ranges in order reconstructs `[0, row_count)` with no gap or overlap.
//!
//! Planning is pure and deterministic. Shuffling is applied afterwards by the
//! reader, and only to the order of the ranges.

use std::fmt;

/// A half-open row-index range `[start, end)` read and decoded as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of rows covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Number of chunks needed to cover `row_count` rows, i.e. `ceil(row_count / chunk_size)`.
///
/// A `chunk_size` of zero is treated as one.
#[must_use]
pub const fn chunk_count(row_count: u64, chunk_size: u64) -> u64 {
    let c = if chunk_size == 0 { 1 } else { chunk_size };
    row_count.div_ceil(c)
}

/// Start offsets of every chunk, in ascending order.
///
/// Empty when `row_count == 0`. A `chunk_size` of zero is treated as one.
#[must_use]
pub fn chunk_starts(row_count: u64, chunk_size: u64) -> Vec<u64> {
    chunk_plan(row_count, chunk_size)
        .into_iter()
        .map(|r| r.start)
        .collect()
}

/// Build the full chunk plan for `[0, row_count)`.
///
/// ```
/// use rowshuffle::plan::{chunk_plan, ChunkRange};
///
/// let plan = chunk_plan(10, 4);
/// assert_eq!(plan, vec![ChunkRange::new(0, 4), ChunkRange::new(4, 8), ChunkRange::new(8, 10)]);
/// ```
#[must_use]
pub fn chunk_plan(row_count: u64, chunk_size: u64) -> Vec<ChunkRange> {
    let c = chunk_size.max(1);
    let n = chunk_count(row_count, c);
    let mut plan = Vec::with_capacity(usize::try_from(n).unwrap_or(0));
    let mut start = 0u64;
    while start < row_count {
        let end = start.saturating_add(c).min(row_count);
        plan.push(ChunkRange::new(start, end));
        start = end;
    }
    plan
}
