//! Assertions for row streams.

use crate::testing::IndexedRow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that `actual` holds every element of `expected` exactly as many
/// times as `expected` does, in any order.
///
/// # Panics
///
/// Panics with the missing and unexpected elements if the multisets differ.
///
/// ```
/// use rowshuffle::testing::assert_exactly_once;
///
/// assert_exactly_once(&[3, 1, 2], &[1, 2, 3]);
/// ```
pub fn assert_exactly_once<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    let mut counts: HashMap<&T, i64> = HashMap::with_capacity(expected.len());
    for e in expected {
        *counts.entry(e).or_default() += 1;
    }
    for a in actual {
        *counts.entry(a).or_default() -= 1;
    }

    let missing: Vec<_> = counts.iter().filter(|(_, c)| **c > 0).map(|(k, _)| *k).collect();
    let extra: Vec<_> = counts.iter().filter(|(_, c)| **c < 0).map(|(k, _)| *k).collect();
    assert!(
        missing.is_empty() && extra.is_empty(),
        "row multiset mismatch (expected {} rows, got {}):\n  missing: {missing:?}\n  duplicated or unexpected: {extra:?}",
        expected.len(),
        actual.len()
    );
}

/// Assert that the rows of each file appear in ascending index order.
///
/// # Panics
///
/// Panics at the first row whose index is not larger than the previous row
/// from the same file.
pub fn assert_file_order(rows: &[IndexedRow]) {
    let mut last: HashMap<u32, u64> = HashMap::new();
    for (pos, row) in rows.iter().enumerate() {
        if let Some(prev) = last.insert(row.file, row.index) {
            assert!(
                row.index > prev,
                "file {} out of order at position {pos}: index {} after {prev}",
                row.file,
                row.index
            );
        }
    }
}

/// Number of rows per file.
#[must_use]
pub fn rows_per_file(rows: &[IndexedRow]) -> HashMap<u32, usize> {
    let mut out = HashMap::new();
    for row in rows {
        *out.entry(row.file).or_default() += 1;
    }
    out
}
