//! Interval boundary keys and per-interval state.
//!
//! The global key space is cut into half-open intervals `[start, next start)`
//! at every file boundary key, so each file overlaps a contiguous run of
//! intervals exactly. A file's largest key is inclusive, and its immediate
//! successor is not representable in the key space; `is_largest = true`
//! stands in for that successor. Ordering therefore places
//! `{k, is_largest: false}` before `{k, is_largest: true}`, and a boundary
//! built from a largest key only uses `is_largest = false` when the key's
//! trailer is the range-delete sentinel (an already-exclusive bound).

use bytes::Bytes;
use silt_base::Compare;
use std::cmp::Ordering;

/// A boundary key in the ordered interval sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalKey {
    pub key: Bytes,
    pub is_largest: bool,
}

impl IntervalKey {
    /// Boundary at a file's smallest key.
    pub fn at_smallest(key: Bytes) -> IntervalKey {
        IntervalKey {
            key,
            is_largest: false,
        }
    }

    /// Boundary just past a file's largest key. `exclusive` is true when the
    /// largest key is a range-delete sentinel and already excludes itself.
    pub fn after_largest(key: Bytes, exclusive: bool) -> IntervalKey {
        IntervalKey {
            key,
            is_largest: !exclusive,
        }
    }
}

/// Compares interval keys under the injected user-key comparator: by key,
/// then `is_largest = false` before `is_largest = true`.
pub fn interval_key_compare(cmp: &Compare, a: &IntervalKey, b: &IntervalKey) -> Ordering {
    cmp(&a.key, &b.key).then(a.is_largest.cmp(&b.is_largest))
}

/// Sorts boundary keys and drops duplicates.
pub(crate) fn sort_and_dedup(keys: &mut Vec<IntervalKey>, cmp: &Compare) {
    keys.sort_by(|a, b| interval_key_compare(cmp, a, b));
    keys.dedup_by(|a, b| interval_key_compare(cmp, a, b) == Ordering::Equal);
}

/// One half-open key interval `[start_key, next interval's start_key)`. The
/// end key is implicit in the next interval; the last entry only ever acts as
/// an end marker and its own end is never consulted. The interval set is
/// fixed after engine construction; only the compacting counters and flags
/// change afterwards.
#[derive(Debug, Clone)]
pub struct FileInterval {
    /// Position in the ordered interval sequence.
    pub index: usize,

    pub start_key: IntervalKey,

    /// True iff some file in this interval is being compacted to Lbase. No
    /// file overlapping such an interval may join an L0 -> Lbase compaction.
    pub is_base_compacting: bool,

    /// True if any interval in `[files_min_interval_index,
    /// files_max_interval_index]` is base-compacting. A file straddling into
    /// a base-compacting interval would likely block a compaction seeded
    /// here, so the picker de-prioritizes (but does not disqualify) the
    /// interval.
    pub interval_range_is_base_compacting: bool,

    /// Union of the interval spans of all files touching this interval,
    /// inclusive on both sides.
    pub files_min_interval_index: usize,
    pub files_max_interval_index: usize,

    /// `file_count - compacting_file_count` is the stack depth that new
    /// compactions could still reduce. The count is imprecise when several
    /// intra-L0 compactions overlap one interval; that imprecision is
    /// accepted rather than tracking per-compaction membership.
    pub file_count: usize,
    pub compacting_file_count: usize,

    /// Files overlapping this interval, as L0 indices into the engine's file
    /// arena, in increasing sublevel order.
    pub files: Vec<usize>,

    /// Interpolated from overlapping files, assuming each file spreads its
    /// bytes evenly across its span.
    pub estimated_bytes: u64,
}

impl FileInterval {
    pub(crate) fn new(index: usize, start_key: IntervalKey) -> FileInterval {
        FileInterval {
            index,
            start_key,
            is_base_compacting: false,
            interval_range_is_base_compacting: false,
            files_min_interval_index: index,
            files_max_interval_index: index,
            file_count: 0,
            compacting_file_count: 0,
            files: Vec::new(),
            estimated_bytes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_base::bytewise_compare;

    fn ik(key: &str, is_largest: bool) -> IntervalKey {
        IntervalKey {
            key: Bytes::copy_from_slice(key.as_bytes()),
            is_largest,
        }
    }

    #[test]
    fn test_ordering_on_distinct_keys() {
        let cmp = bytewise_compare();
        assert_eq!(
            interval_key_compare(&cmp, &ik("a", true), &ik("b", false)),
            Ordering::Less
        );
    }

    #[test]
    fn test_is_largest_breaks_ties() {
        let cmp = bytewise_compare();
        assert_eq!(
            interval_key_compare(&cmp, &ik("e", false), &ik("e", true)),
            Ordering::Less
        );
        assert_eq!(
            interval_key_compare(&cmp, &ik("e", true), &ik("e", false)),
            Ordering::Greater
        );
        assert_eq!(
            interval_key_compare(&cmp, &ik("e", true), &ik("e", true)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_sort_and_dedup() {
        let cmp = bytewise_compare();
        // Bounds of files [a,e], [b,g], [e,j]: six boundary keys, no dups.
        let mut keys = vec![
            ik("a", false),
            ik("e", true),
            ik("b", false),
            ik("g", true),
            ik("e", false),
            ik("j", true),
        ];
        sort_and_dedup(&mut keys, &cmp);
        let expect = vec![
            ik("a", false),
            ik("b", false),
            ik("e", false),
            ik("e", true),
            ik("g", true),
            ik("j", true),
        ];
        assert_eq!(keys, expect);
    }

    #[test]
    fn test_dedup_removes_equal_boundaries() {
        let cmp = bytewise_compare();
        let mut keys = vec![ik("a", false), ik("a", false), ik("a", true)];
        sort_and_dedup(&mut keys, &cmp);
        assert_eq!(keys, vec![ik("a", false), ik("a", true)]);
    }
}
