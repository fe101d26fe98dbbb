//! Sublevel organization of L0.
//!
//! Freshly flushed L0 tables may overlap arbitrarily. The engine stacks them
//! into *sublevels*: within one sublevel files are non-overlapping and
//! key-ordered, and higher-indexed sublevels hold younger data that shadows
//! lower ones. Alongside the stack, the key space is cut into intervals at
//! every file boundary, giving each file an integer interval span; all later
//! geometry (read amplification, flush splitting, compaction picking) works
//! on interval indices instead of key comparisons.

use bytes::Bytes;
use silt_base::{Compare, FormatKey};
use std::fmt;

use crate::error::{Error, Result};
use crate::interval::{interval_key_compare, sort_and_dedup, FileInterval, IntervalKey};
use crate::metadata::{L0Compaction, L0FileMeta};

/// A sublevel view of the tables in L0.
///
/// Constructed from a snapshot of L0 file metadata ordered oldest to
/// youngest; the structure (intervals, sublevels, flush split keys) is
/// immutable afterwards. Only the compaction flags on files and the
/// per-interval compacting counters change, via
/// [`init_compacting_file_info`](L0Sublevels::init_compacting_file_info),
/// [`update_state_for_started_compaction`](L0Sublevels::update_state_for_started_compaction)
/// and [`mark_compacting`](L0Sublevels::mark_compacting); those, and the
/// pickers that read the flags, require the caller to hold the store's lock.
pub struct L0Sublevels {
    /// File arena; position equals `l0_index`, oldest to youngest.
    pub(crate) files: Vec<L0FileMeta>,

    /// Outer index 0 is the oldest sublevel; each inner vec holds
    /// non-overlapping files (as L0 indices) in increasing key order.
    pub(crate) levels: Vec<Vec<usize>>,

    /// The file intervals in increasing key order.
    pub(crate) ordered_intervals: Vec<FileInterval>,

    /// User keys to break flushes at.
    pub(crate) flush_split_user_keys: Vec<Bytes>,

    pub(crate) file_bytes: u64,

    pub(crate) cmp: Compare,
    pub(crate) format_key: FormatKey,
}

/// Keeps a sublevel's file list sorted by `min_interval_index`; since files
/// within a sublevel are non-overlapping this equals key order.
fn insert_into_sublevel(level: &mut Vec<usize>, files: &[L0FileMeta], ix: usize) {
    let pos = level.partition_point(|&other| {
        files[other].min_interval_index <= files[ix].min_interval_index
    });
    level.insert(pos, ix);
}

impl L0Sublevels {
    /// Builds the sublevel view for the given L0 files, which must be
    /// ordered oldest to youngest (see
    /// [`sort_l0_files_by_seqno`](crate::sort_l0_files_by_seqno)).
    ///
    /// While walking intervals left to right, a flush split key is recorded
    /// whenever more than `flush_split_max_bytes * sublevel_count` estimated
    /// bytes accumulated since the previous one.
    ///
    /// Construction does not read the compacting flags, so it may run
    /// without the store's lock; call
    /// [`init_compacting_file_info`](L0Sublevels::init_compacting_file_info)
    /// under the lock afterwards.
    pub fn new(
        mut files: Vec<L0FileMeta>,
        cmp: Compare,
        format_key: FormatKey,
        flush_split_max_bytes: i64,
    ) -> Result<L0Sublevels> {
        let mut keys = Vec::with_capacity(2 * files.len());
        for (i, f) in files.iter_mut().enumerate() {
            f.l0_index = i;
            keys.push(IntervalKey::at_smallest(f.smallest.user_key.clone()));
            keys.push(IntervalKey::after_largest(
                f.largest.user_key.clone(),
                f.largest.is_range_delete_sentinel(),
            ));
        }
        sort_and_dedup(&mut keys, &cmp);

        let mut ordered_intervals: Vec<FileInterval> = keys
            .into_iter()
            .enumerate()
            .map(|(i, k)| FileInterval::new(i, k))
            .collect();

        let mut levels: Vec<Vec<usize>> = Vec::new();
        let mut file_bytes = 0u64;

        for ix in 0..files.len() {
            let smallest_ik = IntervalKey::at_smallest(files[ix].smallest.user_key.clone());
            let min = ordered_intervals.partition_point(|iv| {
                interval_key_compare(&cmp, &smallest_ik, &iv.start_key).is_gt()
            });
            if min == ordered_intervals.len() {
                return Err(Error::BoundNotInIntervalKeys {
                    key: format_key(&files[ix].smallest.user_key),
                });
            }
            let largest_ik = IntervalKey::after_largest(
                files[ix].largest.user_key.clone(),
                files[ix].largest.is_range_delete_sentinel(),
            );
            let one_past = ordered_intervals.partition_point(|iv| {
                interval_key_compare(&cmp, &largest_ik, &iv.start_key).is_gt()
            });
            if one_past == ordered_intervals.len() {
                return Err(Error::BoundNotInIntervalKeys {
                    key: format_key(&files[ix].largest.user_key),
                });
            }
            // one_past can only be 0 for an empty exclusive range (sentinel
            // largest equal to smallest), which is not a legal bound.
            let Some(max) = one_past.checked_sub(1) else {
                return Err(Error::BoundNotInIntervalKeys {
                    key: format_key(&files[ix].largest.user_key),
                });
            };

            files[ix].min_interval_index = min;
            files[ix].max_interval_index = max;

            // Evenly spread the file's bytes over its span. A rough
            // estimate, but flush splitting only needs relative weight.
            let interpolated = files[ix].size / files[ix].interval_span() as u64;
            file_bytes += files[ix].size;

            // First pass over the span decides the sublevel from the files
            // already present, and updates per-interval aggregates. The file
            // itself is only appended in the second pass, keeping each
            // interval's file list in increasing sublevel order.
            let mut sublevel = 0;
            for i in min..=max {
                let interval = &mut ordered_intervals[i];
                if let Some(&last) = interval.files.last() {
                    if sublevel <= files[last].sublevel {
                        sublevel = files[last].sublevel + 1;
                    }
                }
                interval.file_count += 1;
                interval.estimated_bytes += interpolated;
                if min < interval.files_min_interval_index {
                    interval.files_min_interval_index = min;
                }
                if max > interval.files_max_interval_index {
                    interval.files_max_interval_index = max;
                }
            }
            for i in min..=max {
                ordered_intervals[i].files.push(ix);
            }

            files[ix].sublevel = sublevel;
            if sublevel > levels.len() {
                return Err(Error::SublevelOverflow {
                    sublevel,
                    limit: levels.len(),
                });
            }
            if sublevel == levels.len() {
                levels.push(vec![ix]);
            } else {
                insert_into_sublevel(&mut levels[sublevel], &files, ix);
            }
        }

        // A taller stack would otherwise split flushes excessively, so the
        // threshold scales with the sublevel count.
        let effective_max = flush_split_max_bytes.saturating_mul(levels.len() as i64);
        let mut flush_split_user_keys: Vec<Bytes> = Vec::new();
        let mut cumulative = 0u64;
        for interval in &ordered_intervals {
            if effective_max > 0
                && cumulative > effective_max as u64
                && flush_split_user_keys
                    .last()
                    .map_or(true, |last| *last != interval.start_key.key)
            {
                flush_split_user_keys.push(interval.start_key.key.clone());
                cumulative = 0;
            }
            cumulative += interval.estimated_bytes;
        }

        tracing::trace!(
            files = files.len(),
            sublevels = levels.len(),
            intervals = ordered_intervals.len(),
            flush_splits = flush_split_user_keys.len(),
            "assembled L0 sublevels"
        );

        Ok(L0Sublevels {
            files,
            levels,
            ordered_intervals,
            flush_split_user_keys,
            file_bytes,
            cmp,
            format_key,
        })
    }

    /// Recomputes the per-interval compacting state from the files' flags
    /// and the given in-progress compactions. Must be called after
    /// construction, under the store's lock.
    ///
    /// The in-progress descriptors cover compactions whose original input
    /// files were already replaced but whose key range is still claimed:
    /// those intervals stay base-compacting even though no overlapping file
    /// carries the flag.
    pub fn init_compacting_file_info(&mut self, in_progress: &[L0Compaction]) {
        for interval in &mut self.ordered_intervals {
            interval.compacting_file_count = 0;
            interval.is_base_compacting = false;
            interval.interval_range_is_base_compacting = false;
        }

        for ix in 0..self.files.len() {
            if !self.files[ix].compacting {
                continue;
            }
            let (min, max, intra) = (
                self.files[ix].min_interval_index,
                self.files[ix].max_interval_index,
                self.files[ix].is_intra_l0_compacting,
            );
            for i in min..=max {
                let interval = &mut self.ordered_intervals[i];
                interval.compacting_file_count += 1;
                if !intra {
                    interval.is_base_compacting = true;
                }
            }
        }

        for c in in_progress {
            let start_ik = IntervalKey::at_smallest(c.smallest.user_key.clone());
            let end_ik = IntervalKey::after_largest(
                c.largest.user_key.clone(),
                c.largest.is_range_delete_sentinel(),
            );
            let start = self.ordered_intervals.partition_point(|iv| {
                interval_key_compare(&self.cmp, &iv.start_key, &start_ik).is_lt()
            });
            let end = self.ordered_intervals.partition_point(|iv| {
                interval_key_compare(&self.cmp, &iv.start_key, &end_ik).is_lt()
            });
            for i in start..end.min(self.ordered_intervals.len()) {
                if !c.is_intra_l0 {
                    self.ordered_intervals[i].is_base_compacting = true;
                }
            }
        }

        // Propagate over each base-compacting interval's file span, tracking
        // the furthest interval already marked to stay linear.
        let mut marked_up_to = 0;
        for i in 0..self.ordered_intervals.len() {
            if !self.ordered_intervals[i].is_base_compacting {
                continue;
            }
            let lo = self.ordered_intervals[i]
                .files_min_interval_index
                .max(marked_up_to);
            let hi = self.ordered_intervals[i].files_max_interval_index;
            for j in lo..=hi {
                marked_up_to = j;
                self.ordered_intervals[j].interval_range_is_base_compacting = true;
            }
        }
    }

    /// Incremental variant of
    /// [`init_compacting_file_info`](L0Sublevels::init_compacting_file_info)
    /// for a compaction the picker just chose. `inputs` are the L0 indices of
    /// its L0 input files, whose `compacting` flags the caller has already
    /// set. Requires the store's lock.
    pub fn update_state_for_started_compaction(&mut self, inputs: &[usize], is_base: bool) {
        let mut min_interval: Option<usize> = None;
        let mut max_interval = 0;
        for &ix in inputs {
            let (fmin, fmax) = (
                self.files[ix].min_interval_index,
                self.files[ix].max_interval_index,
            );
            for i in fmin..=fmax {
                self.ordered_intervals[i].compacting_file_count += 1;
            }
            min_interval = Some(min_interval.map_or(fmin, |m| m.min(fmin)));
            max_interval = max_interval.max(fmax);
        }
        if !is_base {
            return;
        }
        let Some(min_interval) = min_interval else {
            return;
        };
        for i in min_interval..=max_interval {
            self.ordered_intervals[i].is_base_compacting = true;
            let (lo, hi) = (
                self.ordered_intervals[i].files_min_interval_index,
                self.ordered_intervals[i].files_max_interval_index,
            );
            for j in lo..=hi {
                self.ordered_intervals[j].interval_range_is_base_compacting = true;
            }
        }
    }

    /// Sets a file's compacting flags. Requires the store's lock; does not
    /// touch interval counters (use
    /// [`update_state_for_started_compaction`](L0Sublevels::update_state_for_started_compaction)).
    pub fn mark_compacting(&mut self, l0_index: usize, is_intra_l0: bool) {
        let f = &mut self.files[l0_index];
        f.compacting = true;
        f.is_intra_l0_compacting = is_intra_l0;
    }

    /// Clears a file's compacting flags. Requires the store's lock.
    pub fn clear_compacting(&mut self, l0_index: usize) {
        let f = &mut self.files[l0_index];
        f.compacting = false;
        f.is_intra_l0_compacting = false;
    }

    /// L0's contribution to point-read amplification: the maximum number of
    /// files stacked over any single interval. Always at most the sublevel
    /// count.
    pub fn read_amplification(&self) -> usize {
        self.ordered_intervals
            .iter()
            .map(|iv| iv.file_count)
            .max()
            .unwrap_or(0)
    }

    /// Estimated maximum stack depth once all ongoing compactions complete.
    /// Drives the L0 compaction score; intra-L0 compactions have no score of
    /// their own and only run when no L0 -> Lbase compaction can be picked.
    pub fn max_depth_after_ongoing_compactions(&self) -> usize {
        self.ordered_intervals
            .iter()
            .map(|iv| iv.file_count.saturating_sub(iv.compacting_file_count))
            .max()
            .unwrap_or(0)
    }

    /// User keys at which flushes should start a new table, so flushed
    /// tables do not straddle them. These are user keys so range tombstones
    /// can be truncated at the split point.
    pub fn flush_split_keys(&self) -> &[Bytes] {
        &self.flush_split_user_keys
    }

    /// Total bytes across all L0 files.
    pub fn file_bytes(&self) -> u64 {
        self.file_bytes
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// The file record at `l0_index`.
    pub fn file(&self, l0_index: usize) -> &L0FileMeta {
        &self.files[l0_index]
    }

    /// All files, oldest to youngest.
    pub fn files(&self) -> &[L0FileMeta] {
        &self.files
    }

    pub fn sublevel_count(&self) -> usize {
        self.levels.len()
    }

    /// Files of one sublevel in key order.
    pub fn sublevel_files(&self, sublevel: usize) -> impl Iterator<Item = &L0FileMeta> + '_ {
        self.levels[sublevel].iter().map(move |&ix| &self.files[ix])
    }

    pub fn interval_count(&self) -> usize {
        self.ordered_intervals.len()
    }

    /// The ordered intervals, for inspection and diagnostics.
    pub fn intervals(&self) -> &[FileInterval] {
        &self.ordered_intervals
    }

    /// Textual dump of the sublevel structure; stable enough for golden
    /// tests. With `verbose`, each file is listed on its own line.
    pub fn describe(&self, verbose: bool) -> String {
        use std::fmt::Write as _;

        let mut buf = String::new();
        let _ = write!(
            buf,
            "file count: {}, sublevels: {}, intervals: {}\nflush split keys({}): [",
            self.files.len(),
            self.levels.len(),
            self.ordered_intervals.len(),
            self.flush_split_user_keys.len()
        );
        for (i, key) in self.flush_split_user_keys.iter().enumerate() {
            let _ = write!(buf, "{}", (self.format_key)(key));
            if i < self.flush_split_user_keys.len() - 1 {
                buf.push_str(", ");
            }
        }
        buf.push_str("]\n");

        let mut compacting_file_count = 0;
        for sl in (0..self.levels.len()).rev() {
            let level = &self.levels[sl];
            let mut max_intervals = 0;
            let mut sum_intervals = 0;
            let mut total_bytes = 0u64;
            for &ix in level {
                let f = &self.files[ix];
                max_intervals = max_intervals.max(f.interval_span());
                sum_intervals += f.interval_span();
                total_bytes += f.size;
                if f.compacting {
                    compacting_file_count += 1;
                }
            }
            let _ = writeln!(
                buf,
                "0.{}: file count: {}, bytes: {}, width (mean, max): {:.1}, {}, interval range: [{}, {}]",
                sl,
                level.len(),
                total_bytes,
                sum_intervals as f64 / level.len() as f64,
                max_intervals,
                self.files[level[0]].min_interval_index,
                self.files[*level.last().unwrap()].max_interval_index
            );
            for &ix in level {
                let f = &self.files[ix];
                if verbose {
                    let _ = writeln!(buf, "\t{}", f);
                }
                if self.files.len() > 50 && f.interval_span() * 3 > self.ordered_intervals.len() {
                    let interval_bytes: u64 = (f.min_interval_index..=f.max_interval_index)
                        .map(|k| self.ordered_intervals[k].estimated_bytes)
                        .sum();
                    let _ = writeln!(
                        buf,
                        "wide file: {}, [{}, {}], byte fraction: {:.6}",
                        f.file_number,
                        f.min_interval_index,
                        f.max_interval_index,
                        interval_bytes as f64 / self.file_bytes as f64
                    );
                }
            }
        }

        let _ = write!(
            buf,
            "compacting file count: {}, base compacting intervals: ",
            compacting_file_count
        );
        let n = self.ordered_intervals.len();
        let mut run_start: Option<usize> = None;
        let mut found_any = false;
        for i in 0..n {
            let interval = &self.ordered_intervals[i];
            if interval.file_count == 0 {
                continue;
            }
            if !interval.is_base_compacting {
                if let Some(start) = run_start.take() {
                    if found_any {
                        buf.push_str(", ");
                    }
                    let _ = write!(buf, "[{}, {}]", start, i - 1);
                    found_any = true;
                }
            } else if run_start.is_none() {
                run_start = Some(i);
            }
        }
        if let Some(start) = run_start {
            if found_any {
                buf.push_str(", ");
            }
            let _ = write!(buf, "[{}, {}]", start, n - 1);
        } else if !found_any {
            buf.push_str("none");
        }
        buf.push('\n');
        buf
    }
}

impl fmt::Display for L0Sublevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_base::{bytewise_compare, lossy_format_key, InternalKey, KeyKind};

    fn file(num: u64, smallest: &str, largest: &str, size: u64) -> L0FileMeta {
        L0FileMeta::new(
            num,
            size,
            InternalKey::new(Bytes::copy_from_slice(smallest.as_bytes()), num, KeyKind::Set),
            InternalKey::new(Bytes::copy_from_slice(largest.as_bytes()), num, KeyKind::Set),
            num,
            num,
        )
    }

    fn build(files: Vec<L0FileMeta>) -> L0Sublevels {
        L0Sublevels::new(files, bytewise_compare(), lossy_format_key(), 0).unwrap()
    }

    #[test]
    fn test_insert_into_sublevel_keeps_key_order() {
        let files = vec![
            file(1, "a", "b", 10),
            file(2, "g", "h", 10),
            file(3, "d", "e", 10),
        ];
        let s = build(files);
        assert_eq!(s.sublevel_count(), 1);
        let nums: Vec<u64> = s.sublevel_files(0).map(|f| f.file_number).collect();
        assert_eq!(nums, vec![1, 3, 2]);
    }

    #[test]
    fn test_interval_spans() {
        // Files [a,e], [b,g], [e,j]: boundaries a, b, e, e+, g+, j+.
        let files = vec![
            file(1, "a", "e", 10),
            file(2, "b", "g", 10),
            file(3, "e", "j", 10),
        ];
        let s = build(files);
        assert_eq!(s.interval_count(), 6);
        assert_eq!(
            (s.file(0).min_interval_index, s.file(0).max_interval_index),
            (0, 2)
        );
        assert_eq!(
            (s.file(1).min_interval_index, s.file(1).max_interval_index),
            (1, 3)
        );
        assert_eq!(
            (s.file(2).min_interval_index, s.file(2).max_interval_index),
            (2, 4)
        );
    }

    #[test]
    fn test_sublevel_stacking() {
        let files = vec![
            file(1, "a", "d", 10),
            file(2, "c", "f", 10),
            file(3, "e", "h", 10),
        ];
        let s = build(files);
        assert_eq!(s.file(0).sublevel, 0);
        assert_eq!(s.file(1).sublevel, 1);
        // Overlaps file 2 but not file 1.
        assert_eq!(s.file(2).sublevel, 2);
        assert_eq!(s.read_amplification(), 2);
    }

    #[test]
    fn test_sentinel_largest_is_exclusive() {
        let mut left = file(1, "a", "c", 10);
        left.largest = InternalKey::range_delete_sentinel(&b"c"[..]);
        let right = file(2, "c", "e", 10);
        let s = build(vec![left, right]);
        // The shared boundary does not make the files overlap.
        assert_eq!(s.sublevel_count(), 1);
        assert_eq!(s.read_amplification(), 1);
    }

    #[test]
    fn test_empty_l0() {
        let s = build(Vec::new());
        assert_eq!(s.sublevel_count(), 0);
        assert_eq!(s.interval_count(), 0);
        assert_eq!(s.read_amplification(), 0);
        assert_eq!(s.max_depth_after_ongoing_compactions(), 0);
        assert!(s.flush_split_keys().is_empty());
    }

    #[test]
    fn test_estimated_bytes_interpolation() {
        // One wide file over three intervals, 90 bytes: 30 per interval.
        let files = vec![file(1, "a", "z", 90), file(2, "c", "e", 12)];
        let s = build(files);
        let wide_span = s.file(0).interval_span();
        assert_eq!(wide_span, 3);
        for i in 0..3 {
            assert!(s.ordered_intervals[i].estimated_bytes >= 30);
        }
    }

    #[test]
    fn test_update_state_for_started_compaction() {
        let files = vec![file(1, "a", "d", 10), file(2, "a", "d", 10)];
        let mut s = build(files);
        s.init_compacting_file_info(&[]);
        assert_eq!(s.max_depth_after_ongoing_compactions(), 2);

        s.mark_compacting(0, false);
        s.update_state_for_started_compaction(&[0], true);
        assert_eq!(s.max_depth_after_ongoing_compactions(), 1);
        for i in s.file(0).min_interval_index..=s.file(0).max_interval_index {
            assert!(s.ordered_intervals[i].is_base_compacting);
            assert!(s.ordered_intervals[i].interval_range_is_base_compacting);
        }
    }

    #[test]
    fn test_in_progress_range_marks_base_compacting() {
        let files = vec![file(1, "a", "d", 10), file(2, "f", "j", 10)];
        let mut s = build(files);
        // A base compaction claims [a, d] by range only; no file carries the
        // compacting flag.
        let claim = L0Compaction {
            smallest: InternalKey::new(&b"a"[..], 0, KeyKind::Set),
            largest: InternalKey::new(&b"d"[..], 0, KeyKind::Set),
            is_intra_l0: false,
        };
        s.init_compacting_file_info(&[claim]);
        let f = s.file(0);
        for i in f.min_interval_index..=f.max_interval_index {
            assert!(s.ordered_intervals[i].is_base_compacting);
        }
        let g = s.file(1);
        for i in g.min_interval_index..=g.max_interval_index {
            assert!(!s.ordered_intervals[i].is_base_compacting);
        }
    }
}
