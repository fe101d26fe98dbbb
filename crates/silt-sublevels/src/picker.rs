//! Compaction picking over the sublevel stack.
//!
//! The stack is a 2-D plane: intervals left to right, sublevels bottom
//! (oldest) to top (youngest). Under flush pressure most files are narrow,
//! so the plane is wide and tall, and a good compaction captures a thin,
//! tall rectangle: few intervals, many sublevels, large stack-depth
//! reduction per byte rewritten.
//!
//! ```text
//!     L0.3  a--d    g-j
//!     L0.2         f--j          r-t
//!     L0.1   b-d  e---j
//!     L0.0  a--d   f--j  l--o  p-----x
//!
//!     Lbase a--------i    m---------w
//! ```
//!
//! An L0 -> Lbase compaction seeds at a deep interval (here `[g,j)`), takes
//! the interval's files bottom-up, and after each one pulls in every
//! overlapping file in the sublevels below, since an older version of a key
//! must never be left behind when a younger one moves to Lbase. The result
//! grows downward like a triangle; it is widened into a rectangle later,
//! when the chosen Lbase files are known, via
//! [`L0Sublevels::extend_l0_for_base_compaction_to`].
//!
//! An intra-L0 compaction runs only when no base compaction can be picked
//! (for example, both Lbase files above are compacting). It seeds at the top
//! of a deep interval and grows downward, pulling in younger overlapping
//! files above each addition, with one extra barrier: files whose largest
//! seqno is at or past the earliest unflushed seqno stay out, so the
//! compaction's output never reorders against a flush in progress.
//!
//! Both builders cap growth once the candidate is already deep enough:
//! past 100 MiB, a step that grows bytes by more than 1.5x, or past a hard
//! 500 MiB, stops at the previous snapshot. The snapshot taken after the
//! first step is exempt, so a viable candidate is never rejected solely for
//! its seed file's size.

use crate::bitset::BitSet;
use crate::error::{Error, Result};
use crate::metadata::{BaseFileMeta, L0FileMeta};
use crate::sublevels::L0Sublevels;
use silt_base::InternalKey;
use std::cmp::Ordering;

/// A candidate set of L0 files for compaction, and the bookkeeping used
/// while growing it and when comparing candidates.
#[derive(Debug, Clone)]
pub struct L0CompactionFiles {
    /// L0 indices of the participating files.
    pub files: Vec<usize>,

    /// Bit per `l0_index`; mirrors `files` for O(1) membership.
    pub files_included: BitSet,

    /// The deep interval this candidate was seeded from.
    pub seed_interval: usize,

    /// How many sublevels of the seed interval participate. The picker's
    /// measure of how much the compaction reduces stack depth.
    pub seed_interval_stack_depth_reduction: usize,

    /// Sublevel range participating in the seed interval. Base compactions
    /// pin the min to 0; intra-L0 compactions pin the max to the top.
    pub seed_interval_min_level: usize,
    pub seed_interval_max_level: usize,

    /// Union of the interval spans of all participating files, inclusive.
    pub min_interval_index: usize,
    pub max_interval_index: usize,

    /// Sum of participating file sizes.
    pub file_bytes: u64,

    pub is_intra_l0: bool,

    /// Intra-L0 only: files with `max_seqno` at or past this stay out.
    pub earliest_unflushed_seqno: u64,

    // Bounds before rectangle extension, and the trail of added files; kept
    // for the debug-build sanity checker.
    pub(crate) pre_extension_min_interval: usize,
    pub(crate) pre_extension_max_interval: usize,
    pub(crate) files_added: Vec<usize>,
}

impl L0CompactionFiles {
    fn seeded_at(
        seed: &L0FileMeta,
        interval_index: usize,
        file_count: usize,
        is_intra_l0: bool,
        earliest_unflushed_seqno: u64,
        seed_interval_max_level: usize,
    ) -> L0CompactionFiles {
        let mut c = L0CompactionFiles {
            files: Vec::new(),
            files_included: BitSet::new(file_count),
            seed_interval: interval_index,
            seed_interval_stack_depth_reduction: 0,
            seed_interval_min_level: 0,
            seed_interval_max_level,
            min_interval_index: seed.min_interval_index,
            max_interval_index: seed.max_interval_index,
            file_bytes: 0,
            is_intra_l0,
            earliest_unflushed_seqno,
            pre_extension_min_interval: 0,
            pre_extension_max_interval: 0,
            files_added: Vec::new(),
        };
        c.add_file(seed);
        c
    }

    /// Adds a file, widening the candidate's interval bounds.
    fn add_file(&mut self, f: &L0FileMeta) {
        if self.files_included.get(f.l0_index) {
            return;
        }
        self.files_included.mark(f.l0_index);
        self.files.push(f.l0_index);
        self.files_added.push(f.l0_index);
        self.file_bytes += f.size;
        if f.min_interval_index < self.min_interval_index {
            self.min_interval_index = f.min_interval_index;
        }
        if f.max_interval_index > self.max_interval_index {
            self.max_interval_index = f.max_interval_index;
        }
    }

    /// Rebuilds the inclusion bit set from `files`; used when a snapshot is
    /// promoted to the final candidate.
    fn rebuild_included(&mut self) {
        self.files_included.clear_all();
        for &ix in &self.files {
            self.files_included.mark(ix);
        }
    }
}

/// Growth cap shared by both builders: once the previous snapshot already
/// reduces stack depth enough, stop before a step that makes the compaction
/// unreasonably large. Long-running compactions starve concurrency in L0 and
/// below, so slow growth is preferred and 500 MiB is a hard limit.
fn growth_capped(
    last: &L0CompactionFiles,
    current: &L0CompactionFiles,
    min_compaction_depth: usize,
) -> bool {
    last.seed_interval_stack_depth_reduction >= min_compaction_depth
        && current.file_bytes > 100 << 20
        && (current.file_bytes as f64 / last.file_bytes as f64 > 1.5
            || current.file_bytes > 500 << 20)
}

impl L0Sublevels {
    /// Picks an L0 -> Lbase compaction of depth at least
    /// `min_compaction_depth`, or `Ok(None)` when no interval yields one.
    /// `base_files` is the key-ordered Lbase level; a candidate overlapping
    /// a compacting Lbase file is discarded. Requires the store's lock.
    ///
    /// Intervals are tried deepest-first, with intervals far from any
    /// ongoing base compaction boosted by the sublevel count, since a
    /// candidate there is least likely to be blocked. An interval whose
    /// span was already covered by an earlier seed file is skipped; the seed
    /// it would pick is almost certainly the same.
    pub fn pick_base_compaction(
        &self,
        min_compaction_depth: usize,
        base_files: &[BaseFileMeta],
    ) -> Result<Option<L0CompactionFiles>> {
        let sublevel_count = self.levels.len();
        let mut scored: Vec<(usize, usize)> = Vec::with_capacity(self.ordered_intervals.len());
        for (i, interval) in self.ordered_intervals.iter().enumerate() {
            let depth = interval.file_count.saturating_sub(interval.compacting_file_count);
            if interval.is_base_compacting || depth < min_compaction_depth {
                continue;
            }
            let score = if interval.interval_range_is_base_compacting {
                depth
            } else {
                depth + sublevel_count
            };
            scored.push((i, score));
        }
        scored.sort_unstable_by(|a, b| b.1.cmp(&a.1));

        let mut considered = BitSet::new(self.ordered_intervals.len());
        for &(interval_index, _) in &scored {
            if considered.get(interval_index) {
                continue;
            }

            // Seed with the interval's lowest-sublevel file. Its span is
            // marked considered even though other intervals under it may
            // hold lower-sublevel seeds of their own; cheap over exact.
            let Some(&seed_ix) = self.ordered_intervals[interval_index].files.first() else {
                return Err(Error::NoSeedFile);
            };
            let seed = &self.files[seed_ix];
            considered.mark_range(seed.min_interval_index, seed.max_interval_index + 1);
            if seed.compacting {
                if seed.is_intra_l0_compacting {
                    continue;
                }
                // A base-compacting file's intervals are all skipped above,
                // so reaching one here means the flags and counters
                // disagree.
                return Err(Error::SeedFileCompacting {
                    file_number: seed.file_number,
                });
            }

            let Some(c) = self.base_compaction_using_seed(seed_ix, interval_index, min_compaction_depth)
            else {
                continue;
            };

            // The compaction would mark overlapping Lbase files compacting;
            // discard it if any of them already are.
            let start_key = &self.ordered_intervals[c.min_interval_index].start_key.key;
            let end_key = &self.ordered_intervals[c.max_interval_index + 1].start_key;
            let mut m = base_files.partition_point(|b| {
                (self.cmp)(&b.largest.user_key, start_key) == Ordering::Less
            });
            let mut base_compacting = false;
            while m < base_files.len() && !base_compacting {
                let b = &base_files[m];
                // The candidate ends at the exclusive bound formed by the
                // interval past its last one.
                let ord = (self.cmp)(&b.smallest.user_key, &end_key.key);
                if ord == Ordering::Greater || (ord == Ordering::Equal && !end_key.is_largest) {
                    break;
                }
                base_compacting = base_compacting || b.compacting;
                m += 1;
            }
            if base_compacting {
                tracing::trace!(
                    seed_interval = c.seed_interval,
                    "base compaction candidate overlaps compacting Lbase file, skipping"
                );
                continue;
            }
            tracing::debug!(
                seed_interval = c.seed_interval,
                files = c.files.len(),
                bytes = c.file_bytes,
                depth_reduction = c.seed_interval_stack_depth_reduction,
                "picked L0 -> Lbase compaction candidate"
            );
            return Ok(Some(c));
        }
        Ok(None)
    }

    /// Builds a base compaction from the seed interval's lowest-sublevel
    /// file upward, returning `None` when the result does not reach
    /// `min_compaction_depth`.
    fn base_compaction_using_seed(
        &self,
        seed_ix: usize,
        interval_index: usize,
        min_compaction_depth: usize,
    ) -> Option<L0CompactionFiles> {
        let mut c = L0CompactionFiles::seeded_at(
            &self.files[seed_ix],
            interval_index,
            self.files.len(),
            false,
            0,
            0,
        );

        let mut last_candidate: Option<L0CompactionFiles> = None;
        let interval = &self.ordered_intervals[interval_index];
        for i in 0..interval.files.len() {
            let f2 = &self.files[interval.files[i]];
            if f2.compacting {
                // An intra-L0 compaction owns this file (a base-compacting
                // file would have disqualified the whole interval). Stop
                // stacking; the candidate so far is still valid.
                break;
            }
            let sl = f2.sublevel;
            c.seed_interval_stack_depth_reduction += 1;
            c.seed_interval_max_level = sl;
            c.add_file(f2);
            // The newly added file may overlap files in even lower
            // sublevels; pull those in too, and everything they in turn
            // overlap further down. Younger versions of a key must not move
            // to Lbase while older versions stay behind, so completeness
            // downward is required; filling upward is left to rectangle
            // extension if this candidate is chosen.
            let mut blocked = false;
            for curr_level in (0..sl).rev() {
                if !self.extend_files(curr_level, u64::MAX, &mut c) {
                    blocked = true;
                    break;
                }
            }
            if blocked {
                break;
            }
            match &last_candidate {
                Some(last) if growth_capped(last, &c, min_compaction_depth) => break,
                _ => {}
            }
            last_candidate = Some(c.clone());
        }
        match last_candidate {
            Some(mut last) if last.seed_interval_stack_depth_reduction >= min_compaction_depth => {
                last.rebuild_included();
                Some(last)
            }
            _ => None,
        }
    }

    /// Picks an intra-L0 compaction of depth at least
    /// `min_compaction_depth`, consolidating files that all predate
    /// `earliest_unflushed_seqno`. Only called when no base compaction could
    /// be picked. Requires the store's lock.
    pub fn pick_intra_l0_compaction(
        &self,
        earliest_unflushed_seqno: u64,
        min_compaction_depth: usize,
    ) -> Result<Option<L0CompactionFiles>> {
        let mut scored: Vec<(usize, usize)> = Vec::new();
        for (i, interval) in self.ordered_intervals.iter().enumerate() {
            let depth = interval.file_count.saturating_sub(interval.compacting_file_count);
            if depth < min_compaction_depth {
                continue;
            }
            scored.push((i, depth));
        }
        scored.sort_unstable_by(|a, b| b.1.cmp(&a.1));

        let mut considered = BitSet::new(self.ordered_intervals.len());
        for &(interval_index, score) in &scored {
            if considered.get(interval_index) {
                continue;
            }
            let interval = &self.ordered_intervals[interval_index];
            if interval.files.is_empty() {
                return Err(Error::NoSeedFile);
            }

            // Scan down from the top of the interval for a seed below the
            // unflushed-seqno barrier. Every file passed over costs one
            // sublevel of the achievable depth reduction.
            let mut pos = interval.files.len();
            let mut stack_depth_reduction = score as isize;
            let mut found_seed = false;
            while pos > 0 {
                pos -= 1;
                let f = &self.files[interval.files[pos]];
                if f.compacting {
                    break;
                }
                considered.mark_range(f.min_interval_index, f.max_interval_index + 1);
                if f.max_seqno >= earliest_unflushed_seqno {
                    stack_depth_reduction -= 1;
                    if stack_depth_reduction == 0 {
                        break;
                    }
                } else {
                    found_seed = true;
                    break;
                }
            }
            if stack_depth_reduction < (min_compaction_depth as isize) {
                continue;
            }
            let seed_ix = interval.files[pos];
            if !found_seed || self.files[seed_ix].compacting {
                // Either a concurrent compaction owns the top of this
                // interval, or everything below the barrier is spoken for.
                continue;
            }

            if let Some(c) = self.intra_l0_compaction_using_seed(
                seed_ix,
                interval_index,
                earliest_unflushed_seqno,
                min_compaction_depth,
            ) {
                tracing::debug!(
                    seed_interval = c.seed_interval,
                    files = c.files.len(),
                    bytes = c.file_bytes,
                    depth_reduction = c.seed_interval_stack_depth_reduction,
                    "picked intra-L0 compaction candidate"
                );
                return Ok(Some(c));
            }
        }
        Ok(None)
    }

    /// Builds an intra-L0 compaction from the seed downward, then widens it
    /// into a rectangle.
    fn intra_l0_compaction_using_seed(
        &self,
        seed_ix: usize,
        interval_index: usize,
        earliest_unflushed_seqno: u64,
        min_compaction_depth: usize,
    ) -> Option<L0CompactionFiles> {
        // Files overlapping the seed interval at or below the seed are known
        // to predate the barrier; files reached in other intervals are not,
        // and are filtered per file.
        let mut c = L0CompactionFiles::seeded_at(
            &self.files[seed_ix],
            interval_index,
            self.files.len(),
            true,
            earliest_unflushed_seqno,
            self.levels.len() - 1,
        );

        let mut last_candidate: Option<L0CompactionFiles> = None;
        let interval = &self.ordered_intervals[interval_index];
        let mut sl_index = interval.files.len() - 1;
        while interval.files[sl_index] != seed_ix {
            sl_index -= 1;
        }
        loop {
            let f2 = &self.files[interval.files[sl_index]];
            if f2.compacting {
                break;
            }
            let sl = f2.sublevel;
            c.seed_interval_stack_depth_reduction += 1;
            c.seed_interval_min_level = sl;
            c.add_file(f2);
            // Mirror image of the base builder: adding an older file must
            // pull in every younger overlapping file above it (below the
            // barrier), or a key's younger seqno would be left out of a file
            // that absorbs its older one.
            let mut blocked = false;
            for curr_level in (sl + 1)..self.levels.len() {
                if !self.extend_files(curr_level, earliest_unflushed_seqno, &mut c) {
                    blocked = true;
                    break;
                }
            }
            if blocked {
                break;
            }
            match &last_candidate {
                Some(last) if growth_capped(last, &c, min_compaction_depth) => break,
                _ => {}
            }
            last_candidate = Some(c.clone());
            if sl_index == 0 {
                break;
            }
            sl_index -= 1;
        }
        match last_candidate {
            Some(mut last) if last.seed_interval_stack_depth_reduction >= min_compaction_depth => {
                last.rebuild_included();
                self.extend_candidate_to_rectangle(
                    last.min_interval_index,
                    last.max_interval_index,
                    &mut last,
                    false,
                );
                Some(last)
            }
            _ => None,
        }
    }

    /// Pulls every file in sublevel `sl` overlapping the candidate's
    /// interval bounds into it, except files at or past `seqno_limit`, which
    /// may be skipped outright: they sit above every overlapping file below
    /// the limit, and the compaction output lands below them. Returns false
    /// if a compacting file overlaps, in which case the candidate must stop
    /// growing. Added files widen the bounds, and the scan continues under
    /// the widened bounds.
    pub(crate) fn extend_files(
        &self,
        sl: usize,
        seqno_limit: u64,
        c: &mut L0CompactionFiles,
    ) -> bool {
        let level = &self.levels[sl];
        let mut index = level
            .partition_point(|&ix| self.files[ix].max_interval_index < c.min_interval_index);
        while index < level.len() {
            let f = &self.files[level[index]];
            if f.min_interval_index > c.max_interval_index {
                break;
            }
            if f.compacting {
                return false;
            }
            if f.max_seqno >= seqno_limit {
                index += 1;
                continue;
            }
            c.add_file(f);
            index += 1;
        }
        true
    }

    /// Optionally grows a chosen base compaction to cover more of L0 inside
    /// the exclusive user-key bounds `(smallest, largest)` — typically the
    /// bounds of the Lbase files already participating, beyond which growing
    /// would pull additional Lbase files in. An invalid key leaves that side
    /// unbounded. Returns whether any file was added.
    pub fn extend_l0_for_base_compaction_to(
        &self,
        smallest: &InternalKey,
        largest: &InternalKey,
        candidate: &mut L0CompactionFiles,
    ) -> bool {
        let mut first_interval_index = 0usize;
        let mut last_interval_index = self.ordered_intervals.len() as isize - 1;
        if smallest.is_valid() {
            first_interval_index = if smallest.is_range_delete_sentinel() {
                // The bound is already exclusive; an interval starting at
                // the bound's user key is fair game.
                self.ordered_intervals.partition_point(|iv| {
                    (self.cmp)(&smallest.user_key, &iv.start_key.key) == Ordering::Greater
                })
            } else {
                self.ordered_intervals.partition_point(|iv| {
                    (self.cmp)(&smallest.user_key, &iv.start_key.key) != Ordering::Less
                })
            };
        }
        if largest.is_valid() {
            let mut li = self.ordered_intervals.partition_point(|iv| {
                (self.cmp)(&largest.user_key, &iv.start_key.key) == Ordering::Greater
            }) as isize;
            // li starts at or past the bound; step back to the last interval
            // wholly inside it, unless the search ran off the end.
            if (li as usize) < self.ordered_intervals.len() {
                li -= 1;
            }
            li -= 1;
            last_interval_index = li;
        }
        if last_interval_index < first_interval_index as isize {
            return false;
        }
        self.extend_candidate_to_rectangle(
            first_interval_index,
            last_interval_index as usize,
            candidate,
            true,
        )
    }

    /// Best-effort widening of a candidate toward the rectangle
    /// `[min_interval_index, max_interval_index]` x (seed sublevel range).
    /// Walks sublevels outward from the seed side — bottom-up for base
    /// compactions, top-down for intra-L0 — because whatever a sublevel
    /// cannot contribute constrains every sublevel after it. Strictly
    /// optional: stopping early at any point leaves a correct candidate.
    ///
    /// Within one sublevel, a file overhanging the current bounds is
    /// excluded and shrinks them; among the in-bounds files, the longest run
    /// of consecutive non-compacting files wins, except that a run already
    /// containing picked files wins outright regardless of length (dropping
    /// picked files is not an option). Returns whether any file was added.
    pub(crate) fn extend_candidate_to_rectangle(
        &self,
        min_interval_index: usize,
        max_interval_index: usize,
        candidate: &mut L0CompactionFiles,
        is_base: bool,
    ) -> bool {
        candidate.pre_extension_min_interval = candidate.min_interval_index;
        candidate.pre_extension_max_interval = candidate.max_interval_index;
        let mut min_i = min_interval_index.min(candidate.min_interval_index) as isize;
        let mut max_i = max_interval_index.max(candidate.max_interval_index) as isize;

        let sublevel_order: Vec<usize> = if is_base {
            (0..=candidate.seed_interval_max_level).collect()
        } else {
            (candidate.seed_interval_min_level..self.levels.len())
                .rev()
                .collect()
        };

        let mut added_count = 0usize;
        for &sl in &sublevel_order {
            let level = &self.levels[sl];
            let mut index = level
                .partition_point(|&ix| (self.files[ix].max_interval_index as isize) < min_i);
            // Files fully inside the current bounds; overhanging files are
            // excluded and tighten the bounds for this and later sublevels.
            let mut first_index: isize = -1;
            let mut last_index: isize = -1;
            while index < level.len() {
                let f = &self.files[level[index]];
                let fmin = f.min_interval_index as isize;
                let fmax = f.max_interval_index as isize;
                if fmin > max_i {
                    break;
                }
                let mut include = true;
                if fmin < min_i {
                    include = false;
                    min_i = fmax + 1;
                }
                if fmax > max_i {
                    include = false;
                    max_i = fmin - 1;
                }
                if include {
                    if first_index == -1 {
                        first_index = index as isize;
                    }
                    last_index = index as isize;
                }
                index += 1;
            }
            if min_i > max_i {
                // Exclusions collapsed the rectangle.
                break;
            }
            if first_index < 0 {
                continue;
            }
            let first_index = first_index as usize;
            let last_index = last_index as usize;

            // Choose among [first_index, last_index] the run of consecutive
            // non-compacting files to keep: a run containing already-picked
            // files wins outright, otherwise the longest run.
            let mut run_first: isize = -1;
            let mut run_has_picked = false;
            let mut chosen_first: isize = -1;
            let mut chosen_last: isize = -1;
            let mut chosen_has_picked = false;
            let mut idx = first_index;
            while idx <= last_index {
                let f = &self.files[level[idx]];
                if f.compacting {
                    if run_first != -1 {
                        let run_last = idx as isize - 1;
                        if !chosen_has_picked
                            && (chosen_first == -1
                                || run_has_picked
                                || run_last - run_first > chosen_last - chosen_first)
                        {
                            chosen_first = run_first;
                            chosen_last = run_last;
                            chosen_has_picked = run_has_picked;
                        }
                    }
                    run_first = -1;
                    run_has_picked = false;
                    idx += 1;
                    continue;
                }
                if run_first == -1 {
                    run_first = idx as isize;
                }
                if candidate.files_included.get(f.l0_index) {
                    run_has_picked = true;
                }
                idx += 1;
            }
            if run_first != -1 {
                let run_last = idx as isize - 1;
                if !chosen_has_picked
                    && (chosen_first == -1
                        || run_has_picked
                        || run_last - run_first > chosen_last - chosen_first)
                {
                    chosen_first = run_first;
                    chosen_last = run_last;
                }
            }
            if chosen_first == -1 {
                // Everything in bounds is compacting. Gaps between the
                // compacting files could be exploited, but not worth it.
                break;
            }
            let chosen_first = chosen_first as usize;
            let chosen_last = chosen_last as usize;

            // The excluded compacting neighbors bound what later sublevels
            // may use.
            if chosen_first > first_index {
                min_i = self.files[level[chosen_first - 1]].max_interval_index as isize + 1;
            }
            if chosen_last < last_index {
                max_i = self.files[level[chosen_last + 1]].min_interval_index as isize - 1;
            }
            for idx in chosen_first..=chosen_last {
                let f = &self.files[level[idx]];
                debug_assert!(
                    !f.compacting,
                    "file {:06} in chosen run expected to not be compacting",
                    f.file_number
                );
                if candidate.is_intra_l0 && f.max_seqno >= candidate.earliest_unflushed_seqno {
                    continue;
                }
                if !candidate.files_included.get(f.l0_index) {
                    added_count += 1;
                    candidate.add_file(f);
                }
            }
        }
        added_count > 0
    }

    /// Debug-build sanity checker: panics if any file whose
    /// `(sublevel, interval span)` rectangle overlaps the candidate's
    /// rectangle is missing from it, walking sublevels seed-outward the same
    /// way the candidate was grown, or if an intra-L0 candidate's rectangle
    /// overlaps a file at or past its unflushed-seqno barrier. Suited to
    /// base candidates and settled (post-flush) intra-L0 shapes; an intra-L0
    /// candidate legitimately excludes barrier files inside its rectangle,
    /// which this check refuses.
    #[cfg(debug_assertions)]
    pub fn check_compaction(&self, c: &L0CompactionFiles) {
        let mut included = BitSet::new(self.files.len());
        let mut level_ranges = vec![(usize::MAX, 0usize); self.levels.len()];
        let mut top_level = if c.is_intra_l0 { self.levels.len() - 1 } else { 0 };
        for &ix in &c.files {
            let f = &self.files[ix];
            let r = &mut level_ranges[f.sublevel];
            r.0 = r.0.min(f.min_interval_index);
            r.1 = r.1.max(f.max_interval_index);
            included.mark(ix);
            if c.is_intra_l0 {
                top_level = top_level.min(f.sublevel);
            } else {
                top_level = top_level.max(f.sublevel);
            }
        }
        let order: Vec<usize> = if c.is_intra_l0 {
            (top_level..self.levels.len()).collect()
        } else {
            (0..=top_level).rev().collect()
        };
        let mut min = level_ranges[top_level].0;
        let mut max = level_ranges[top_level].1;
        for &sl in &order {
            if level_ranges[sl].0 < min {
                min = level_ranges[sl].0;
            }
            if level_ranges[sl].1 > max {
                max = level_ranges[sl].1;
            }
            let level = &self.levels[sl];
            let mut index =
                level.partition_point(|&ix| self.files[ix].max_interval_index < min);
            while index < level.len() {
                let f = &self.files[level[index]];
                if f.min_interval_index > max {
                    break;
                }
                if c.is_intra_l0 && f.max_seqno >= c.earliest_unflushed_seqno {
                    panic!(
                        "file {:06} in compaction rectangle has seqnos past the earliest unflushed seqno {}: {}-{}",
                        f.file_number, c.earliest_unflushed_seqno, f.min_seqno, f.max_seqno
                    );
                }
                if !included.get(f.l0_index) {
                    panic!(
                        "file {:06} (sublevel {}, span [{}, {}]) overlaps candidate \
                         (intra: {}, seed interval {}, bounds [{}, {}], pre-extension [{}, {}]) but is not included",
                        f.file_number,
                        f.sublevel,
                        f.min_interval_index,
                        f.max_interval_index,
                        c.is_intra_l0,
                        c.seed_interval,
                        c.min_interval_index,
                        c.max_interval_index,
                        c.pre_extension_min_interval,
                        c.pre_extension_max_interval,
                    );
                }
                index += 1;
            }
        }
    }
}
