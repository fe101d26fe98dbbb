//! File metadata records consumed and produced by the sublevel engine.

use serde::{Deserialize, Serialize};
use silt_base::InternalKey;
use std::fmt;

/// Metadata for a single L0 table, as seen by the sublevel engine.
///
/// The key/size/seqno fields are fixed at table-creation time. The
/// `compacting`/`is_intra_l0_compacting` flags are owned by the surrounding
/// store's compaction bookkeeping and must only change under its lock (see
/// [`crate::L0Sublevels::mark_compacting`]). The placement fields
/// (`l0_index`, interval span, `sublevel`) are assigned once during engine
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L0FileMeta {
    /// Unique file number of the backing table.
    pub file_number: u64,

    /// File size in bytes.
    pub size: u64,

    /// Smallest internal key in the table.
    pub smallest: InternalKey,

    /// Largest internal key in the table. Inclusive, unless the trailer is
    /// the range-delete sentinel.
    pub largest: InternalKey,

    /// Minimum sequence number in the table.
    pub min_seqno: u64,

    /// Maximum sequence number in the table.
    pub max_seqno: u64,

    /// True while the file participates in any compaction.
    pub compacting: bool,

    /// True while the file participates in an intra-L0 compaction.
    /// `compacting && !is_intra_l0_compacting` means it is headed to Lbase.
    pub is_intra_l0_compacting: bool,

    /// Dense index in oldest-to-youngest L0 order.
    pub l0_index: usize,

    /// First interval this file overlaps.
    pub min_interval_index: usize,

    /// Last interval this file overlaps (inclusive).
    pub max_interval_index: usize,

    /// Sublevel the file was assigned to; 0 is the oldest sublevel.
    pub sublevel: usize,
}

impl L0FileMeta {
    /// Creates a record with the externally determined fields; placement is
    /// filled in by engine construction.
    pub fn new(
        file_number: u64,
        size: u64,
        smallest: InternalKey,
        largest: InternalKey,
        min_seqno: u64,
        max_seqno: u64,
    ) -> L0FileMeta {
        L0FileMeta {
            file_number,
            size,
            smallest,
            largest,
            min_seqno,
            max_seqno,
            compacting: false,
            is_intra_l0_compacting: false,
            l0_index: 0,
            min_interval_index: 0,
            max_interval_index: 0,
            sublevel: 0,
        }
    }

    /// Number of intervals this file overlaps.
    pub fn interval_span(&self) -> usize {
        self.max_interval_index - self.min_interval_index + 1
    }
}

impl fmt::Display for L0FileMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}:[{}-{}]", self.file_number, self.smallest, self.largest)
    }
}

/// The engine's view of an Lbase table: key bounds plus the compacting flag.
/// Base-compaction candidates are rejected when they overlap a compacting
/// Lbase table. Slices of these must be key-ordered and non-overlapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseFileMeta {
    pub file_number: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
    pub compacting: bool,
}

/// Describes an active compaction with inputs from L0, by key range. Used to
/// re-mark intervals whose original input files have since been replaced but
/// whose key range is still claimed by the compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L0Compaction {
    pub smallest: InternalKey,
    pub largest: InternalKey,
    pub is_intra_l0: bool,
}

/// Orders a freshly assembled L0 file list oldest to youngest, the order the
/// engine constructor requires: by minimum seqno, then maximum seqno, then
/// file number.
pub fn sort_l0_files_by_seqno(files: &mut [L0FileMeta]) {
    files.sort_by(|a, b| {
        (a.min_seqno, a.max_seqno, a.file_number).cmp(&(b.min_seqno, b.max_seqno, b.file_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_base::KeyKind;

    fn file(num: u64, min_seqno: u64, max_seqno: u64) -> L0FileMeta {
        L0FileMeta::new(
            num,
            1024,
            InternalKey::new(&b"a"[..], min_seqno, KeyKind::Set),
            InternalKey::new(&b"d"[..], max_seqno, KeyKind::Set),
            min_seqno,
            max_seqno,
        )
    }

    #[test]
    fn test_sort_by_seqno() {
        let mut files = vec![file(3, 10, 20), file(1, 1, 5), file(2, 10, 12)];
        sort_l0_files_by_seqno(&mut files);
        let nums: Vec<u64> = files.iter().map(|f| f.file_number).collect();
        assert_eq!(nums, vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_ties_break_on_file_number() {
        let mut files = vec![file(9, 4, 4), file(7, 4, 4)];
        sort_l0_files_by_seqno(&mut files);
        let nums: Vec<u64> = files.iter().map(|f| f.file_number).collect();
        assert_eq!(nums, vec![7, 9]);
    }

    #[test]
    fn test_display() {
        let f = file(12, 3, 9);
        assert_eq!(f.to_string(), "000012:[a#3,SET-d#9,SET]");
    }
}
