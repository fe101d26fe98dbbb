//! Sublevel organization and compaction picking for L0 of an LSM tree.
//!
//! L0 accepts freshly flushed tables whose key ranges overlap arbitrarily.
//! This crate organizes a snapshot of L0 file metadata into a stack of
//! *sublevels* (each internally non-overlapping, like a regular level, but
//! with higher indices holding *younger* data), exposes read-amplification
//! and flush-splitting information derived from the stack, and picks
//! candidate compactions: L0 -> Lbase to drain L0 downward, and intra-L0 to
//! consolidate when draining is blocked.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Construction                           │
//! │  L0FileMeta snapshot (oldest → youngest)                     │
//! │      │                                                       │
//! │      ├─ Interval index     boundary keys → half-open         │
//! │      │                     intervals; file → interval span   │
//! │      ├─ Sublevel assembly  lowest non-overlapping sublevel   │
//! │      │                     per file                          │
//! │      └─ Flush-split plan   split keys once estimated bytes   │
//! │                            exceed max × sublevel count       │
//! └──────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Queries                               │
//! │  read_amplification      max files stacked over an interval  │
//! │  max_depth_after_…       depth net of ongoing compactions    │
//! │  flush_split_keys        user keys to break flushes at       │
//! │  pick_base_compaction    seed deep interval, grow down,      │
//! │                          reject on Lbase conflict            │
//! │  pick_intra_l0_…         seed below unflushed barrier,       │
//! │                          grow down, widen to rectangle       │
//! │  extend_l0_for_base_…    widen a chosen candidate between    │
//! │                          exclusive Lbase bounds              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The structure is immutable after construction; only per-file compacting
//! flags and per-interval compacting counters change, under the caller's
//! lock (see [`L0Sublevels`] for the locking contract). The engine performs
//! no I/O, schedules nothing, and persists nothing — it is the geometry and
//! heuristics layer that the surrounding store consults on every compaction
//! pick.
//!
//! # Example
//!
//! ```
//! use silt_base::{bytewise_compare, lossy_format_key, InternalKey, KeyKind};
//! use silt_sublevels::{L0FileMeta, L0Sublevels};
//!
//! let files = vec![
//!     L0FileMeta::new(
//!         1,
//!         64 << 10,
//!         InternalKey::new(&b"a"[..], 10, KeyKind::Set),
//!         InternalKey::new(&b"d"[..], 19, KeyKind::Set),
//!         10,
//!         19,
//!     ),
//!     L0FileMeta::new(
//!         2,
//!         64 << 10,
//!         InternalKey::new(&b"c"[..], 20, KeyKind::Set),
//!         InternalKey::new(&b"f"[..], 29, KeyKind::Set),
//!         20,
//!         29,
//!     ),
//! ];
//! let mut s = L0Sublevels::new(
//!     files,
//!     bytewise_compare(),
//!     lossy_format_key(),
//!     2 << 20,
//! )
//! .unwrap();
//! s.init_compacting_file_info(&[]);
//! assert_eq!(s.sublevel_count(), 2);
//! assert_eq!(s.read_amplification(), 2);
//! let candidate = s.pick_base_compaction(2, &[]).unwrap().unwrap();
//! assert_eq!(candidate.files.len(), 2);
//! ```

mod bitset;
mod error;
mod interval;
mod metadata;
mod picker;
mod sublevels;

pub use bitset::BitSet;
pub use error::{Error, Result};
pub use interval::{interval_key_compare, FileInterval, IntervalKey};
pub use metadata::{sort_l0_files_by_seqno, BaseFileMeta, L0Compaction, L0FileMeta};
pub use picker::L0CompactionFiles;
pub use sublevels::L0Sublevels;

// Re-export for convenience
pub use bytes::Bytes;
