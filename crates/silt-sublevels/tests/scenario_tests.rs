//! End-to-end scenarios for sublevel assembly, flush splitting, and
//! compaction picking, with hand-checked expectations.

use bytes::Bytes;
use silt_base::{bytewise_compare, lossy_format_key, InternalKey, KeyKind};
use silt_sublevels::{BaseFileMeta, L0FileMeta, L0Sublevels};

const MIB: u64 = 1 << 20;

fn key(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn l0_file(num: u64, smallest: &str, largest: &str, size: u64) -> L0FileMeta {
    let (min_seqno, max_seqno) = (num * 10, num * 10 + 5);
    L0FileMeta::new(
        num,
        size,
        InternalKey::new(key(smallest), min_seqno, KeyKind::Set),
        InternalKey::new(key(largest), max_seqno, KeyKind::Set),
        min_seqno,
        max_seqno,
    )
}

fn build(files: Vec<L0FileMeta>, flush_split_max_bytes: i64) -> L0Sublevels {
    let mut s = L0Sublevels::new(
        files,
        bytewise_compare(),
        lossy_format_key(),
        flush_split_max_bytes,
    )
    .unwrap();
    s.init_compacting_file_info(&[]);
    s
}

#[test]
fn test_thin_tall_stack() {
    let files = vec![
        l0_file(1, "a", "d", 100),
        l0_file(2, "a", "d", 100),
        l0_file(3, "a", "d", 100),
    ];
    let s = build(files, MIB as i64);

    assert_eq!(s.sublevel_count(), 3);
    for sl in 0..3 {
        assert_eq!(s.sublevel_files(sl).count(), 1);
    }
    assert_eq!(s.interval_count(), 2);
    assert_eq!(s.read_amplification(), 3);
    assert!(s.flush_split_keys().is_empty());

    let c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    assert_eq!(c.files.len(), 3);
    assert_eq!(c.seed_interval_stack_depth_reduction, 3);
    assert_eq!(c.seed_interval_min_level, 0);
    assert_eq!(c.seed_interval_max_level, 2);
    assert!(!c.is_intra_l0);
    #[cfg(debug_assertions)]
    s.check_compaction(&c);
}

#[test]
fn test_wide_file_blocks_stacking() {
    let files = vec![l0_file(1, "a", "z", 10), l0_file(2, "c", "e", 10)];
    let s = build(files, MIB as i64);

    assert_eq!(s.sublevel_count(), 2);
    let level0: Vec<u64> = s.sublevel_files(0).map(|f| f.file_number).collect();
    let level1: Vec<u64> = s.sublevel_files(1).map(|f| f.file_number).collect();
    assert_eq!(level0, vec![1]);
    assert_eq!(level1, vec![2]);

    // Boundaries a, c, e+, z+.
    assert_eq!(s.interval_count(), 4);
    let starts: Vec<(String, bool)> = s
        .intervals()
        .iter()
        .map(|iv| {
            (
                String::from_utf8_lossy(&iv.start_key.key).into_owned(),
                iv.start_key.is_largest,
            )
        })
        .collect();
    assert_eq!(
        starts,
        vec![
            ("a".to_string(), false),
            ("c".to_string(), false),
            ("e".to_string(), true),
            ("z".to_string(), true),
        ]
    );
    assert_eq!(s.read_amplification(), 2);
}

#[test]
fn test_describe_golden() {
    let files = vec![l0_file(1, "a", "z", 10), l0_file(2, "c", "e", 10)];
    let s = build(files, MIB as i64);
    let expect = "file count: 2, sublevels: 2, intervals: 4\n\
                  flush split keys(0): []\n\
                  0.1: file count: 1, bytes: 10, width (mean, max): 1.0, 1, interval range: [1, 1]\n\
                  0.0: file count: 1, bytes: 10, width (mean, max): 3.0, 3, interval range: [0, 2]\n\
                  compacting file count: 0, base compacting intervals: none\n";
    assert_eq!(s.describe(false), expect);
    assert_eq!(s.to_string(), expect);
}

#[test]
fn test_describe_verbose_lists_files() {
    let files = vec![l0_file(1, "a", "z", 10)];
    let s = build(files, 0);
    let out = s.describe(true);
    assert!(out.contains("\t000001:[a#10,SET-z#15,SET]\n"), "{out}");
}

#[test]
fn test_flush_split_activation() {
    // Ten disjoint 10 MiB files over [k00,k01), ..., [k09,k10); the largest
    // bound of each is an exclusive sentinel so neighbors share no interval.
    let files: Vec<L0FileMeta> = (0..10)
        .map(|i| {
            let num = i as u64 + 1;
            let (min_seqno, max_seqno) = (num * 10, num * 10 + 5);
            L0FileMeta::new(
                num,
                10 * MIB,
                InternalKey::new(key(&format!("k{:02}", i)), min_seqno, KeyKind::Set),
                InternalKey::range_delete_sentinel(key(&format!("k{:02}", i + 1))),
                min_seqno,
                max_seqno,
            )
        })
        .collect();
    let s = build(files, 15 * MIB as i64);

    assert_eq!(s.sublevel_count(), 1);
    assert_eq!(s.interval_count(), 11);
    let splits: Vec<String> = s
        .flush_split_keys()
        .iter()
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .collect();
    assert_eq!(splits, vec!["k02", "k04", "k06", "k08", "k10"]);

    // Accumulation between consecutive split keys stays under twice the
    // effective threshold.
    let effective = 15 * MIB * s.sublevel_count() as u64;
    let mut segment = 0u64;
    let mut split_iter = s.flush_split_keys().iter().peekable();
    for iv in s.intervals() {
        if split_iter.peek().map(|k| k.as_ref()) == Some(iv.start_key.key.as_ref()) {
            assert!(segment <= 2 * effective);
            segment = 0;
            split_iter.next();
        }
        segment += iv.estimated_bytes;
    }
    assert!(segment <= 2 * effective);
}

#[test]
fn test_base_compaction_blocked_by_lbase() {
    let files = vec![l0_file(1, "a", "d", 10), l0_file(2, "a", "d", 10)];
    let s = build(files, MIB as i64);

    let lbase = vec![BaseFileMeta {
        file_number: 100,
        smallest: InternalKey::new(key("a"), 1, KeyKind::Set),
        largest: InternalKey::new(key("m"), 1, KeyKind::Set),
        compacting: true,
    }];
    assert!(s.pick_base_compaction(2, &lbase).unwrap().is_none());

    // The same pick succeeds once the Lbase file is idle.
    let lbase_idle = vec![BaseFileMeta {
        compacting: false,
        ..lbase[0].clone()
    }];
    let c = s.pick_base_compaction(2, &lbase_idle).unwrap().unwrap();
    assert_eq!(c.files.len(), 2);
}

#[test]
fn test_intra_l0_respects_unflushed_barrier() {
    let mk = |num: u64, seqno: u64| {
        L0FileMeta::new(
            num,
            10,
            InternalKey::new(key("a"), seqno, KeyKind::Set),
            InternalKey::new(key("d"), seqno, KeyKind::Set),
            seqno,
            seqno,
        )
    };
    let files = vec![mk(1, 5), mk(2, 10), mk(3, 20)];
    let s = build(files, MIB as i64);

    let c = s.pick_intra_l0_compaction(15, 2).unwrap().unwrap();
    assert!(c.is_intra_l0);
    assert_eq!(c.earliest_unflushed_seqno, 15);
    assert_eq!(c.seed_interval_stack_depth_reduction, 2);
    assert_eq!(c.seed_interval_min_level, 0);
    assert_eq!(c.seed_interval_max_level, s.sublevel_count() - 1);
    let mut nums: Vec<u64> = c.files.iter().map(|&ix| s.file(ix).file_number).collect();
    nums.sort_unstable();
    assert_eq!(nums, vec![1, 2]);
    for &ix in &c.files {
        assert!(s.file(ix).max_seqno < 15);
    }
}

#[test]
fn test_growth_cap_returns_previous_candidate() {
    let files = vec![
        l0_file(1, "a", "d", 90 * MIB),
        l0_file(2, "a", "d", 30 * MIB),
        l0_file(3, "a", "d", 100 * MIB),
    ];
    let s = build(files, MIB as i64);

    // Adding the third file would push the candidate from 120 MiB to
    // 220 MiB, a step past 100 MiB total and over 1.5x growth, so the
    // two-file snapshot wins.
    let c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    assert_eq!(c.files.len(), 2);
    assert_eq!(c.file_bytes, 120 * MIB);
    assert!(c.file_bytes <= 500 * MIB);
    assert_eq!(c.seed_interval_stack_depth_reduction, 2);
}

#[test]
fn test_extend_to_rectangle_for_base_compaction() {
    let files = vec![
        l0_file(1, "a", "d", 10),
        l0_file(2, "f", "j", 10),
        l0_file(3, "f", "j", 10),
    ];
    let s = build(files, MIB as i64);

    let mut c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    assert_eq!(c.files.len(), 2);

    // Unbounded on both sides: the lone [a,d] file joins the rectangle.
    let grew = s.extend_l0_for_base_compaction_to(
        &InternalKey::invalid(),
        &InternalKey::invalid(),
        &mut c,
    );
    assert!(grew);
    let mut nums: Vec<u64> = c.files.iter().map(|&ix| s.file(ix).file_number).collect();
    nums.sort_unstable();
    assert_eq!(nums, vec![1, 2, 3]);
    #[cfg(debug_assertions)]
    s.check_compaction(&c);
}

#[test]
fn test_extend_bounds_exclude_outside_files() {
    let files = vec![
        l0_file(1, "a", "d", 10),
        l0_file(2, "f", "j", 10),
        l0_file(3, "f", "j", 10),
    ];
    let s = build(files, MIB as i64);

    let mut c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    // Exclusive lower bound at "d": the [a,d] file touches it and must stay
    // out.
    let grew = s.extend_l0_for_base_compaction_to(
        &InternalKey::new(key("d"), 1, KeyKind::Set),
        &InternalKey::invalid(),
        &mut c,
    );
    assert!(!grew);
    assert_eq!(c.files.len(), 2);
}

#[test]
fn test_rectangle_extension_prefers_run_with_picked_files() {
    // Sublevel 0: [a,b] [c,d] (a long idle run), [e,f] compacting, [g,h]
    // (short run already in the candidate). Sublevel 1: [g,h].
    let mut files = vec![
        l0_file(1, "a", "b", 10),
        l0_file(2, "c", "d", 10),
        l0_file(3, "e", "f", 10),
        l0_file(4, "g", "h", 10),
        l0_file(5, "g", "h", 10),
    ];
    files[2].compacting = true;
    let mut s = L0Sublevels::new(files, bytewise_compare(), lossy_format_key(), 0).unwrap();
    s.init_compacting_file_info(&[]);

    let mut c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    let picked: Vec<u64> = c.files.iter().map(|&ix| s.file(ix).file_number).collect();
    assert_eq!(picked, vec![4, 5]);

    // The run holding file 4 wins over the longer [a,b][c,d] run, and the
    // compacting neighbor fences the longer run out entirely.
    let grew = s.extend_l0_for_base_compaction_to(
        &InternalKey::invalid(),
        &InternalKey::invalid(),
        &mut c,
    );
    assert!(!grew);
    let mut nums: Vec<u64> = c.files.iter().map(|&ix| s.file(ix).file_number).collect();
    nums.sort_unstable();
    assert_eq!(nums, vec![4, 5]);

    // With the fence gone, the whole sublevel is one run containing picked
    // files, and the idle files join.
    s.clear_compacting(2);
    s.init_compacting_file_info(&[]);
    let mut c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    let grew = s.extend_l0_for_base_compaction_to(
        &InternalKey::invalid(),
        &InternalKey::invalid(),
        &mut c,
    );
    assert!(grew);
    assert_eq!(c.files.len(), 5);
    #[cfg(debug_assertions)]
    s.check_compaction(&c);
}

#[test]
fn test_base_pick_skips_interval_with_intra_compacting_seed() {
    let mut files = vec![
        l0_file(1, "a", "d", 10),
        l0_file(2, "a", "d", 10),
        l0_file(3, "a", "d", 10),
        l0_file(4, "f", "j", 10),
        l0_file(5, "f", "j", 10),
    ];
    files[0].compacting = true;
    files[0].is_intra_l0_compacting = true;
    let mut s = L0Sublevels::new(files, bytewise_compare(), lossy_format_key(), 0).unwrap();
    s.init_compacting_file_info(&[]);

    // [a,d] still scores with depth 2 (intra-L0 compactions do not mark
    // intervals base compacting), but its lowest-sublevel seed is being
    // intra-L0 compacted, so the picker moves on to [f,j].
    let c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    let mut nums: Vec<u64> = c.files.iter().map(|&ix| s.file(ix).file_number).collect();
    nums.sort_unstable();
    assert_eq!(nums, vec![4, 5]);
}

#[test]
fn test_pick_base_skips_base_compacting_interval() {
    let mut files = vec![
        l0_file(1, "a", "d", 10),
        l0_file(2, "a", "d", 10),
        l0_file(3, "p", "s", 10),
        l0_file(4, "p", "s", 10),
    ];
    files[0].compacting = true;
    let mut s = L0Sublevels::new(files, bytewise_compare(), lossy_format_key(), 0).unwrap();
    s.init_compacting_file_info(&[]);

    let c = s.pick_base_compaction(2, &[]).unwrap().unwrap();
    let mut nums: Vec<u64> = c.files.iter().map(|&ix| s.file(ix).file_number).collect();
    nums.sort_unstable();
    assert_eq!(nums, vec![3, 4]);
}

#[test]
fn test_intra_pick_none_when_everything_is_young() {
    let files = vec![l0_file(1, "a", "d", 10), l0_file(2, "a", "d", 10)];
    let s = build(files, 0);
    // Every file is at or past the barrier.
    assert!(s.pick_intra_l0_compaction(1, 2).unwrap().is_none());
}

#[test]
fn test_rebuild_is_idempotent() {
    let mk = || {
        vec![
            l0_file(1, "a", "e", 40),
            l0_file(2, "b", "g", 30),
            l0_file(3, "e", "j", 20),
            l0_file(4, "a", "c", 10),
        ]
    };
    let a = build(mk(), 32);
    let b = build(mk(), 32);
    assert_eq!(a.describe(true), b.describe(true));
}
