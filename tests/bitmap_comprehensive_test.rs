// Comprehensive Roaring Bitmap Integration Tests
// Test ID Format: BMAP-XXX

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusty_bitmap::RoaringBitmap;

fn model_pair(seed: u64, size: usize, span: u32) -> (RoaringBitmap, BTreeSet<u32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bitmap = RoaringBitmap::new();
    let mut model = BTreeSet::new();
    for _ in 0..size {
        let value = rng.random_range(0..span);
        bitmap.add(value);
        model.insert(value);
    }
    (bitmap, model)
}

fn to_set(bitmap: &RoaringBitmap) -> BTreeSet<u32> {
    bitmap.iter().collect()
}

// BMAP-001: Cardinality matches and iteration is strictly ascending
#[test]
fn test_bmap_001_cardinality_and_order() {
    let (bitmap, model) = model_pair(1, 20_000, 5_000_000);
    assert_eq!(bitmap.cardinality(), model.len() as u64);
    let values: Vec<u32> = bitmap.iter().collect();
    assert_eq!(values.len(), model.len());
    assert!(values.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(to_set(&bitmap), model);

    println!("BMAP-001: PASSED - cardinality and ascending iteration");
}

// BMAP-002: Membership agrees with the model on hits and misses
#[test]
fn test_bmap_002_contains() {
    let (bitmap, model) = model_pair(2, 10_000, 1_000_000);
    let mut rng = StdRng::seed_from_u64(22);
    for _ in 0..50_000 {
        let probe = rng.random_range(0..2_000_000);
        assert_eq!(bitmap.contains(probe), model.contains(&probe));
    }

    println!("BMAP-002: PASSED - membership queries");
}

// BMAP-003: Add and remove are idempotent
#[test]
fn test_bmap_003_idempotence() {
    let (mut bitmap, _) = model_pair(3, 5_000, 100_000);
    let snapshot_with = {
        let mut b = bitmap.clone();
        b.add(777_777);
        b
    };
    bitmap.add(777_777);
    bitmap.add(777_777);
    assert_eq!(bitmap, snapshot_with);
    bitmap.remove(777_777);
    bitmap.remove(777_777);
    let mut expected = snapshot_with.clone();
    expected.remove(777_777);
    assert_eq!(bitmap, expected);

    println!("BMAP-003: PASSED - add/remove idempotence");
}

// BMAP-004: Set algebra agrees with the reference model, immutable and
// in-place forms alike
#[test]
fn test_bmap_004_set_algebra() {
    let (a, model_a) = model_pair(4, 30_000, 400_000);
    let (b, model_b) = model_pair(44, 30_000, 400_000);

    let or: BTreeSet<u32> = model_a.union(&model_b).copied().collect();
    let and: BTreeSet<u32> = model_a.intersection(&model_b).copied().collect();
    let xor: BTreeSet<u32> = model_a.symmetric_difference(&model_b).copied().collect();
    let andnot: BTreeSet<u32> = model_a.difference(&model_b).copied().collect();

    assert_eq!(to_set(&a.or(&b)), or);
    assert_eq!(to_set(&a.and(&b)), and);
    assert_eq!(to_set(&a.xor(&b)), xor);
    assert_eq!(to_set(&a.andnot(&b)), andnot);

    let mut inplace = a.clone();
    inplace.or_inplace(&b);
    assert_eq!(inplace, a.or(&b));
    let mut inplace = a.clone();
    inplace.and_inplace(&b);
    assert_eq!(inplace, a.and(&b));
    let mut inplace = a.clone();
    inplace.xor_inplace(&b);
    assert_eq!(inplace, a.xor(&b));
    let mut inplace = a.clone();
    inplace.andnot_inplace(&b);
    assert_eq!(inplace, a.andnot(&b));

    println!("BMAP-004: PASSED - set algebra vs reference model");
}

// BMAP-005: or_many equals or_many_heap equals repeated or, in any order
#[test]
fn test_bmap_005_or_many() {
    let (a, _) = model_pair(5, 10_000, 300_000);
    let (b, _) = model_pair(55, 500, 4_000_000_000);
    let mut c = RoaringBitmap::new();
    c.add_range(0x12_0000..0x14_8000);

    let chained = a.or(&b).or(&c);
    assert_eq!(RoaringBitmap::or_many(&[&a, &b, &c]), chained);
    assert_eq!(RoaringBitmap::or_many(&[&c, &b, &a]), chained);
    assert_eq!(RoaringBitmap::or_many_heap(&[&a, &b, &c]), chained);
    assert_eq!(RoaringBitmap::or_many_heap(&[&b, &c, &a]), chained);

    println!("BMAP-005: PASSED - multi-way union variants agree");
}

// BMAP-006: Lazy operations plus repair equal their eager counterparts
#[test]
fn test_bmap_006_lazy_round_trip() {
    let (a, _) = model_pair(6, 25_000, 200_000);
    let (b, _) = model_pair(66, 25_000, 200_000);

    let mut lazy = a.lazy_or(&b);
    lazy.repair_after_lazy();
    assert_eq!(lazy, a.or(&b));

    let mut lazy = a.lazy_xor(&b);
    lazy.repair_after_lazy();
    assert_eq!(lazy, a.xor(&b));

    let mut lazy = a.clone();
    lazy.lazy_or_inplace(&b);
    lazy.lazy_or_inplace(&a);
    lazy.repair_after_lazy();
    assert_eq!(lazy, a.or(&b));

    println!("BMAP-006: PASSED - lazy round trips");
}

// BMAP-007: Serialization round-trips byte-exactly and the size is computed
// upfront, in memory and through a file
#[test]
fn test_bmap_007_serialization_round_trip() {
    let (mut bitmap, _) = model_pair(7, 40_000, 3_000_000);
    bitmap.add_range(0x40_0000..0x41_0000);
    bitmap.run_optimize();

    let bytes = bitmap.portable_serialize();
    assert_eq!(bytes.len(), bitmap.portable_size_in_bytes());
    let decoded = RoaringBitmap::portable_deserialize(&bytes).unwrap();
    assert_eq!(decoded, bitmap);
    assert_eq!(decoded.portable_serialize(), bytes);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bitmap.bin");
    std::fs::write(&path, &bytes).unwrap();
    let from_file = RoaringBitmap::portable_deserialize(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(from_file, bitmap);

    println!("BMAP-007: PASSED - serialization round trip");
}

// BMAP-008: run_optimize leaves every chunk in its smallest representation
#[test]
fn test_bmap_008_representation_minimality() {
    let mut bitmap = RoaringBitmap::new();
    // Long runs: smallest as a run container.
    bitmap.add_range(0..0x9000);
    // Two values: smallest as an array.
    bitmap.add(0x2_0000);
    bitmap.add(0x2_0005);
    // Alternating bits: smallest as a bitset.
    for value in (0x8_0000..0x9_0000).step_by(2) {
        bitmap.add(value);
    }
    assert!(bitmap.run_optimize());

    let stats = bitmap.statistics();
    assert_eq!(stats.n_run_containers, 1);
    assert_eq!(stats.n_array_containers, 1);
    assert_eq!(stats.n_bitset_containers, 1);
    // Serialized sizes per chunk: run 6 bytes, array 4 bytes, bitset 8192.
    assert_eq!(stats.n_bytes_run_containers, 6);
    assert_eq!(stats.n_bytes_array_containers, 4);
    assert_eq!(stats.n_bytes_bitset_containers, 8192);
    // A second pass changes nothing.
    let before = bitmap.clone();
    bitmap.run_optimize();
    assert_eq!(bitmap, before);
    assert_eq!(bitmap.statistics(), stats);

    println!("BMAP-008: PASSED - smallest-fit representations");
}

// BMAP-009: select is the inverse of rank and fails past the cardinality
#[test]
fn test_bmap_009_select_rank() {
    let (bitmap, model) = model_pair(9, 8_000, 10_000_000);
    for (rank, &value) in model.iter().enumerate().step_by(97) {
        assert_eq!(bitmap.select(rank as u32), Some(value));
        assert_eq!(bitmap.rank(value), rank as u64 + 1);
    }
    assert_eq!(bitmap.select(model.len() as u32), None);
    assert_eq!(bitmap.select(u32::MAX), None);

    println!("BMAP-009: PASSED - select/rank inverse");
}

// BMAP-010: flip equals the symmetric difference with the interval
#[test]
fn test_bmap_010_flip() {
    let (bitmap, model) = model_pair(10, 20_000, 300_000);
    let (lo, hi) = (50_000u32, 250_000u32);
    let flipped = bitmap.flip(lo..hi);
    let mut expected: BTreeSet<u32> = model.iter().copied().filter(|v| *v < lo || *v >= hi).collect();
    for value in lo..hi {
        if !model.contains(&value) {
            expected.insert(value);
        }
    }
    assert_eq!(to_set(&flipped), expected);
    // Flipping twice restores the original.
    assert_eq!(flipped.flip(lo..hi), bitmap);

    println!("BMAP-010: PASSED - range flip");
}

// BMAP-011: Copy-on-write clones mutate independently
#[test]
fn test_bmap_011_cow_independence() {
    let (mut original, model) = model_pair(11, 15_000, 600_000);
    original.set_copy_on_write(true);
    let snapshot = to_set(&original);

    let mut clone = original.cow_clone();
    clone.add(4_000_000_000);
    clone.remove_range(0..1_000);
    assert_eq!(to_set(&original), snapshot);
    assert_eq!(original.cardinality(), model.len() as u64);

    // Mutating the original leaves the clone alone too.
    let clone_snapshot = to_set(&clone);
    original.flip_inplace(0..600_000);
    assert_eq!(to_set(&clone), clone_snapshot);

    println!("BMAP-011: PASSED - COW mutation independence");
}

// BMAP-012: Three-container mix end to end with exact counts and byte-exact
// serialization
#[test]
fn test_bmap_012_three_container_scenario() {
    let mut bitmap = RoaringBitmap::new();
    bitmap.add_range(0x0_0000..0x0_9000);
    bitmap.add_range(0x0_A000..0x1_0000);
    bitmap.add(0x2_0000);
    bitmap.add(0x2_0005);
    for value in (0x8_0000..0x9_0000).step_by(2) {
        bitmap.add(value);
    }
    bitmap.run_optimize();

    assert_eq!(bitmap.cardinality(), 0x9000 + 0x6000 + 2 + 0x8000);
    assert_eq!(bitmap.cardinality(), 0x17002);

    let bytes = bitmap.portable_serialize();
    assert_eq!(bytes.len(), bitmap.portable_size_in_bytes());
    let decoded = RoaringBitmap::portable_deserialize(&bytes).unwrap();
    assert_eq!(decoded, bitmap);
    assert_eq!(decoded.portable_serialize(), bytes);

    println!("BMAP-012: PASSED - three-container scenario");
}

// BMAP-013: Union with a full-run chunk yields the full run
#[test]
fn test_bmap_013_union_full_run() {
    let mut full_chunk = RoaringBitmap::new();
    full_chunk.add_range(0x5_0000..0x6_0000);
    full_chunk.run_optimize();

    let mut dense = RoaringBitmap::new();
    for value in (0x5_0000..0x5_8000).step_by(3) {
        dense.add(value);
    }

    let union = full_chunk.or(&dense);
    assert_eq!(union, full_chunk);
    assert_eq!(union.cardinality(), 0x1_0000);
    let stats = union.statistics();
    assert_eq!(stats.n_run_containers, 1);
    assert_eq!(stats.n_containers, 1);

    println!("BMAP-013: PASSED - full-run union");
}

// BMAP-014: xor(xor(A, B), B) == A
#[test]
fn test_bmap_014_xor_involution() {
    let (a, _) = model_pair(14, 35_000, 2_000_000);
    let (b, _) = model_pair(144, 35_000, 2_000_000);
    assert_eq!(a.xor(&b).xor(&b), a);

    println!("BMAP-014: PASSED - xor involution");
}

// BMAP-015: select over a dense range, exact endpoints
#[test]
fn test_bmap_015_select_on_range() {
    let bitmap = RoaringBitmap::from_range(100, 200, 1).unwrap();
    assert_eq!(bitmap.select(0), Some(100));
    assert_eq!(bitmap.select(99), Some(199));
    assert_eq!(bitmap.select(100), None);

    println!("BMAP-015: PASSED - select on range");
}

// BMAP-016: Supplemental queries: min/max, rank, subsets, intersect,
// range cardinality
#[test]
fn test_bmap_016_supplemental_queries() {
    let (a, model) = model_pair(16, 12_000, 900_000);
    assert_eq!(a.minimum(), model.first().copied());
    assert_eq!(a.maximum(), model.last().copied());
    assert_eq!(
        a.range_cardinality(100_000..500_000),
        model.range(100_000..500_000).count() as u64
    );
    assert_eq!(a.rank(450_000), model.range(..=450_000).count() as u64);

    let subset: RoaringBitmap = a.iter().filter(|v| v % 5 == 0).collect();
    assert!(subset.is_subset(&a));
    assert!(subset.is_strict_subset(&a));
    assert!(subset.intersect(&a));
    assert!(!a.is_strict_subset(&a));

    let mut shifted = RoaringBitmap::new();
    shifted.add(0xFFFF_FFFF);
    assert!(!shifted.intersect(&a));

    println!("BMAP-016: PASSED - supplemental queries");
}

// BMAP-017: Bulk range mutation against the model
#[test]
fn test_bmap_017_range_mutation() {
    let (mut bitmap, mut model) = model_pair(17, 10_000, 400_000);
    bitmap.add_range(150_000..250_000);
    model.extend(150_000..250_000);
    assert_eq!(to_set(&bitmap), model);

    bitmap.remove_range(100_000..=199_999);
    model.retain(|v| !(100_000..=199_999).contains(v));
    assert_eq!(to_set(&bitmap), model);

    assert!(bitmap.contains_range(200_000..250_000));
    assert!(!bitmap.contains_range(199_999..250_000));

    println!("BMAP-017: PASSED - range mutation");
}
