// Bitmap Set Algebra
//
// Binary operators walk the two key arrays in tandem. Matching keys dispatch
// to the mixed-type container matrix; single-sided keys are kept for union,
// symmetric difference and left-difference, dropped for intersection. The
// in-place forms consume the left store entry by entry so bitset-heavy
// workloads mutate words directly instead of reallocating.
//
// The lazy forms skip per-container cardinality maintenance; callers chain
// them (as or_many does) and finish with one repair_after_lazy pass.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::container::{convert, ops, Container};
use crate::RoaringBitmap;

use super::store::ContainerStore;

impl RoaringBitmap {
    fn binary_op(
        &self,
        other: &Self,
        on_match: impl Fn(&Container, &Container) -> Container,
        keep_left: bool,
        keep_right: bool,
    ) -> Self {
        let mut store = ContainerStore::with_capacity(self.store.len() + other.store.len());
        let (mut i, mut j) = (0, 0);
        while i < self.store.len() && j < other.store.len() {
            match self.store.keys[i].cmp(&other.store.keys[j]) {
                std::cmp::Ordering::Less => {
                    if keep_left {
                        // Splice the whole left-only stretch in one go.
                        i = store.append_copies_until(&self.store, i, other.store.keys[j]);
                    } else {
                        // Intersection: gallop over the left-only stretch.
                        i = self.store.advance_until(other.store.keys[j], i);
                    }
                }
                std::cmp::Ordering::Greater => {
                    if keep_right {
                        j = store.append_copies_until(&other.store, j, self.store.keys[i]);
                    } else if keep_left {
                        j += 1;
                    } else {
                        j = other.store.advance_until(self.store.keys[i], j);
                    }
                }
                std::cmp::Ordering::Equal => {
                    let result = on_match(&self.store.containers[i], &other.store.containers[j]);
                    if !result.is_empty() {
                        store.append(self.store.keys[i], result);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        if keep_left {
            store.append_copies_after(&self.store, i);
        }
        if keep_right {
            store.append_copies_after(&other.store, j);
        }
        let mut result = Self::new();
        result.store = store;
        result.set_copy_on_write(self.copy_on_write() && other.copy_on_write());
        result
    }

    fn binary_op_inplace(
        &mut self,
        other: &Self,
        on_match: impl Fn(Container, &Container) -> Container,
        keep_left: bool,
        keep_right: bool,
    ) {
        let old = std::mem::take(&mut self.store);
        let mut store = ContainerStore::with_capacity(old.len() + other.store.len());
        let mut left = old.into_entries().peekable();
        let mut j = 0;
        loop {
            let left_key = left.peek().map(|entry| entry.0);
            let right_key = other.store.keys.get(j).copied();
            match (left_key, right_key) {
                (Some(lk), Some(rk)) if lk < rk => {
                    let (key, container) = left.next().expect("peeked entry");
                    if keep_left {
                        store.append(key, container);
                    }
                }
                (Some(lk), Some(rk)) if lk > rk => {
                    if keep_right {
                        store.append_copy(&other.store, j);
                    }
                    j += 1;
                }
                (Some(_), Some(_)) => {
                    let (key, container) = left.next().expect("peeked entry");
                    let result = on_match(container, &other.store.containers[j]);
                    if !result.is_empty() {
                        store.append(key, result);
                    }
                    j += 1;
                }
                (Some(_), None) => {
                    let (key, container) = left.next().expect("peeked entry");
                    if keep_left {
                        store.append(key, container);
                    }
                }
                (None, Some(_)) => {
                    if keep_right {
                        store.append_copies_after(&other.store, j);
                    }
                    break;
                }
                (None, None) => break,
            }
        }
        self.store = store;
    }

    // ========================================================================
    // Immutable operators
    // ========================================================================

    /// Union.
    pub fn or(&self, other: &Self) -> Self {
        self.binary_op(other, ops::or, true, true)
    }

    /// Intersection.
    pub fn and(&self, other: &Self) -> Self {
        self.binary_op(other, ops::and, false, false)
    }

    /// Symmetric difference.
    pub fn xor(&self, other: &Self) -> Self {
        self.binary_op(other, ops::xor, true, true)
    }

    /// Difference (`self` minus `other`).
    pub fn andnot(&self, other: &Self) -> Self {
        self.binary_op(other, ops::andnot, true, false)
    }

    // ========================================================================
    // In-place operators
    // ========================================================================

    pub fn or_inplace(&mut self, other: &Self) {
        self.binary_op_inplace(other, ops::or_inplace, true, true);
    }

    pub fn and_inplace(&mut self, other: &Self) {
        self.binary_op_inplace(other, ops::and_inplace, false, false);
    }

    pub fn xor_inplace(&mut self, other: &Self) {
        self.binary_op_inplace(other, ops::xor_inplace, true, true);
    }

    pub fn andnot_inplace(&mut self, other: &Self) {
        self.binary_op_inplace(other, ops::andnot_inplace, true, false);
    }

    // ========================================================================
    // Lazy operators
    // ========================================================================

    /// Union skipping cardinality maintenance and run normalization. The
    /// result must see `repair_after_lazy` before cardinality-dependent
    /// operations are trusted.
    pub fn lazy_or(&self, other: &Self) -> Self {
        self.binary_op(other, ops::lazy_or, true, true)
    }

    /// In-place lazy union; safe to chain repeatedly before one repair.
    pub fn lazy_or_inplace(&mut self, other: &Self) {
        self.binary_op_inplace(other, ops::lazy_or_inplace, true, true);
    }

    /// Symmetric difference, lazy flavor.
    pub fn lazy_xor(&self, other: &Self) -> Self {
        self.binary_op(other, ops::lazy_xor, true, true)
    }

    pub fn lazy_xor_inplace(&mut self, other: &Self) {
        self.binary_op_inplace(other, ops::lazy_xor_inplace, true, true);
    }

    /// Restore invariants on every container touched by lazy operations:
    /// recompute unknown bitset cardinalities, demote underfull bitsets,
    /// normalize deferred run outputs, and drop empty chunks.
    pub fn repair_after_lazy(&mut self) {
        let old = std::mem::take(&mut self.store);
        let mut store = ContainerStore::with_capacity(old.len());
        for (key, container) in old.into_entries() {
            let repaired = convert::repair_after_lazy(container);
            if !repaired.is_empty() {
                store.append(key, repaired);
            }
        }
        self.store = store;
    }

    // ========================================================================
    // Multi-way operations
    // ========================================================================

    /// Union of many bitmaps: chained lazy unions and a single repair pass.
    pub fn or_many(bitmaps: &[&RoaringBitmap]) -> RoaringBitmap {
        match bitmaps {
            [] => RoaringBitmap::new(),
            [single] => (*single).clone(),
            [first, rest @ ..] => {
                let mut result = first.lazy_or(rest[0]);
                for bitmap in &rest[1..] {
                    result.lazy_or_inplace(bitmap);
                }
                result.repair_after_lazy();
                result
            }
        }
    }

    /// Union of many bitmaps, merging the two smallest operands first via a
    /// min-heap. Output equals `or_many`.
    pub fn or_many_heap(bitmaps: &[&RoaringBitmap]) -> RoaringBitmap {
        enum Operand<'a> {
            Borrowed(&'a RoaringBitmap),
            Owned(RoaringBitmap),
        }

        impl Operand<'_> {
            fn get(&self) -> &RoaringBitmap {
                match self {
                    Operand::Borrowed(bitmap) => bitmap,
                    Operand::Owned(bitmap) => bitmap,
                }
            }
        }

        if bitmaps.is_empty() {
            return RoaringBitmap::new();
        }
        let mut slots: Vec<Option<Operand>> = bitmaps
            .iter()
            .map(|bitmap| Some(Operand::Borrowed(bitmap)))
            .collect();
        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = bitmaps
            .iter()
            .enumerate()
            .map(|(index, bitmap)| Reverse((bitmap.cardinality(), index)))
            .collect();
        while heap.len() > 1 {
            let Reverse((_, first)) = heap.pop().expect("heap has two entries");
            let Reverse((_, second)) = heap.pop().expect("heap has two entries");
            let left = slots[first].take().expect("slot taken once");
            let right = slots[second].take().expect("slot taken once");
            let merged = match (left, right) {
                (Operand::Owned(mut a), b) => {
                    a.lazy_or_inplace(b.get());
                    a
                }
                (b, Operand::Owned(mut a)) => {
                    a.lazy_or_inplace(b.get());
                    a
                }
                (Operand::Borrowed(a), Operand::Borrowed(b)) => a.lazy_or(b),
            };
            let index = first;
            let cardinality = merged.cardinality();
            slots[index] = Some(Operand::Owned(merged));
            heap.push(Reverse((cardinality, index)));
        }
        let Reverse((_, index)) = heap.pop().expect("one operand remains");
        let mut result = match slots[index].take().expect("final slot") {
            Operand::Owned(bitmap) => bitmap,
            Operand::Borrowed(bitmap) => bitmap.clone(),
        };
        result.repair_after_lazy();
        result
    }

    /// Symmetric difference of many bitmaps.
    pub fn xor_many(bitmaps: &[&RoaringBitmap]) -> RoaringBitmap {
        match bitmaps {
            [] => RoaringBitmap::new(),
            [single] => (*single).clone(),
            [first, rest @ ..] => {
                let mut result = first.lazy_xor(rest[0]);
                for bitmap in &rest[1..] {
                    result.lazy_xor_inplace(bitmap);
                }
                result.repair_after_lazy();
                result
            }
        }
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    /// Whether the two bitmaps share at least one value, without
    /// materializing the intersection.
    pub fn intersect(&self, other: &Self) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.store.len() && j < other.store.len() {
            match self.store.keys[i].cmp(&other.store.keys[j]) {
                std::cmp::Ordering::Less => {
                    i = self.store.advance_until(other.store.keys[j], i);
                }
                std::cmp::Ordering::Greater => {
                    j = other.store.advance_until(self.store.keys[i], j);
                }
                std::cmp::Ordering::Equal => {
                    if ops::intersects(&self.store.containers[i], &other.store.containers[j]) {
                        return true;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        false
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        for (index, &key) in self.store.keys.iter().enumerate() {
            match other.store.get_index(key) {
                Ok(other_index) => {
                    if !ops::is_subset(
                        &self.store.containers[index],
                        &other.store.containers[other_index],
                    ) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        true
    }

    pub fn is_strict_subset(&self, other: &Self) -> bool {
        self.is_subset(other) && self.cardinality() < other.cardinality()
    }

    /// Whether the two bitmaps hold exactly the same set.
    pub fn equals(&self, other: &Self) -> bool {
        self == other
    }
}
