// Roaring Bitmap - Compressed Set of 32-bit Unsigned Integers
//
// The 32-bit universe is split into 64K chunks of 64K consecutive values;
// each non-empty chunk is stored in whichever container variant is smallest
// for its density profile. Point mutations route through the key-indexed
// store to the container, which may come back as a different variant (array
// to bitset past the threshold and back). Binary operations walk the two key
// arrays in tandem and dispatch matching chunks to the mixed-type operator
// matrix.

pub(crate) mod iter;
pub(crate) mod ops;
pub(crate) mod serialization;
pub(crate) mod statistics;
pub(crate) mod store;

use std::ops::{Bound, RangeBounds};

use tracing::debug;

use crate::container::array::ArrayContainer;
use crate::container::run::RunContainer;
use crate::container::{convert, Container};
use crate::error::{BitmapError, Result};
use store::ContainerStore;

/// High 16 bits select the chunk, low 16 bits the member within it.
pub(crate) fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

pub(crate) fn join(high: u16, low: u16) -> u32 {
    (high as u32) << 16 | low as u32
}

/// Normalize any range of u32 to inclusive endpoints; `None` when empty.
fn range_to_inclusive<R: RangeBounds<u32>>(range: R) -> Option<(u32, u32)> {
    let start = match range.start_bound() {
        Bound::Included(&v) => v,
        Bound::Excluded(&v) => v.checked_add(1)?,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&v) => v,
        Bound::Excluded(&0) => return None,
        Bound::Excluded(&v) => v - 1,
        Bound::Unbounded => u32::MAX,
    };
    (start <= end).then_some((start, end))
}

/// Run container covering the inclusive sub-range of one chunk.
fn range_container(chunk_start: u16, chunk_end: u16) -> Container {
    if chunk_start == 0 && chunk_end == u16::MAX {
        Container::Run(RunContainer::full())
    } else {
        Container::Run(RunContainer::from_range(chunk_start, chunk_end))
    }
}

/// Compressed bitmap over `[0, 2^32)`.
#[derive(Debug, Clone, Default)]
pub struct RoaringBitmap {
    pub(crate) store: ContainerStore,
    copy_on_write: bool,
}

impl RoaringBitmap {
    /// Creates a new bitmap (initially empty).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty bitmap with container-storage capacity for
    /// `capacity` chunks (a performance hint).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: ContainerStore::with_capacity(capacity),
            copy_on_write: false,
        }
    }

    /// All values in `[min, max)` at a distance of a multiple of `step`
    /// from `min`.
    pub fn from_range(min: u32, max: u32, step: u32) -> Result<Self> {
        if step == 0 {
            return Err(BitmapError::InvalidArgument(
                "from_range requires a non-zero step".into(),
            ));
        }
        let mut bitmap = Self::new();
        if min >= max {
            return Ok(bitmap);
        }
        if step == 1 {
            bitmap.add_range(min..max);
            return Ok(bitmap);
        }
        let mut value = min as u64;
        while value < max as u64 {
            bitmap.add(value as u32);
            value += step as u64;
        }
        Ok(bitmap)
    }

    /// Build from a list of values (need not be sorted or unique).
    pub fn from_values(values: &[u32]) -> Self {
        let mut bitmap = Self::new();
        bitmap.add_many(values);
        bitmap
    }

    /// Whether cloning defers container copies behind shared wrappers.
    pub fn copy_on_write(&self) -> bool {
        self.copy_on_write
    }

    pub fn set_copy_on_write(&mut self, copy_on_write: bool) {
        self.copy_on_write = copy_on_write;
    }

    /// Clone honoring copy-on-write: promotes this bitmap's containers to
    /// shared wrappers and hands the clone references to the same payloads.
    /// Either side forks a private copy on its first mutation. Falls back to
    /// a deep clone when copy-on-write is off.
    pub fn cow_clone(&mut self) -> Self {
        if !self.copy_on_write {
            return self.clone();
        }
        for container in &mut self.store.containers {
            container.make_shared();
        }
        Self {
            store: self.store.clone(),
            copy_on_write: true,
        }
    }

    // ========================================================================
    // Point mutation
    // ========================================================================

    pub fn add(&mut self, value: u32) {
        self.add_checked(value);
    }

    /// Add, reporting whether the bitmap changed.
    pub fn add_checked(&mut self, value: u32) -> bool {
        let (high, low) = split(value);
        match self.store.get_index(high) {
            Ok(index) => self.store.containers[index].add(low),
            Err(index) => {
                self.store.insert_at(index, high, Container::singleton(low));
                true
            }
        }
    }

    /// Bulk add with a last-chunk fast path for locally ordered input.
    pub fn add_many(&mut self, values: &[u32]) {
        let mut cached: Option<(u16, usize)> = None;
        for &value in values {
            let (high, low) = split(value);
            let index = match cached {
                Some((key, index)) if key == high => index,
                _ => match self.store.get_index(high) {
                    Ok(index) => index,
                    Err(index) => {
                        self.store
                            .insert_at(index, high, Container::Array(ArrayContainer::new()));
                        index
                    }
                },
            };
            self.store.containers[index].add(low);
            cached = Some((high, index));
        }
    }

    pub fn remove(&mut self, value: u32) {
        self.remove_checked(value);
    }

    /// Remove, reporting whether the bitmap changed.
    pub fn remove_checked(&mut self, value: u32) -> bool {
        let (high, low) = split(value);
        match self.store.get_index(high) {
            Ok(index) => {
                let removed = self.store.containers[index].remove(low);
                if removed && self.store.containers[index].is_empty() {
                    self.store.remove_at(index);
                }
                removed
            }
            Err(_) => false,
        }
    }

    // ========================================================================
    // Range mutation
    // ========================================================================

    /// Add every value in the range.
    pub fn add_range<R: RangeBounds<u32>>(&mut self, range: R) {
        let Some((start, end)) = range_to_inclusive(range) else {
            return;
        };
        let (high_start, low_start) = split(start);
        let (high_end, low_end) = split(end);
        for high in high_start as u32..=high_end as u32 {
            let chunk_start = if high == high_start as u32 { low_start } else { 0 };
            let chunk_end = if high == high_end as u32 { low_end } else { u16::MAX };
            match self.store.get_index(high as u16) {
                Ok(index) => self.store.containers[index].add_range(chunk_start, chunk_end),
                Err(index) => {
                    self.store
                        .insert_at(index, high as u16, range_container(chunk_start, chunk_end))
                }
            }
        }
    }

    /// Remove every value in the range.
    pub fn remove_range<R: RangeBounds<u32>>(&mut self, range: R) {
        let Some((start, end)) = range_to_inclusive(range) else {
            return;
        };
        let (high_start, low_start) = split(start);
        let (high_end, low_end) = split(end);
        let mut index = match self.store.get_index(high_start) {
            Ok(index) => index,
            Err(index) => index,
        };
        while index < self.store.len() && self.store.keys[index] <= high_end {
            let high = self.store.keys[index];
            let chunk_start = if high == high_start { low_start } else { 0 };
            let chunk_end = if high == high_end { low_end } else { u16::MAX };
            if chunk_start == 0 && chunk_end == u16::MAX {
                self.store.remove_at(index);
                continue;
            }
            self.store.containers[index].remove_range(chunk_start, chunk_end);
            if self.store.containers[index].is_empty() {
                self.store.remove_at(index);
            } else {
                index += 1;
            }
        }
    }

    /// Negate the bitmap within the range, leaving everything else intact.
    pub fn flip_inplace<R: RangeBounds<u32>>(&mut self, range: R) {
        let Some((start, end)) = range_to_inclusive(range) else {
            return;
        };
        let (high_start, low_start) = split(start);
        let (high_end, low_end) = split(end);
        for high in high_start as u32..=high_end as u32 {
            let chunk_start = if high == high_start as u32 { low_start } else { 0 };
            let chunk_end = if high == high_end as u32 { low_end } else { u16::MAX };
            match self.store.get_index(high as u16) {
                Ok(index) => {
                    let negated =
                        convert::negate_range(&self.store.containers[index], chunk_start, chunk_end);
                    if negated.is_empty() {
                        self.store.remove_at(index);
                    } else {
                        self.store.containers[index] = negated;
                    }
                }
                Err(index) => {
                    self.store
                        .insert_at(index, high as u16, range_container(chunk_start, chunk_end))
                }
            }
        }
    }

    /// Negated copy over the range: `(A \ [range]) ∪ ([range] \ A)`.
    pub fn flip<R: RangeBounds<u32>>(&self, range: R) -> Self {
        let mut result = self.clone();
        result.flip_inplace(range);
        result
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn contains(&self, value: u32) -> bool {
        let (high, low) = split(value);
        match self.store.get_index(high) {
            Ok(index) => self.store.containers[index].contains(low),
            Err(_) => false,
        }
    }

    /// Whether every value of the range is present.
    pub fn contains_range<R: RangeBounds<u32>>(&self, range: R) -> bool {
        let Some((start, end)) = range_to_inclusive(range) else {
            return true;
        };
        let (high_start, low_start) = split(start);
        let (high_end, low_end) = split(end);
        for high in high_start as u32..=high_end as u32 {
            let chunk_start = if high == high_start as u32 { low_start } else { 0 };
            let chunk_end = if high == high_end as u32 { low_end } else { u16::MAX };
            match self.store.get_index(high as u16) {
                Ok(index) => {
                    if !self.store.containers[index].contains_range(chunk_start, chunk_end) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
        true
    }

    /// Number of present values within the range.
    pub fn range_cardinality<R: RangeBounds<u32>>(&self, range: R) -> u64 {
        let Some((start, end)) = range_to_inclusive(range) else {
            return 0;
        };
        let (high_start, low_start) = split(start);
        let (high_end, low_end) = split(end);
        let mut total = 0u64;
        let mut index = match self.store.get_index(high_start) {
            Ok(index) => index,
            Err(index) => index,
        };
        while index < self.store.len() && self.store.keys[index] <= high_end {
            let high = self.store.keys[index];
            let container = &self.store.containers[index];
            let chunk_start = if high == high_start { low_start } else { 0 };
            let chunk_end = if high == high_end { low_end } else { u16::MAX };
            if chunk_start == 0 && chunk_end == u16::MAX {
                total += container.cardinality() as u64;
            } else {
                total += container.count_range(chunk_start, chunk_end) as u64;
            }
            index += 1;
        }
        total
    }

    pub fn cardinality(&self) -> u64 {
        self.store
            .containers
            .iter()
            .map(|c| c.cardinality() as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn minimum(&self) -> Option<u32> {
        let key = *self.store.keys.first()?;
        let low = self.store.containers.first()?.min()?;
        Some(join(key, low))
    }

    pub fn maximum(&self) -> Option<u32> {
        let key = *self.store.keys.last()?;
        let low = self.store.containers.last()?.max()?;
        Some(join(key, low))
    }

    /// Number of values less than or equal to `value`.
    pub fn rank(&self, value: u32) -> u64 {
        let (high, low) = split(value);
        let mut total = 0u64;
        for (index, &key) in self.store.keys.iter().enumerate() {
            if key > high {
                break;
            }
            if key == high {
                total += self.store.containers[index].rank(low) as u64;
                break;
            }
            total += self.store.containers[index].cardinality() as u64;
        }
        total
    }

    /// Value with exactly `rank` smaller members, when one exists.
    pub fn select(&self, rank: u32) -> Option<u32> {
        let mut remaining = rank;
        for (index, &key) in self.store.keys.iter().enumerate() {
            let container = &self.store.containers[index];
            let cardinality = container.cardinality();
            if remaining < cardinality {
                let low = container.select(remaining as usize)?;
                return Some(join(key, low));
            }
            remaining -= cardinality;
        }
        None
    }

    /// Extract every value in ascending order.
    pub fn to_vec(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.cardinality() as usize);
        for (index, &key) in self.store.keys.iter().enumerate() {
            self.store.containers[index].append_values((key as u32) << 16, &mut out);
        }
        out
    }

    /// Visit values in ascending order until the callback declines; returns
    /// whether the full bitmap was visited.
    pub fn iterate<F: FnMut(u32) -> bool>(&self, mut callback: F) -> bool {
        for (index, &key) in self.store.keys.iter().enumerate() {
            let base = (key as u32) << 16;
            for low in self.store.containers[index].iter() {
                if !callback(base | low as u32) {
                    return false;
                }
            }
        }
        true
    }

    // ========================================================================
    // Representation maintenance
    // ========================================================================

    /// Rewrite every container into its smallest representation. Returns
    /// whether the optimized bitmap holds at least one run container.
    pub fn run_optimize(&mut self) -> bool {
        let mut has_run = false;
        for container in &mut self.store.containers {
            container.uniquify();
            let placeholder = Container::Array(ArrayContainer::new());
            let current = std::mem::replace(container, placeholder);
            let optimized = convert::optimize(current);
            has_run |= optimized.is_run();
            *container = optimized;
        }
        debug!(containers = self.store.len(), has_run, "run-optimize pass");
        has_run
    }

    /// Rewrite run containers back to array/bitset form. Returns whether any
    /// container changed.
    pub fn remove_run_compression(&mut self) -> bool {
        let mut changed = false;
        for container in &mut self.store.containers {
            container.uniquify();
            if !container.is_run() {
                continue;
            }
            let placeholder = Container::Array(ArrayContainer::new());
            if let Container::Run(run) = std::mem::replace(container, placeholder) {
                *container = convert::remove_run_compression(run);
                changed = true;
            }
        }
        changed
    }

    pub fn shrink_to_fit(&mut self) {
        for container in &mut self.store.containers {
            container.shrink_to_fit();
        }
        self.store.shrink_to_fit();
    }
}

impl PartialEq for RoaringBitmap {
    /// Set equality regardless of container representations.
    fn eq(&self, other: &Self) -> bool {
        self.store.keys == other.store.keys
            && self
                .store
                .containers
                .iter()
                .zip(other.store.containers.iter())
                .all(|(a, b)| a.same_set(b))
    }
}

impl Eq for RoaringBitmap {}

impl FromIterator<u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(values: I) -> Self {
        let mut bitmap = RoaringBitmap::new();
        bitmap.extend(values);
        bitmap
    }
}

impl Extend<u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, values: I) {
        for value in values {
            self.add(value);
        }
    }
}
