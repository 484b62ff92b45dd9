// Bitmap Introspection Statistics
//
// Detailed composition report: how many containers of each variant, how many
// values and bytes each variant accounts for, plus the value extremes and
// sum. Shared wrappers are attributed to the variant they wrap.

use serde::{Deserialize, Serialize};

use crate::container::{array, bitset, run, Container};
use crate::RoaringBitmap;

/// Composition statistics for a bitmap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Total number of containers.
    pub n_containers: u32,
    /// Number of array containers.
    pub n_array_containers: u32,
    /// Number of run containers.
    pub n_run_containers: u32,
    /// Number of bitset containers.
    pub n_bitset_containers: u32,
    /// Number of values held in array containers.
    pub n_values_array_containers: u32,
    /// Number of values held in run containers.
    pub n_values_run_containers: u32,
    /// Number of values held in bitset containers.
    pub n_values_bitset_containers: u32,
    /// Serialized bytes attributable to array containers.
    pub n_bytes_array_containers: u32,
    /// Serialized bytes attributable to run containers.
    pub n_bytes_run_containers: u32,
    /// Serialized bytes attributable to bitset containers.
    pub n_bytes_bitset_containers: u32,
    /// Maximal value, zero when the bitmap is empty.
    pub max_value: u32,
    /// Minimal value, zero when the bitmap is empty.
    pub min_value: u32,
    /// Sum of all values.
    pub sum_value: u64,
    /// Total number of values.
    pub cardinality: u64,
}

impl RoaringBitmap {
    /// Collect detailed statistics about the bitmap's composition.
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            n_containers: self.store.len() as u32,
            min_value: self.minimum().unwrap_or(0),
            max_value: self.maximum().unwrap_or(0),
            ..Statistics::default()
        };
        for (index, &key) in self.store.keys.iter().enumerate() {
            let container = &self.store.containers[index];
            let cardinality = container.cardinality();
            stats.cardinality += cardinality as u64;
            let base = (key as u64) << 16;
            match container.as_primitive() {
                Container::Array(a) => {
                    stats.n_array_containers += 1;
                    stats.n_values_array_containers += cardinality;
                    stats.n_bytes_array_containers += array::size_in_bytes(a.len()) as u32;
                    stats.sum_value +=
                        base * cardinality as u64 + a.iter().map(|v| v as u64).sum::<u64>();
                }
                Container::Bitset(b) => {
                    stats.n_bitset_containers += 1;
                    stats.n_values_bitset_containers += cardinality;
                    stats.n_bytes_bitset_containers += bitset::BITSET_SIZE_IN_BYTES as u32;
                    stats.sum_value +=
                        base * cardinality as u64 + b.iter().map(|v| v as u64).sum::<u64>();
                }
                Container::Run(r) => {
                    stats.n_run_containers += 1;
                    stats.n_values_run_containers += cardinality;
                    stats.n_bytes_run_containers += run::size_in_bytes(r.n_runs()) as u32;
                    // Sum each interval in closed form.
                    for interval in r.runs() {
                        let first = base + interval.start as u64;
                        let count = interval.cardinality() as u64;
                        stats.sum_value += count * first + count * (count - 1) / 2;
                    }
                }
                Container::Shared(_) => unreachable!("shared containers never nest"),
            }
        }
        stats
    }
}
