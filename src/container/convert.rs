// Container Conversion - Minimum-Size Normalization
//
// Rewrites a container into whichever of the three primitive variants has
// the smallest serialized size, using exactly these byte counts:
//   Array  = 2 * cardinality
//   Bitset = 8192
//   Run    = 2 + 4 * n_runs
// Ties break toward the current variant so a round of optimization never
// flip-flops representations.

use tracing::trace;

use super::array::{self, ArrayContainer};
use super::bitset::{BitsetContainer, BITSET_SIZE_IN_BYTES};
use super::run::{self, Interval, RunContainer};
use super::{Container, DEFAULT_MAX_SIZE};

pub(crate) fn array_to_bitset(array: &ArrayContainer) -> BitsetContainer {
    BitsetContainer::from_array(array)
}

pub(crate) fn bitset_to_array(bitset: &BitsetContainer) -> ArrayContainer {
    bitset.to_array()
}

pub(crate) fn array_to_run(array: &ArrayContainer) -> RunContainer {
    let mut run = RunContainer::with_capacity(array.num_runs());
    for value in array.iter() {
        run.append(Interval::new(value, 0));
    }
    run
}

pub(crate) fn run_to_array(run: &RunContainer) -> ArrayContainer {
    let mut array = ArrayContainer::with_capacity(run.cardinality() as usize);
    for value in run.iter() {
        array.append(value);
    }
    array
}

pub(crate) fn run_to_bitset(run: &RunContainer) -> BitsetContainer {
    BitsetContainer::from_run(run)
}

pub(crate) fn bitset_to_run(bitset: &BitsetContainer) -> RunContainer {
    let mut runs = Vec::with_capacity(bitset.num_runs());
    let mut current: Option<(u16, u16)> = None;
    for value in bitset.iter() {
        match current {
            Some((start, end)) if value == end.wrapping_add(1) => current = Some((start, value)),
            Some((start, end)) => {
                runs.push(Interval::new(start, end - start));
                current = Some((value, value));
            }
            None => current = Some((value, value)),
        }
    }
    if let Some((start, end)) = current {
        runs.push(Interval::new(start, end - start));
    }
    RunContainer::from_intervals(runs)
}

/// Post-operation normalization: oversize arrays become bitsets, underfull
/// bitsets become arrays. Run containers are left alone (run-optimize owns
/// the run/size trade-off).
pub(crate) fn normalize(container: Container) -> Container {
    match container {
        Container::Array(array) if array.len() > DEFAULT_MAX_SIZE => {
            trace!(cardinality = array.len(), "promoting array to bitset");
            Container::Bitset(array_to_bitset(&array))
        }
        Container::Bitset(bitset) if (bitset.len() as usize) <= DEFAULT_MAX_SIZE => {
            trace!(cardinality = bitset.len(), "demoting bitset to array");
            Container::Array(bitset_to_array(&bitset))
        }
        other => other,
    }
}

/// The §4.4 size rules for a run container: keep it, or rewrite it into the
/// smaller of Array/Bitset. This is the normal exit path for run-producing
/// operations.
pub(crate) fn run_to_efficient(run: RunContainer) -> Container {
    let cardinality = run.cardinality() as usize;
    let run_bytes = run::size_in_bytes(run.n_runs());
    if cardinality <= DEFAULT_MAX_SIZE {
        if run_bytes > array::size_in_bytes(cardinality) {
            return Container::Array(run_to_array(&run));
        }
    } else if run_bytes > BITSET_SIZE_IN_BYTES {
        return Container::Bitset(run_to_bitset(&run));
    }
    Container::Run(run)
}

/// Full run-optimize pass for one container: choose the representation with
/// the smallest serialized size, breaking ties toward the current variant.
pub(crate) fn optimize(container: Container) -> Container {
    match container {
        Container::Array(array) => {
            let run_bytes = run::size_in_bytes(array.num_runs());
            if run_bytes < array::size_in_bytes(array.len()) {
                trace!(cardinality = array.len(), "rewriting array as runs");
                Container::Run(array_to_run(&array))
            } else {
                Container::Array(array)
            }
        }
        Container::Bitset(bitset) => {
            if (bitset.len() as usize) <= DEFAULT_MAX_SIZE {
                // Sparse bitset: demote, then let the array rule pick runs.
                return optimize(Container::Array(bitset_to_array(&bitset)));
            }
            let run_bytes = run::size_in_bytes(bitset.num_runs());
            if run_bytes < BITSET_SIZE_IN_BYTES {
                trace!(cardinality = bitset.len(), "rewriting bitset as runs");
                Container::Run(bitset_to_run(&bitset))
            } else {
                Container::Bitset(bitset)
            }
        }
        Container::Run(run) => run_to_efficient(run),
        Container::Shared(_) => unreachable!("optimize runs on uniquified containers"),
    }
}

/// Undo run compression: rewrite a run container as Array or Bitset by the
/// cardinality threshold alone.
pub(crate) fn remove_run_compression(run: RunContainer) -> Container {
    if run.cardinality() as usize <= DEFAULT_MAX_SIZE {
        Container::Array(run_to_array(&run))
    } else {
        Container::Bitset(run_to_bitset(&run))
    }
}

/// Negate the container within the inclusive sub-range `[start, end]`,
/// producing the smallest fit. Each primitive variant has its own path:
/// arrays detour through a bitset, bitsets flip the word range, runs do the
/// interval arithmetic directly.
pub(crate) fn negate_range(container: &Container, start: u16, end: u16) -> Container {
    match container.as_primitive() {
        Container::Array(array) => {
            let mut bitset = array_to_bitset(array);
            bitset.flip_range(start as u32, end as u32 + 1);
            normalize(Container::Bitset(bitset))
        }
        Container::Bitset(bitset) => {
            let mut out = bitset.clone();
            out.flip_range(start as u32, end as u32 + 1);
            normalize(Container::Bitset(out))
        }
        Container::Run(run) => {
            let window = RunContainer::from_range(start, end);
            let outside = run.andnot(&window);
            let inside_flipped = window.andnot(run);
            run_to_efficient(outside.or(&inside_flipped))
        }
        Container::Shared(_) => unreachable!("shared containers never nest"),
    }
}

/// Repair a container updated by a lazy operation: recompute the bitset
/// popcount (demoting when warranted) and normalize deferred run outputs.
pub(crate) fn repair_after_lazy(container: Container) -> Container {
    match container {
        Container::Bitset(mut bitset) => {
            let cardinality = bitset.repair_cardinality();
            if cardinality as usize <= DEFAULT_MAX_SIZE {
                Container::Array(bitset_to_array(&bitset))
            } else {
                Container::Bitset(bitset)
            }
        }
        Container::Run(run) => run_to_efficient(run),
        other => other,
    }
}
