// Mixed-Type Container Operations
//
// The pairwise operator matrix: every binary operator is dispatched over the
// (variant, variant) pair, with a produce-new form, an in-place-on-left form
// and, for union and symmetric difference, a lazy form that skips cardinality
// maintenance and defers run normalization to the repair pass.
//
// Result variants are deterministic per cell. In-place forms take the left
// operand by value and return the result container, which may be of a
// different variant; the caller replaces its slot with whatever comes back.
// Shared operands are read through the wrapper, and in-place forms uniquify
// the left operand before touching it.

use super::array::ArrayContainer;
use super::bitset::BitsetContainer;
use super::convert;
use super::run::RunContainer;
use super::{Container, DEFAULT_MAX_SIZE};

/// Below this combined size a lazy array/array union stays an array; above
/// it the cells go straight to a no-card bitset.
const LAZY_ARRAY_UNION_THRESHOLD: usize = 1024;

// ============================================================================
// Helpers shared by several cells
// ============================================================================

fn array_and_bitset(array: &ArrayContainer, bitset: &BitsetContainer) -> ArrayContainer {
    let mut out = ArrayContainer::with_capacity(array.len());
    for value in array.iter() {
        if bitset.contains(value) {
            out.append(value);
        }
    }
    out
}

fn array_minus_bitset(array: &ArrayContainer, bitset: &BitsetContainer) -> ArrayContainer {
    let mut out = ArrayContainer::with_capacity(array.len());
    for value in array.iter() {
        if !bitset.contains(value) {
            out.append(value);
        }
    }
    out
}

fn array_and_run(array: &ArrayContainer, run: &RunContainer) -> ArrayContainer {
    let runs = run.runs();
    let mut out = ArrayContainer::with_capacity(array.len());
    let mut index = 0;
    for value in array.iter() {
        while index < runs.len() && runs[index].end() < value as u32 {
            index += 1;
        }
        if index < runs.len() && runs[index].start <= value {
            out.append(value);
        }
    }
    out
}

fn array_minus_run(array: &ArrayContainer, run: &RunContainer) -> ArrayContainer {
    let runs = run.runs();
    let mut out = ArrayContainer::with_capacity(array.len());
    let mut index = 0;
    for value in array.iter() {
        while index < runs.len() && runs[index].end() < value as u32 {
            index += 1;
        }
        if !(index < runs.len() && runs[index].start <= value) {
            out.append(value);
        }
    }
    out
}

fn run_xor_array(run: &RunContainer, array: &ArrayContainer) -> RunContainer {
    let array_only = array_minus_run(array, run);
    run.andnot_array(array).or_array(&array_only)
}

/// Symmetric difference of a sorted array against a bitset, emitted directly
/// as an array. Caller guarantees the result fits the array profile.
fn array_bitset_xor_to_array(
    array: &ArrayContainer,
    bitset: &BitsetContainer,
    cardinality: usize,
) -> ArrayContainer {
    let mut out = ArrayContainer::with_capacity(cardinality);
    let values = array.values();
    let mut j = 0;
    for bit in bitset.iter() {
        while j < values.len() && values[j] < bit {
            out.append(values[j]);
            j += 1;
        }
        if j < values.len() && values[j] == bit {
            j += 1;
        } else {
            out.append(bit);
        }
    }
    for &value in &values[j..] {
        out.append(value);
    }
    out
}

/// Bitset-minus-array difference, emitted directly as an array. Caller
/// guarantees the result fits the array profile.
fn bitset_minus_array_to_array(
    bitset: &BitsetContainer,
    array: &ArrayContainer,
    cardinality: usize,
) -> ArrayContainer {
    let mut out = ArrayContainer::with_capacity(cardinality);
    let values = array.values();
    let mut j = 0;
    for bit in bitset.iter() {
        while j < values.len() && values[j] < bit {
            j += 1;
        }
        if !(j < values.len() && values[j] == bit) {
            out.append(bit);
        }
    }
    out
}

/// Union of two arrays whose combined size crosses the threshold: go through
/// a bitset and demote only if the result still fits.
fn array_union_via_bitset(a: &ArrayContainer, b: &ArrayContainer) -> Container {
    let mut bitset = BitsetContainer::from_array(a);
    for value in b.iter() {
        bitset.add(value);
    }
    convert::normalize(Container::Bitset(bitset))
}

/// Zero out everything outside the run intervals, leaving `bitset` holding
/// the intersection with `run`.
fn mask_bitset_to_run(bitset: &mut BitsetContainer, run: &RunContainer) {
    let mut cursor = 0u32;
    for interval in run.runs() {
        bitset.reset_range(cursor, interval.start as u32);
        cursor = interval.end() + 1;
    }
    bitset.reset_range(cursor, 1 << 16);
}

// ============================================================================
// Union
// ============================================================================

pub(crate) fn or(a: &Container, b: &Container) -> Container {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => {
            if x.len() + y.len() > DEFAULT_MAX_SIZE {
                array_union_via_bitset(x, y)
            } else {
                Array(x.union_with(y))
            }
        }
        (Array(x), Bitset(y)) | (Bitset(y), Array(x)) => {
            let mut out = y.clone();
            for value in x.iter() {
                out.add(value);
            }
            Bitset(out)
        }
        (Bitset(x), Bitset(y)) => {
            let mut out = x.clone();
            out.or_with(y);
            Bitset(out)
        }
        (Run(x), Run(y)) => convert::run_to_efficient(x.or(y)),
        (Array(x), Run(y)) | (Run(y), Array(x)) => convert::run_to_efficient(y.or_array(x)),
        (Bitset(x), Run(y)) | (Run(y), Bitset(x)) => {
            if y.is_full() {
                // The run covers the whole chunk: the union is the run itself.
                Run(y.clone())
            } else {
                let mut out = x.clone();
                for interval in y.runs() {
                    out.set_range(interval.start as u32, interval.end() + 1);
                }
                Bitset(out)
            }
        }
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn or_inplace(mut a: Container, b: &Container) -> Container {
    a.uniquify();
    let rhs = b.as_primitive();
    let handled = match (&mut a, rhs) {
        (Container::Bitset(x), Container::Bitset(y)) => {
            x.or_with(y);
            true
        }
        (Container::Bitset(x), Container::Array(y)) => {
            for value in y.iter() {
                x.add(value);
            }
            true
        }
        (Container::Bitset(x), Container::Run(y)) if !y.is_full() => {
            for interval in y.runs() {
                x.set_range(interval.start as u32, interval.end() + 1);
            }
            true
        }
        (Container::Run(x), Container::Run(y)) => {
            let merged = x.or(y);
            *x = merged;
            true
        }
        _ => false,
    };
    if !handled {
        return or(&a, rhs);
    }
    match a {
        Container::Run(run) => convert::run_to_efficient(run),
        other => other,
    }
}

// ============================================================================
// Intersection
// ============================================================================

pub(crate) fn and(a: &Container, b: &Container) -> Container {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => Array(x.intersection(y)),
        (Array(x), Bitset(y)) | (Bitset(y), Array(x)) => Array(array_and_bitset(x, y)),
        (Bitset(x), Bitset(y)) => {
            let mut out = x.clone();
            out.and_with(y);
            convert::normalize(Bitset(out))
        }
        (Run(x), Run(y)) => convert::run_to_efficient(x.and(y)),
        (Array(x), Run(y)) | (Run(y), Array(x)) => Array(array_and_run(x, y)),
        (Bitset(x), Run(y)) | (Run(y), Bitset(x)) => {
            if y.is_full() {
                Bitset(x.clone())
            } else {
                let mut out = x.clone();
                mask_bitset_to_run(&mut out, y);
                convert::normalize(Bitset(out))
            }
        }
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn and_inplace(mut a: Container, b: &Container) -> Container {
    a.uniquify();
    let rhs = b.as_primitive();
    let handled = match (&mut a, rhs) {
        (Container::Bitset(x), Container::Bitset(y)) => {
            x.and_with(y);
            true
        }
        (Container::Array(x), Container::Bitset(y)) => {
            x.retain(|v| y.contains(v));
            true
        }
        (Container::Array(x), Container::Array(y)) => {
            let intersection = x.intersection(y);
            *x = intersection;
            true
        }
        (Container::Array(x), Container::Run(y)) => {
            let runs = y.runs();
            let mut index = 0;
            x.retain(|v| {
                while index < runs.len() && runs[index].end() < v as u32 {
                    index += 1;
                }
                index < runs.len() && runs[index].start <= v
            });
            true
        }
        _ => false,
    };
    if !handled {
        return and(&a, rhs);
    }
    convert::normalize(a)
}

// ============================================================================
// Symmetric difference
// ============================================================================

pub(crate) fn xor(a: &Container, b: &Container) -> Container {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => {
            if x.len() + y.len() <= DEFAULT_MAX_SIZE {
                Array(x.symmetric_difference(y))
            } else {
                let mut bitset = BitsetContainer::from_array(x);
                for value in y.iter() {
                    bitset.flip_value(value);
                }
                convert::normalize(Bitset(bitset))
            }
        }
        (Array(x), Bitset(y)) | (Bitset(y), Array(x)) => {
            // The result size decides the output variant before any bitset
            // is allocated.
            let overlap = x.iter().filter(|&v| y.contains(v)).count();
            let cardinality = y.len() as usize + x.len() - 2 * overlap;
            if cardinality <= DEFAULT_MAX_SIZE {
                Array(array_bitset_xor_to_array(x, y, cardinality))
            } else {
                let mut out = y.clone();
                for value in x.iter() {
                    out.flip_value(value);
                }
                Bitset(out)
            }
        }
        (Bitset(x), Bitset(y)) => {
            let mut out = x.clone();
            out.xor_with(y);
            convert::normalize(Bitset(out))
        }
        (Run(x), Run(y)) => convert::run_to_efficient(x.xor(y)),
        (Array(x), Run(y)) | (Run(y), Array(x)) => convert::run_to_efficient(run_xor_array(y, x)),
        (Bitset(x), Run(y)) | (Run(y), Bitset(x)) => {
            let mut out = x.clone();
            for interval in y.runs() {
                out.flip_range(interval.start as u32, interval.end() + 1);
            }
            convert::normalize(Bitset(out))
        }
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn xor_inplace(mut a: Container, b: &Container) -> Container {
    a.uniquify();
    let rhs = b.as_primitive();
    let handled = match (&mut a, rhs) {
        (Container::Bitset(x), Container::Bitset(y)) => {
            x.xor_with(y);
            true
        }
        (Container::Bitset(x), Container::Array(y)) => {
            for value in y.iter() {
                x.flip_value(value);
            }
            true
        }
        (Container::Bitset(x), Container::Run(y)) => {
            for interval in y.runs() {
                x.flip_range(interval.start as u32, interval.end() + 1);
            }
            true
        }
        _ => false,
    };
    if !handled {
        return xor(&a, rhs);
    }
    convert::normalize(a)
}

// ============================================================================
// Difference
// ============================================================================

pub(crate) fn andnot(a: &Container, b: &Container) -> Container {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => Array(x.difference(y)),
        (Array(x), Bitset(y)) => Array(array_minus_bitset(x, y)),
        (Array(x), Run(y)) => Array(array_minus_run(x, y)),
        (Bitset(x), Array(y)) => {
            // The result size decides the output variant before any bitset
            // is allocated.
            let overlap = y.iter().filter(|&v| x.contains(v)).count();
            let cardinality = x.len() as usize - overlap;
            if cardinality <= DEFAULT_MAX_SIZE {
                Array(bitset_minus_array_to_array(x, y, cardinality))
            } else {
                let mut out = x.clone();
                for value in y.iter() {
                    out.remove(value);
                }
                Bitset(out)
            }
        }
        (Bitset(x), Bitset(y)) => {
            let mut out = x.clone();
            out.andnot_with(y);
            convert::normalize(Bitset(out))
        }
        (Bitset(x), Run(y)) => {
            let mut out = x.clone();
            for interval in y.runs() {
                out.reset_range(interval.start as u32, interval.end() + 1);
            }
            convert::normalize(Bitset(out))
        }
        (Run(x), Array(y)) => convert::run_to_efficient(x.andnot_array(y)),
        (Run(x), Bitset(y)) => {
            if x.cardinality() as usize <= DEFAULT_MAX_SIZE {
                let mut out = ArrayContainer::with_capacity(x.cardinality() as usize);
                for value in x.iter() {
                    if !y.contains(value) {
                        out.append(value);
                    }
                }
                Array(out)
            } else {
                let mut out = convert::run_to_bitset(x);
                out.andnot_with(y);
                convert::normalize(Bitset(out))
            }
        }
        (Run(x), Run(y)) => convert::run_to_efficient(x.andnot(y)),
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn andnot_inplace(mut a: Container, b: &Container) -> Container {
    a.uniquify();
    let rhs = b.as_primitive();
    let handled = match (&mut a, rhs) {
        (Container::Bitset(x), Container::Bitset(y)) => {
            x.andnot_with(y);
            true
        }
        (Container::Bitset(x), Container::Array(y)) => {
            for value in y.iter() {
                x.remove(value);
            }
            true
        }
        (Container::Bitset(x), Container::Run(y)) => {
            for interval in y.runs() {
                x.reset_range(interval.start as u32, interval.end() + 1);
            }
            true
        }
        (Container::Array(x), Container::Bitset(y)) => {
            x.retain(|v| !y.contains(v));
            true
        }
        (Container::Array(x), Container::Array(y)) => {
            let difference = x.difference(y);
            *x = difference;
            true
        }
        _ => false,
    };
    if !handled {
        return andnot(&a, rhs);
    }
    convert::normalize(a)
}

// ============================================================================
// Lazy variants: cardinality maintenance skipped on bitset outputs, run
// outputs left un-normalized. Callers must repair every touched container.
// ============================================================================

pub(crate) fn lazy_or(a: &Container, b: &Container) -> Container {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => {
            if x.len() + y.len() > LAZY_ARRAY_UNION_THRESHOLD {
                let mut bitset = BitsetContainer::from_array(x);
                for value in y.iter() {
                    bitset.set_unchecked(value);
                }
                bitset.invalidate_cardinality();
                Bitset(bitset)
            } else {
                Array(x.union_with(y))
            }
        }
        (Array(x), Bitset(y)) | (Bitset(y), Array(x)) => {
            let mut out = y.clone();
            for value in x.iter() {
                out.set_unchecked(value);
            }
            out.invalidate_cardinality();
            Bitset(out)
        }
        (Bitset(x), Bitset(y)) => {
            let mut out = x.clone();
            out.lazy_or_with(y);
            Bitset(out)
        }
        (Run(x), Run(y)) => Run(x.or(y)),
        (Array(x), Run(y)) | (Run(y), Array(x)) => Run(y.or_array(x)),
        (Bitset(x), Run(y)) | (Run(y), Bitset(x)) => {
            if y.is_full() {
                Run(y.clone())
            } else {
                let mut out = x.clone();
                for interval in y.runs() {
                    out.set_range(interval.start as u32, interval.end() + 1);
                }
                out.invalidate_cardinality();
                Bitset(out)
            }
        }
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn lazy_or_inplace(mut a: Container, b: &Container) -> Container {
    a.uniquify();
    let rhs = b.as_primitive();
    let handled = match (&mut a, rhs) {
        (Container::Bitset(x), Container::Bitset(y)) => {
            x.lazy_or_with(y);
            true
        }
        (Container::Bitset(x), Container::Array(y)) => {
            for value in y.iter() {
                x.set_unchecked(value);
            }
            x.invalidate_cardinality();
            true
        }
        (Container::Bitset(x), Container::Run(y)) if !y.is_full() => {
            for interval in y.runs() {
                x.set_range(interval.start as u32, interval.end() + 1);
            }
            x.invalidate_cardinality();
            true
        }
        (Container::Run(x), Container::Run(y)) => {
            let merged = x.or(y);
            *x = merged;
            true
        }
        (Container::Run(x), Container::Array(y)) => {
            let merged = x.or_array(y);
            *x = merged;
            true
        }
        _ => false,
    };
    if !handled {
        return lazy_or(&a, rhs);
    }
    a
}

pub(crate) fn lazy_xor(a: &Container, b: &Container) -> Container {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => {
            if x.len() + y.len() > LAZY_ARRAY_UNION_THRESHOLD {
                let mut bitset = BitsetContainer::from_array(x);
                for value in y.iter() {
                    bitset.flip_unchecked(value);
                }
                bitset.invalidate_cardinality();
                Bitset(bitset)
            } else {
                Array(x.symmetric_difference(y))
            }
        }
        (Array(x), Bitset(y)) | (Bitset(y), Array(x)) => {
            let mut out = y.clone();
            for value in x.iter() {
                out.flip_unchecked(value);
            }
            out.invalidate_cardinality();
            Bitset(out)
        }
        (Bitset(x), Bitset(y)) => {
            let mut out = x.clone();
            out.lazy_xor_with(y);
            Bitset(out)
        }
        (Run(x), Run(y)) => Run(x.xor(y)),
        (Array(x), Run(y)) | (Run(y), Array(x)) => Run(run_xor_array(y, x)),
        (Bitset(x), Run(y)) | (Run(y), Bitset(x)) => {
            let mut out = x.clone();
            for interval in y.runs() {
                out.flip_range(interval.start as u32, interval.end() + 1);
            }
            out.invalidate_cardinality();
            Bitset(out)
        }
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn lazy_xor_inplace(mut a: Container, b: &Container) -> Container {
    a.uniquify();
    let rhs = b.as_primitive();
    let handled = match (&mut a, rhs) {
        (Container::Bitset(x), Container::Bitset(y)) => {
            x.lazy_xor_with(y);
            true
        }
        (Container::Bitset(x), Container::Array(y)) => {
            for value in y.iter() {
                x.flip_unchecked(value);
            }
            x.invalidate_cardinality();
            true
        }
        (Container::Bitset(x), Container::Run(y)) => {
            for interval in y.runs() {
                x.flip_range(interval.start as u32, interval.end() + 1);
            }
            x.invalidate_cardinality();
            true
        }
        _ => false,
    };
    if !handled {
        return lazy_xor(&a, rhs);
    }
    a
}

// ============================================================================
// Predicates
// ============================================================================

pub(crate) fn intersects(a: &Container, b: &Container) -> bool {
    use Container::{Array, Bitset, Run, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Array(x), Array(y)) => x.intersects(y),
        (Array(x), Bitset(y)) | (Bitset(y), Array(x)) => x.iter().any(|v| y.contains(v)),
        (Bitset(x), Bitset(y)) => x.intersects(y),
        (Run(x), Run(y)) => x.intersects(y),
        (Array(x), Run(y)) | (Run(y), Array(x)) => {
            let runs = y.runs();
            let mut index = 0;
            x.iter().any(|v| {
                while index < runs.len() && runs[index].end() < v as u32 {
                    index += 1;
                }
                index < runs.len() && runs[index].start <= v
            })
        }
        (Bitset(x), Run(y)) | (Run(y), Bitset(x)) => y
            .runs()
            .iter()
            .any(|r| x.intersects_range(r.start as u32, r.end() + 1)),
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
    }
}

pub(crate) fn is_subset(a: &Container, b: &Container) -> bool {
    use Container::{Bitset, Shared};
    match (a.as_primitive(), b.as_primitive()) {
        (Bitset(x), Bitset(y)) => x.is_subset_of(y),
        (Shared(_), _) | (_, Shared(_)) => unreachable!("shared operands are read through"),
        (x, y) => x.cardinality() <= y.cardinality() && x.iter().all(|v| y.contains(v)),
    }
}
