//! Split a vector into groups defined by the rows of another.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;
use vs_index::{IndexError, Positions};
use vs_types::{Complex, VecType};
use vs_vector::{Data, Vector};

use crate::{SliceError, Slicer};

/// Unique keys of `by` in first-appearance order, and the matching slices
/// of `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub key: Vector,
    pub val: Vec<Vector>,
}

/// Hashable view of one element. Doubles are compared by canonical bits so
/// that every NaN is one key and `-0.0 == 0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Atom {
    Missing,
    Bool(bool),
    Int(i64),
    Float(u64),
    Complex(u64, u64),
    Text(String),
    Byte(u8),
    Nested(VecType, Vec<Atom>),
}

fn float_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0_f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn atom_at(data: &Data, idx: usize) -> Atom {
    let atom = match data {
        Data::Logical(v) => v.get(idx).copied().flatten().map(Atom::Bool),
        Data::Integer(v) => v.get(idx).copied().flatten().map(Atom::Int),
        Data::Double(v) => v
            .get(idx)
            .copied()
            .flatten()
            .map(|x| Atom::Float(float_bits(x))),
        Data::Complex(v) => v
            .get(idx)
            .copied()
            .flatten()
            .map(|Complex { re, im }| Atom::Complex(float_bits(re), float_bits(im))),
        Data::Character(v) => v.get(idx).cloned().flatten().map(Atom::Text),
        Data::Raw(v) => v.get(idx).copied().map(Atom::Byte),
        Data::List(v) => v
            .get(idx)
            .map(|elt| Atom::Nested(elt.vec_type(), whole_key(elt))),
        Data::Table(t) => Some(Atom::Nested(
            VecType::Table,
            t.columns().iter().flat_map(|col| row_key(col, idx)).collect(),
        )),
        Data::Null => None,
    };
    atom.unwrap_or(Atom::Missing)
}

/// Key of row `row` (0-based): every slab of dimensioned data, every
/// column of a table.
fn row_key(v: &Vector, row: usize) -> Vec<Atom> {
    match (v.data(), v.attributes().dim()) {
        (Data::Table(t), _) => t.columns().iter().flat_map(|col| row_key(col, row)).collect(),
        (data, Some([nrow, rest @ ..])) => {
            let slabs: usize = rest.iter().product();
            (0..slabs).map(|s| atom_at(data, row + s * nrow)).collect()
        }
        (data, _) => vec![atom_at(data, row)],
    }
}

fn whole_key(v: &Vector) -> Vec<Atom> {
    (0..v.size()).flat_map(|row| row_key(v, row)).collect()
}

/// Group row positions of `by` by equality, in order of first appearance.
/// Missing values form one group.
fn group_positions(
    by: &Vector,
    size: usize,
) -> Result<(Positions, Vec<Positions>), IndexError> {
    let mut seen: HashMap<Vec<Atom>, usize> = HashMap::new();
    let mut firsts = Vec::new();
    let mut groups: Vec<Vec<Option<usize>>> = Vec::new();

    for row in 0..size {
        match seen.entry(row_key(by, row)) {
            Entry::Occupied(slot) => groups[*slot.get()].push(Some(row + 1)),
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                firsts.push(Some(row + 1));
                groups.push(vec![Some(row + 1)]);
            }
        }
    }

    let groups = groups
        .into_iter()
        .map(|group| Positions::new(group, size))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((Positions::new(firsts, size)?, groups))
}

/// Split `x` by the rows of `by`, which must have the same size. Rows of
/// `by` are compared through its proxy.
pub fn split(slicer: &Slicer, x: &Vector, by: &Vector) -> Result<Split, SliceError> {
    let by_info = slicer.proxy_of(by);
    let keys = by_info.as_ref().map_or(by, |info| info.proxy.as_ref());

    let size = slicer.size(x);
    let by_size = keys.size();
    if size != by_size {
        return Err(SliceError::SizeMismatch { x: size, by: by_size });
    }

    let (firsts, groups) = group_positions(keys, size)?;
    debug!(size, groups = groups.len(), "split into groups");

    Ok(Split {
        key: slicer.slice_with(by, by_info.as_ref(), &firsts)?,
        val: slicer.chop(x, &groups)?,
    })
}
