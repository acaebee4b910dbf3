#![forbid(unsafe_code)]

//! Subscript normalization.
//!
//! Every supported subscript (positive or negative integers, doubles,
//! logical masks, names) is resolved into [`Positions`]: 1-based locations
//! that are guaranteed to lie within the indexed vector, with `None` marking
//! a slot that must be filled with a missing value.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;
use vs_types::{TypeError, VecType, cast_doubles_to_integers};
use vs_vector::{Data, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConflict {
    PositiveIndices,
    MissingValues,
}

impl fmt::Display for SignConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositiveIndices => f.write_str("positive indices"),
            Self::MissingValues => f.write_str("missing values"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    #[error("`i` must be an integer, character, or logical vector, not a {found}")]
    InvalidIndexKind { found: VecType },
    #[error(
        "can't index beyond the end of a vector: the vector has size {size} and you've tried to subset element {position}"
    )]
    OutOfRange { size: usize, position: u64 },
    #[error("can't subset with a mix of negative indices and {0}")]
    ConflictingSigns(SignConflict),
    #[error(
        "logical indices must have size 1 or be as long as the indexed vector: the vector has size {size} whereas the index has size {len}"
    )]
    BadMaskLength { size: usize, len: usize },
    #[error("can't use character to index an unnamed vector")]
    NoNames,
    #[error("can't index non-existing elements: no element is named `{name}`")]
    UnknownName { name: String },
    #[error(transparent)]
    Cast(#[from] TypeError),
}

/// A raw subscript, one of the four supported kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Subscript {
    Integer(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Logical(Vec<Option<bool>>),
    Names(Vec<Option<String>>),
}

impl Subscript {
    #[must_use]
    pub fn empty() -> Self {
        Self::Integer(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Integer(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Logical(v) => v.len(),
            Self::Names(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&[i64]> for Subscript {
    fn from(values: &[i64]) -> Self {
        Self::Integer(values.iter().copied().map(Some).collect())
    }
}

impl From<&[bool]> for Subscript {
    fn from(values: &[bool]) -> Self {
        Self::Logical(values.iter().copied().map(Some).collect())
    }
}

impl From<&[&str]> for Subscript {
    fn from(values: &[&str]) -> Self {
        Self::Names(values.iter().map(|v| Some((*v).to_owned())).collect())
    }
}

impl TryFrom<&Vector> for Subscript {
    type Error = IndexError;

    /// `Null` is the empty subscript. Attributes of the index are ignored.
    fn try_from(index: &Vector) -> Result<Self, Self::Error> {
        match index.data() {
            Data::Null => Ok(Self::empty()),
            Data::Integer(v) => Ok(Self::Integer(v.clone())),
            Data::Double(v) => Ok(Self::Double(v.clone())),
            Data::Logical(v) => Ok(Self::Logical(v.clone())),
            Data::Character(v) => Ok(Self::Names(v.clone())),
            other => Err(IndexError::InvalidIndexKind {
                found: other.vec_type(),
            }),
        }
    }
}

/// Canonical 1-based positions; `None` is the missing sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Positions(Vec<Option<usize>>);

impl Positions {
    /// Validate explicit positions against the size they will index.
    pub fn new(slots: Vec<Option<usize>>, size: usize) -> Result<Self, IndexError> {
        let out = Self(slots);
        out.check(size)?;
        Ok(out)
    }

    /// `[1, 2, ..., n]`.
    #[must_use]
    pub fn sequence(n: usize) -> Self {
        Self((1..=n).map(Some).collect())
    }

    /// `n` missing slots.
    #[must_use]
    pub fn missing(n: usize) -> Self {
        Self(vec![None; n])
    }

    /// Fails with `OutOfRange` unless every position lies in `[1, size]`.
    pub fn check(&self, size: usize) -> Result<(), IndexError> {
        match self.0.iter().flatten().find(|&&p| p == 0 || p > size) {
            Some(&position) => Err(IndexError::OutOfRange {
                size,
                position: position as u64,
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.0.iter().copied()
    }
}

/// Resolve a raw index vector against a target of `size` elements.
pub fn normalize_vector(
    index: &Vector,
    size: usize,
    names: Option<&[String]>,
) -> Result<Positions, IndexError> {
    normalize(&Subscript::try_from(index)?, size, names)
}

/// Resolve `index` against a target of `size` elements with optional names.
pub fn normalize(
    index: &Subscript,
    size: usize,
    names: Option<&[String]>,
) -> Result<Positions, IndexError> {
    match index {
        Subscript::Integer(values) => integer_positions(values, size),
        Subscript::Double(values) => {
            let values = cast_doubles_to_integers(values)?;
            integer_positions(&values, size)
        }
        Subscript::Logical(values) => logical_positions(values, size),
        Subscript::Names(values) => name_positions(values, names),
    }
}

fn out_of_range(size: usize, magnitude: u64) -> Option<IndexError> {
    (magnitude > size as u64).then_some(IndexError::OutOfRange {
        size,
        position: magnitude,
    })
}

fn integer_positions(values: &[Option<i64>], size: usize) -> Result<Positions, IndexError> {
    let mut n_zero = 0_usize;
    for value in values.iter().flatten() {
        let value = *value;
        if value < 0 {
            return exclusion_positions(values, size);
        }
        if value == 0 {
            n_zero += 1;
        } else if let Some(err) = out_of_range(size, value.unsigned_abs()) {
            return Err(err);
        }
    }

    // Zero is a no-op position, so the output is shorter by the zero count.
    let mut out = Vec::with_capacity(values.len() - n_zero);
    for value in values {
        match *value {
            Some(0) => {}
            // Bounded by `size` above, so the conversion is lossless.
            Some(p) => out.push(Some(p as usize)),
            None => out.push(None),
        }
    }
    Ok(Positions(out))
}

fn exclusion_positions(values: &[Option<i64>], size: usize) -> Result<Positions, IndexError> {
    trace!(size, len = values.len(), "negative subscript, building exclusion mask");
    let mut keep = vec![Some(true); size];
    for value in values {
        let value = value.ok_or(IndexError::ConflictingSigns(SignConflict::MissingValues))?;
        if value == 0 {
            continue;
        }
        if value > 0 {
            return Err(IndexError::ConflictingSigns(SignConflict::PositiveIndices));
        }
        let magnitude = value.unsigned_abs();
        if let Some(err) = out_of_range(size, magnitude) {
            return Err(err);
        }
        keep[magnitude as usize - 1] = Some(false);
    }
    logical_positions(&keep, size)
}

fn logical_positions(values: &[Option<bool>], size: usize) -> Result<Positions, IndexError> {
    if values.len() == size {
        let out = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| match v {
                Some(true) => Some(Some(i + 1)),
                Some(false) => None,
                None => Some(None),
            })
            .collect();
        return Ok(Positions(out));
    }

    // A single value is recycled to the full size.
    if let [value] = values {
        return Ok(match value {
            Some(true) => Positions::sequence(size),
            Some(false) => Positions::default(),
            None => Positions::missing(size),
        });
    }

    Err(IndexError::BadMaskLength {
        size,
        len: values.len(),
    })
}

fn position_map_first(names: &[String]) -> HashMap<&str, usize> {
    let mut positions = HashMap::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        positions.entry(name.as_str()).or_insert(idx + 1);
    }
    positions
}

fn name_positions(
    values: &[Option<String>],
    names: Option<&[String]>,
) -> Result<Positions, IndexError> {
    let names = names.ok_or(IndexError::NoNames)?;
    let lookup = position_map_first(names);
    let out = values
        .iter()
        .map(|value| match value {
            None => Ok(None),
            Some(name) => lookup
                .get(name.as_str())
                .map(|&p| Some(p))
                .ok_or_else(|| IndexError::UnknownName { name: name.clone() }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Positions(out))
}
