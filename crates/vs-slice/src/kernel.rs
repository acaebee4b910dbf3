//! Typed gather kernels.
//!
//! One generic loop, instantiated per element type. The only per-kind
//! knowledge is the element's missing value.

use vs_index::Positions;
use vs_vector::{Data, Vector};

use crate::SliceError;

/// Element type with a missing representation to write at missing slots.
pub trait Element: Clone {
    fn missing() -> Self;
}

impl<T: Clone> Element for Option<T> {
    fn missing() -> Self {
        None
    }
}

impl Element for u8 {
    fn missing() -> Self {
        0
    }
}

impl Element for Vector {
    fn missing() -> Self {
        Vector::null()
    }
}

/// Gather `source` at 1-based `positions`. Missing slots never read `source`.
#[must_use]
pub fn take<T: Element>(source: &[T], positions: &Positions) -> Vec<T> {
    positions
        .iter()
        .map(|slot| {
            slot.and_then(|p| p.checked_sub(1))
                .and_then(|idx| source.get(idx))
                .cloned()
                .unwrap_or_else(T::missing)
        })
        .collect()
}

/// Gather primitive storage. Tables are gathered column-wise by the
/// orchestrator and are rejected here, as is `Null`.
pub fn gather(data: &Data, positions: &Positions) -> Result<Data, SliceError> {
    let out = match data {
        Data::Logical(v) => Data::Logical(take(v, positions)),
        Data::Integer(v) => Data::Integer(take(v, positions)),
        Data::Double(v) => Data::Double(take(v, positions)),
        Data::Complex(v) => Data::Complex(take(v, positions)),
        Data::Character(v) => Data::Character(take(v, positions)),
        Data::Raw(v) => Data::Raw(take(v, positions)),
        Data::List(v) => Data::List(take(v, positions)),
        Data::Null | Data::Table(_) => {
            return Err(SliceError::Internal(format!(
                "non-vector base type `{}` in `gather()`",
                data.vec_type()
            )));
        }
    };
    Ok(out)
}

/// Gather names at `positions`. A name can't be missing, so slots filled
/// because of a missing position get the empty name.
#[must_use]
pub fn gather_names(names: &[String], positions: &Positions) -> Vec<String> {
    let mut out = Vec::with_capacity(positions.len());
    for slot in positions.iter() {
        let name = slot
            .and_then(|p| p.checked_sub(1))
            .and_then(|idx| names.get(idx));
        out.push(name.cloned().unwrap_or_default());
    }
    out
}
