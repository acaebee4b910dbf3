#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dispatchable storage kind of a vector.
///
/// `Scalar` is never the kind of stored data; proxy providers report it for
/// objects that are not vectors at all (a classed record with list storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VecType {
    Null,
    Logical,
    Integer,
    Double,
    Complex,
    Character,
    Raw,
    List,
    Table,
    Scalar,
}

impl VecType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Logical => "logical",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Complex => "complex",
            Self::Character => "character",
            Self::Raw => "raw",
            Self::List => "list",
            Self::Table => "table",
            Self::Scalar => "scalar",
        }
    }

    /// Kinds gathered element-wise by a single typed kernel.
    #[must_use]
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::Logical
                | Self::Integer
                | Self::Double
                | Self::Complex
                | Self::Character
                | Self::Raw
                | Self::List
        )
    }
}

impl fmt::Display for VecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    #[must_use]
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im.is_sign_negative() {
            write!(f, "{}-{}i", self.re, -self.im)
        } else {
            write!(f, "{}+{}i", self.re, self.im)
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("can't convert {value} to integer without loss")]
    LossyFloatToInt { value: f64 },
}

/// Cast one double to an integer. Missing stays missing; fractional,
/// non-finite and out-of-range values are rejected.
pub fn cast_f64_to_i64(value: Option<f64>) -> Result<Option<i64>, TypeError> {
    let Some(v) = value else {
        return Ok(None);
    };
    if !v.is_finite() || v != v.trunc() {
        return Err(TypeError::LossyFloatToInt { value: v });
    }
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(TypeError::LossyFloatToInt { value: v });
    }
    Ok(Some(v as i64))
}

pub fn cast_doubles_to_integers(values: &[Option<f64>]) -> Result<Vec<Option<i64>>, TypeError> {
    values.iter().map(|v| cast_f64_to_i64(*v)).collect()
}

#[cfg(test)]
mod tests {
    use super::{Complex, TypeError, VecType, cast_doubles_to_integers, cast_f64_to_i64};

    #[test]
    fn integral_doubles_cast_exactly() {
        assert_eq!(cast_f64_to_i64(Some(3.0)), Ok(Some(3)));
        assert_eq!(cast_f64_to_i64(Some(-2.0)), Ok(Some(-2)));
        assert_eq!(cast_f64_to_i64(Some(0.0)), Ok(Some(0)));
    }

    #[test]
    fn missing_double_casts_to_missing_integer() {
        assert_eq!(cast_f64_to_i64(None), Ok(None));
    }

    #[test]
    fn fractional_and_non_finite_doubles_are_lossy() {
        for value in [1.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e300] {
            let err = cast_f64_to_i64(Some(value)).expect_err("must fail");
            assert!(matches!(err, TypeError::LossyFloatToInt { .. }));
        }
    }

    #[test]
    fn lossy_cast_message_names_value() {
        let err = cast_doubles_to_integers(&[Some(1.0), Some(2.5)]).expect_err("must fail");
        assert_eq!(err.to_string(), "can't convert 2.5 to integer without loss");
    }

    #[test]
    fn primitive_kinds_exclude_tables_and_scalars() {
        assert!(VecType::List.is_primitive());
        assert!(VecType::Raw.is_primitive());
        assert!(!VecType::Table.is_primitive());
        assert!(!VecType::Scalar.is_primitive());
        assert!(!VecType::Null.is_primitive());
    }

    #[test]
    fn complex_display() {
        assert_eq!(Complex::new(1.0, -2.0).to_string(), "1-2i");
        assert_eq!(Complex::new(0.5, 3.0).to_string(), "0.5+3i");
    }
}
