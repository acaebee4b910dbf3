#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vs_types::{Complex, VecType};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VectorError {
    #[error("names must have the same size as the vector: size={size}, names={names}")]
    NamesLength { size: usize, names: usize },
    #[error("dimensions {dim:?} don't match a vector of length {len}")]
    DimMismatch { dim: Vec<usize>, len: usize },
    #[error("table column `{name}` has {len} rows, expected {nrow}")]
    ColumnLength {
        name: String,
        len: usize,
        nrow: usize,
    },
    #[error("table has {names} column names for {columns} columns")]
    ColumnNames { names: usize, columns: usize },
    #[error("{kind} storage can't carry dimensions")]
    DimOnNonAtomic { kind: VecType },
}

/// Typed element storage. Missing elements are `None` for every kind
/// except raw bytes, which have no missing representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Data {
    Null,
    Logical(Vec<Option<bool>>),
    Integer(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Complex(Vec<Option<Complex>>),
    Character(Vec<Option<String>>),
    Raw(Vec<u8>),
    List(Vec<Vector>),
    Table(Table),
}

impl Data {
    /// Element count, or row count for tables.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Logical(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Complex(v) => v.len(),
            Self::Character(v) => v.len(),
            Self::Raw(v) => v.len(),
            Self::List(v) => v.len(),
            Self::Table(t) => t.nrow(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn vec_type(&self) -> VecType {
        match self {
            Self::Null => VecType::Null,
            Self::Logical(_) => VecType::Logical,
            Self::Integer(_) => VecType::Integer,
            Self::Double(_) => VecType::Double,
            Self::Complex(_) => VecType::Complex,
            Self::Character(_) => VecType::Character,
            Self::Raw(_) => VecType::Raw,
            Self::List(_) => VecType::List,
            Self::Table(_) => VecType::Table,
        }
    }
}

/// Structural attributes carried alongside the data. The slicing core only
/// reads `class` and `dim`; `extra` is passed through opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    class: Option<Vec<String>>,
    dim: Option<Vec<usize>>,
    extra: BTreeMap<String, Vector>,
}

impl Attributes {
    #[must_use]
    pub fn class(&self) -> Option<&[String]> {
        self.class.as_deref()
    }

    #[must_use]
    pub fn dim(&self) -> Option<&[usize]> {
        self.dim.as_deref()
    }

    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, Vector> {
        &self.extra
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.class.is_none() && self.dim.is_none() && self.extra.is_empty()
    }
}

/// Ordered collection of named, equal-length columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vector>,
    nrow: usize,
}

impl Table {
    /// Build a table from `(name, column)` pairs. The row count is taken
    /// from the first column; a table without columns has zero rows.
    pub fn new(columns: Vec<(String, Vector)>) -> Result<Self, VectorError> {
        let nrow = columns.first().map_or(0, |(_, col)| col.size());
        let (names, columns): (Vec<String>, Vec<Vector>) = columns.into_iter().unzip();
        Self::with_nrow(names, columns, nrow)
    }

    /// Unclassed columns must have `nrow` elements. A classed column's row
    /// count is defined by its proxy, which storage can't see, so it is
    /// taken on trust.
    pub fn with_nrow(
        names: Vec<String>,
        columns: Vec<Vector>,
        nrow: usize,
    ) -> Result<Self, VectorError> {
        if names.len() != columns.len() {
            return Err(VectorError::ColumnNames {
                names: names.len(),
                columns: columns.len(),
            });
        }
        if let Some((name, col)) = names
            .iter()
            .zip(&columns)
            .find(|(_, col)| !col.is_object() && col.size() != nrow)
        {
            return Err(VectorError::ColumnLength {
                name: name.clone(),
                len: col.size(),
                nrow,
            });
        }
        Ok(Self {
            names,
            columns,
            nrow,
        })
    }

    #[must_use]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[must_use]
    pub fn ncol(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn columns(&self) -> &[Vector] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Vector> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
    }
}

/// A homogeneous vector (or table) with optional element names and
/// attributes. `Vector::null()` is the absence value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Data,
    names: Option<Vec<String>>,
    #[serde(default)]
    attributes: Attributes,
}

impl Default for Vector {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Data> for Vector {
    fn from(data: Data) -> Self {
        Self {
            data,
            names: None,
            attributes: Attributes::default(),
        }
    }
}

impl From<Table> for Vector {
    fn from(table: Table) -> Self {
        Self::from(Data::Table(table))
    }
}

impl Vector {
    #[must_use]
    pub fn null() -> Self {
        Self::from(Data::Null)
    }

    #[must_use]
    pub fn logical(values: Vec<Option<bool>>) -> Self {
        Self::from(Data::Logical(values))
    }

    #[must_use]
    pub fn integer(values: Vec<Option<i64>>) -> Self {
        Self::from(Data::Integer(values))
    }

    #[must_use]
    pub fn double(values: Vec<Option<f64>>) -> Self {
        Self::from(Data::Double(values))
    }

    #[must_use]
    pub fn complex(values: Vec<Option<Complex>>) -> Self {
        Self::from(Data::Complex(values))
    }

    #[must_use]
    pub fn character(values: Vec<Option<String>>) -> Self {
        Self::from(Data::Character(values))
    }

    #[must_use]
    pub fn raw(values: Vec<u8>) -> Self {
        Self::from(Data::Raw(values))
    }

    #[must_use]
    pub fn list(values: Vec<Vector>) -> Self {
        Self::from(Data::List(values))
    }

    /// Non-missing integers, a common shape for data and subscripts alike.
    #[must_use]
    pub fn ints(values: &[i64]) -> Self {
        Self::integer(values.iter().copied().map(Some).collect())
    }

    /// Non-missing strings.
    #[must_use]
    pub fn strs(values: &[&str]) -> Self {
        Self::character(values.iter().map(|v| Some((*v).to_owned())).collect())
    }

    pub fn with_names(mut self, names: Vec<String>) -> Result<Self, VectorError> {
        self.set_names(Some(names))?;
        Ok(self)
    }

    pub fn set_names(&mut self, names: Option<Vec<String>>) -> Result<(), VectorError> {
        if let Some(names) = &names
            && names.len() != self.size()
        {
            return Err(VectorError::NamesLength {
                size: self.size(),
                names: names.len(),
            });
        }
        self.names = names;
        Ok(())
    }

    #[must_use]
    pub fn with_class<I, S>(mut self, class: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.class = Some(class.into_iter().map(Into::into).collect());
        self
    }

    /// Attach dimensions. The product must equal the storage length and
    /// existing names, which are row names for dimensioned data, must match
    /// the first extent.
    pub fn with_dim(mut self, dim: Vec<usize>) -> Result<Self, VectorError> {
        if matches!(self.data, Data::Null | Data::Table(_)) {
            return Err(VectorError::DimOnNonAtomic {
                kind: self.data.vec_type(),
            });
        }
        let len = self.data.len();
        if dim.is_empty() || dim.iter().product::<usize>() != len {
            return Err(VectorError::DimMismatch { dim, len });
        }
        if let Some(names) = &self.names
            && names.len() != dim[0]
        {
            return Err(VectorError::NamesLength {
                size: dim[0],
                names: names.len(),
            });
        }
        self.attributes.dim = Some(dim);
        Ok(self)
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: Vector) -> Self {
        self.attributes.extra.insert(name.into(), value);
        self
    }

    /// Replace class and extra attributes, keeping names and dimensions
    /// which describe this vector's own shape.
    #[must_use]
    pub fn with_attributes_of(mut self, other: &Attributes) -> Self {
        self.attributes.class = other.class.clone();
        self.attributes.extra = other.extra.clone();
        self
    }

    #[must_use]
    pub fn data(&self) -> &Data {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Data {
        self.data
    }

    #[must_use]
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn class(&self) -> Option<&[String]> {
        self.attributes.class()
    }

    #[must_use]
    pub fn inherits(&self, class: &str) -> bool {
        self.class().is_some_and(|c| c.iter().any(|k| k == class))
    }

    #[must_use]
    pub fn vec_type(&self) -> VecType {
        self.data.vec_type()
    }

    /// Number of elements, rows for tables, first extent for dimensioned data.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.attributes.dim.as_deref() {
            Some([rows, ..]) => *rows,
            _ => self.data.len(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.data, Data::Null)
    }

    /// A tagged object: carries a class.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.attributes.class.is_some()
    }

    #[must_use]
    pub fn has_dim(&self) -> bool {
        self.attributes.dim.is_some()
    }

    /// True when anything besides bare data is attached, names included.
    #[must_use]
    pub fn has_attributes(&self) -> bool {
        self.names.is_some() || !self.attributes.is_empty()
    }
}
