//! Collaborators consumed by the orchestrator: proxy query, fallback
//! extraction and attribute restoration, plus the default implementations.

use std::borrow::Cow;
use std::collections::BTreeSet;

use vs_index::Positions;
use vs_types::VecType;
use vs_vector::{Data, Table, Vector};

use crate::{SliceConfig, SliceError, Slicer, kernel};

/// Result of a proxy query.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyInfo<'a> {
    /// Dispatchable storage kind of the proxy.
    pub kind: VecType,
    /// Flat representation to gather from.
    pub proxy: Cow<'a, Vector>,
    /// Whether the declared type of the vector supplies its own proxy.
    pub has_method: bool,
}

/// Proxy capability query. Must be idempotent and side-effect free.
pub trait ProxyProvider: Send + Sync {
    fn proxy_info<'a>(&self, x: &'a Vector) -> ProxyInfo<'a>;
}

/// Extraction path for objects that don't take part in the proxy protocol,
/// and for dimensioned data. Nested values (table columns) go back through
/// `slicer` so that their own proxies apply.
pub trait CustomExtractor: Send + Sync {
    fn extract(
        &self,
        slicer: &Slicer,
        x: &Vector,
        positions: &Positions,
    ) -> Result<Vector, SliceError>;
}

/// Re-applies the original's type attributes to a freshly gathered result.
/// `positions` is provenance only.
pub trait Restorer: Send + Sync {
    fn restore(
        &self,
        sliced: Vector,
        original: &Vector,
        positions: &Positions,
    ) -> Result<Vector, SliceError>;
}

/// Class-registry proxy: a vector is its own proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassProxy {
    proxy_classes: BTreeSet<String>,
    table_classes: BTreeSet<String>,
    list_classes: BTreeSet<String>,
}

impl ClassProxy {
    #[must_use]
    pub fn new(config: &SliceConfig) -> Self {
        Self {
            proxy_classes: config.proxy_classes.clone(),
            table_classes: config.table_classes.clone(),
            list_classes: config.list_classes.clone(),
        }
    }
}

impl Default for ClassProxy {
    fn default() -> Self {
        Self::new(&SliceConfig::default())
    }
}

impl ProxyProvider for ClassProxy {
    fn proxy_info<'a>(&self, x: &'a Vector) -> ProxyInfo<'a> {
        let class = x.class().unwrap_or_default();
        let any_in = |set: &BTreeSet<String>| class.iter().any(|c| set.contains(c));

        let kind = match x.data() {
            // A classed list is a record-like scalar unless it declares itself a list.
            Data::List(_) if x.is_object() && !any_in(&self.list_classes) => VecType::Scalar,
            data => data.vec_type(),
        };
        let has_method = any_in(&self.proxy_classes)
            || (kind == VecType::Table && any_in(&self.table_classes));

        ProxyInfo {
            kind,
            proxy: Cow::Borrowed(x),
            has_method,
        }
    }
}

/// Base-style extraction. Dimensioned data is sliced along its first
/// dimension, table columns are sliced by the calling [`Slicer`], and
/// everything else is gathered element-wise keeping names and class,
/// dropping other attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BracketExtract;

impl BracketExtract {
    fn extract_columns(
        slicer: &Slicer,
        table: &Table,
        positions: &Positions,
    ) -> Result<Table, SliceError> {
        let columns = table
            .columns()
            .iter()
            .map(|col| slicer.slice_positions(col, positions))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table::with_nrow(
            table.names().to_vec(),
            columns,
            positions.len(),
        )?)
    }

    fn extract_rows(
        x: &Vector,
        dim: &[usize],
        positions: &Positions,
    ) -> Result<Vector, SliceError> {
        let Some((&nrow, rest)) = dim.split_first() else {
            return Err(SliceError::UnsupportedShape(
                "can't slice an array without extents".to_owned(),
            ));
        };

        // Column-major: row `p` of slab `s` lives at `p + s * nrow`.
        let slabs: usize = rest.iter().product();
        let linear = (0..slabs)
            .flat_map(|slab| {
                positions
                    .iter()
                    .map(move |slot| slot.map(|p| p + slab * nrow))
            })
            .collect();
        let linear = Positions::new(linear, x.data().len())?;

        let mut out_dim = dim.to_vec();
        out_dim[0] = positions.len();
        let mut out = Vector::from(kernel::gather(x.data(), &linear)?).with_dim(out_dim)?;
        if let Some(names) = x.names() {
            out.set_names(Some(kernel::gather_names(names, positions)))?;
        }
        if let Some(class) = x.class() {
            out = out.with_class(class);
        }
        Ok(out)
    }
}

impl CustomExtractor for BracketExtract {
    fn extract(
        &self,
        slicer: &Slicer,
        x: &Vector,
        positions: &Positions,
    ) -> Result<Vector, SliceError> {
        if let Some(dim) = x.attributes().dim() {
            return Self::extract_rows(x, dim, positions);
        }

        let data = match x.data() {
            Data::Table(table) => Data::Table(Self::extract_columns(slicer, table, positions)?),
            other => kernel::gather(other, positions)?,
        };
        let mut out = Vector::from(data);
        if let Some(names) = x.names() {
            out.set_names(Some(kernel::gather_names(names, positions)))?;
        }
        if let Some(class) = x.class() {
            out = out.with_class(class);
        }
        Ok(out)
    }
}

/// Copies class and extra attributes from the original.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeRestore;

impl Restorer for AttributeRestore {
    fn restore(
        &self,
        sliced: Vector,
        original: &Vector,
        _positions: &Positions,
    ) -> Result<Vector, SliceError> {
        Ok(sliced.with_attributes_of(original.attributes()))
    }
}
