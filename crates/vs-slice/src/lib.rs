#![forbid(unsafe_code)]

//! Vector slicing.
//!
//! [`Slicer`] resolves a subscript into canonical positions and gathers a
//! new vector at those positions. Names follow the elements, missing
//! positions produce the kind's missing value, and type attributes are
//! re-applied by the configured [`Restorer`]. Classed values that don't
//! take part in the proxy protocol, as well as dimensioned data, go through
//! the configured [`CustomExtractor`] instead.

pub mod collab;
pub mod kernel;
pub mod split;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};
use vs_index::{IndexError, Positions, Subscript, normalize, normalize_vector};
use vs_types::VecType;
use vs_vector::{Data, Table, Vector, VectorError};

pub use collab::{
    AttributeRestore, BracketExtract, ClassProxy, CustomExtractor, ProxyInfo, ProxyProvider,
    Restorer,
};
pub use split::{Split, split};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SliceError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("{0}")]
    UnsupportedShape(String),
    #[error("`x` and `by` must have the same size: x={x}, by={by}")]
    SizeMismatch { x: usize, by: usize },
}

/// Class registry used by the default proxy provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    /// Classes that supply their own proxy and are gathered natively.
    pub proxy_classes: BTreeSet<String>,
    /// Classes of table storage gathered natively, column by column.
    pub table_classes: BTreeSet<String>,
    /// Classes that mark list storage as a vector rather than a record.
    pub list_classes: BTreeSet<String>,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            proxy_classes: BTreeSet::new(),
            table_classes: ["data.frame".to_owned()].into(),
            list_classes: ["list".to_owned()].into(),
        }
    }
}

/// Slice orchestrator. Collaborators are fixed at construction.
pub struct Slicer {
    proxy: Box<dyn ProxyProvider>,
    fallback: Box<dyn CustomExtractor>,
    restorer: Box<dyn Restorer>,
}

impl Default for Slicer {
    fn default() -> Self {
        Self::new(&SliceConfig::default())
    }
}

impl std::fmt::Debug for Slicer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slicer").finish_non_exhaustive()
    }
}

impl Slicer {
    /// Default collaborators: [`ClassProxy`], [`BracketExtract`] and
    /// [`AttributeRestore`].
    #[must_use]
    pub fn new(config: &SliceConfig) -> Self {
        Self::with_collaborators(
            Box::new(ClassProxy::new(config)),
            Box::new(BracketExtract),
            Box::new(AttributeRestore),
        )
    }

    #[must_use]
    pub fn with_collaborators(
        proxy: Box<dyn ProxyProvider>,
        fallback: Box<dyn CustomExtractor>,
        restorer: Box<dyn Restorer>,
    ) -> Self {
        Self {
            proxy,
            fallback,
            restorer,
        }
    }

    /// Slice `x` with a typed subscript.
    pub fn slice(&self, x: &Vector, index: &Subscript) -> Result<Vector, SliceError> {
        if x.is_null() {
            return Ok(Vector::null());
        }
        let info = self.proxy_of(x);
        let positions = normalize(index, size_with(x, info.as_ref()), x.names())?;
        self.dispatch(x, info.as_ref(), &positions)
    }

    /// Slice `x` with a raw index vector (integer, double, logical,
    /// character or `Null`).
    pub fn slice_vector(&self, x: &Vector, index: &Vector) -> Result<Vector, SliceError> {
        if x.is_null() {
            return Ok(Vector::null());
        }
        let info = self.proxy_of(x);
        let positions = normalize_vector(index, size_with(x, info.as_ref()), x.names())?;
        self.dispatch(x, info.as_ref(), &positions)
    }

    /// Slice `x` at canonical positions, which are checked against `x`'s size.
    pub fn slice_positions(&self, x: &Vector, positions: &Positions) -> Result<Vector, SliceError> {
        self.slice_with(x, self.proxy_of(x).as_ref(), positions)
    }

    /// Size of `x` as seen through its proxy. Dimensioned data reports its
    /// first extent.
    #[must_use]
    pub fn size(&self, x: &Vector) -> usize {
        size_with(x, self.proxy_of(x).as_ref())
    }

    /// One slice per position sequence. The proxy of `x` is queried once.
    pub fn chop(&self, x: &Vector, indices: &[Positions]) -> Result<Vec<Vector>, SliceError> {
        let info = self.proxy_of(x);
        indices
            .iter()
            .map(|positions| self.slice_with(x, info.as_ref(), positions))
            .collect()
    }

    /// A vector of `x`'s type with `n` missing elements.
    pub fn missing(&self, x: &Vector, n: usize) -> Result<Vector, SliceError> {
        if x.is_null() {
            return Ok(Vector::null());
        }
        self.dispatch(x, self.proxy_of(x).as_ref(), &Positions::missing(n))
    }

    /// Proxy of `x`, or `None` for dimensioned data, which is never proxied.
    pub(crate) fn proxy_of<'a>(&self, x: &'a Vector) -> Option<ProxyInfo<'a>> {
        (!x.has_dim()).then(|| self.proxy.proxy_info(x))
    }

    /// Bounds-check `positions` against the size seen through `info`, then
    /// slice.
    pub(crate) fn slice_with(
        &self,
        x: &Vector,
        info: Option<&ProxyInfo<'_>>,
        positions: &Positions,
    ) -> Result<Vector, SliceError> {
        if x.is_null() {
            return Ok(Vector::null());
        }
        positions.check(size_with(x, info))?;
        self.dispatch(x, info, positions)
    }

    fn dispatch(
        &self,
        x: &Vector,
        info: Option<&ProxyInfo<'_>>,
        positions: &Positions,
    ) -> Result<Vector, SliceError> {
        let Some(info) = info else {
            debug!(
                dim = ?x.attributes().dim(),
                "dimensioned input, delegating to fallback extraction"
            );
            return self.fallback.extract(self, x, positions);
        };

        if x.is_object() && !info.has_method {
            if info.kind == VecType::Scalar {
                return Err(SliceError::UnsupportedShape(format!(
                    "can't slice a scalar of class {:?}",
                    x.class().unwrap_or_default()
                )));
            }
            debug!(
                class = ?x.class(),
                "no proxy method, delegating to fallback extraction"
            );
            let out = self.fallback.extract(self, x, positions)?;
            // Restore only when the fallback didn't attach attributes itself.
            if out.has_attributes() {
                return Ok(out);
            }
            return self.restorer.restore(out, x, positions);
        }

        match info.kind {
            VecType::Null => Err(SliceError::Internal(
                "unexpected `NULL` in `dispatch()`".to_owned(),
            )),
            kind if kind.is_primitive() => {
                trace!(%kind, len = positions.len(), "gathering primitive proxy");
                let mut out = Vector::from(kernel::gather(info.proxy.data(), positions)?);
                if let Some(names) = x.names() {
                    out.set_names(Some(kernel::gather_names(names, positions)))?;
                }
                self.restorer.restore(out, x, positions)
            }
            VecType::Table => {
                let Data::Table(table) = info.proxy.data() else {
                    return Err(SliceError::Internal(format!(
                        "table proxy holds {} storage",
                        info.proxy.vec_type()
                    )));
                };
                let out = Vector::from(self.gather_table(table, positions)?);
                self.restorer.restore(out, x, positions)
            }
            other => Err(SliceError::Internal(format!(
                "unexpected type `{other}` for vector proxy in `slice()`"
            ))),
        }
    }

    /// Slice every column at the same positions, keeping column names.
    fn gather_table(&self, table: &Table, positions: &Positions) -> Result<Table, SliceError> {
        trace!(ncol = table.ncol(), len = positions.len(), "gathering table");
        let columns = table
            .columns()
            .iter()
            .map(|col| self.dispatch(col, self.proxy_of(col).as_ref(), positions))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table::with_nrow(
            table.names().to_vec(),
            columns,
            positions.len(),
        )?)
    }
}

fn size_with(x: &Vector, info: Option<&ProxyInfo<'_>>) -> usize {
    info.map_or_else(|| x.size(), |info| info.proxy.size())
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vs_index::{IndexError, Positions, SignConflict, Subscript};
    use vs_types::{Complex, VecType};
    use vs_vector::{Data, Table, Vector};

    use super::{
        AttributeRestore, BracketExtract, CustomExtractor, ProxyInfo, ProxyProvider, Restorer,
        SliceConfig, SliceError, Slicer,
    };

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    fn table(columns: Vec<(&str, Vector)>) -> Table {
        Table::new(
            columns
                .into_iter()
                .map(|(name, col)| (name.to_owned(), col))
                .collect(),
        )
        .expect("table should build")
    }

    #[test]
    fn null_slices_to_null() {
        let out = Slicer::default()
            .slice(&Vector::null(), &Subscript::from(&[5_i64][..]))
            .expect("slice");
        assert!(out.is_null());
    }

    #[test]
    fn exclusion_end_to_end() {
        let out = Slicer::default()
            .slice(&Vector::ints(&[10, 20, 30]), &Subscript::from(&[-2_i64][..]))
            .expect("slice");
        assert_eq!(out, Vector::ints(&[10, 30]));
    }

    #[test]
    fn full_length_mask_with_missing_end_to_end() {
        let mask = Subscript::Logical(vec![Some(true), Some(false), None]);
        let out = Slicer::default()
            .slice(&Vector::strs(&["a", "b", "c"]), &mask)
            .expect("slice");
        assert_eq!(out, Vector::character(vec![Some("a".to_owned()), None]));
    }

    #[test]
    fn names_follow_elements_and_blank_at_missing() {
        let x = Vector::double(vec![Some(1.0), Some(2.0), Some(3.0)])
            .with_names(names(&["a", "b", "c"]))
            .expect("names");
        let out = Slicer::default()
            .slice(&x, &Subscript::Integer(vec![Some(3), None, Some(1)]))
            .expect("slice");
        assert_eq!(out.data(), &Data::Double(vec![Some(3.0), None, Some(1.0)]));
        assert_eq!(out.names(), Some(&names(&["c", "", "a"])[..]));
    }

    #[test]
    fn identity_slice_round_trips() {
        let x = Vector::complex(vec![Some(Complex::new(1.0, 1.0)), None])
            .with_names(names(&["p", "q"]))
            .expect("names");
        let out = Slicer::default()
            .slice(&x, &Subscript::from(&[1_i64, 2][..]))
            .expect("slice");
        assert_eq!(out, x);
    }

    #[test]
    fn name_subscripts_use_target_names() {
        let x = Vector::ints(&[1, 2, 3])
            .with_names(names(&["a", "b", "a"]))
            .expect("names");
        let out = Slicer::default()
            .slice(&x, &Subscript::from(&["a", "b"][..]))
            .expect("slice");
        assert_eq!(out.data(), Vector::ints(&[1, 2]).data());
        assert_eq!(out.names(), Some(&names(&["a", "b"])[..]));
    }

    #[test]
    fn index_errors_surface_unchanged() {
        let slicer = Slicer::default();
        let x = Vector::ints(&[1, 2, 3]);
        let err = slicer
            .slice(&x, &Subscript::from(&[1_i64, -1][..]))
            .expect_err("must fail");
        assert_eq!(
            err,
            SliceError::Index(IndexError::ConflictingSigns(SignConflict::PositiveIndices))
        );
        let err = slicer
            .slice(&x, &Subscript::from(&["a"][..]))
            .expect_err("must fail");
        assert_eq!(err, SliceError::Index(IndexError::NoNames));
    }

    #[test]
    fn raw_index_vectors_are_accepted() {
        let slicer = Slicer::default();
        let x = Vector::ints(&[10, 20, 30]);
        let out = slicer
            .slice_vector(&x, &Vector::double(vec![Some(3.0)]))
            .expect("slice");
        assert_eq!(out, Vector::ints(&[30]));
        let out = slicer.slice_vector(&x, &Vector::null()).expect("slice");
        assert_eq!(out, Vector::integer(Vec::new()));
        let err = slicer
            .slice_vector(&x, &Vector::complex(vec![None]))
            .expect_err("must fail");
        assert_eq!(
            err,
            SliceError::Index(IndexError::InvalidIndexKind {
                found: VecType::Complex
            })
        );
    }

    #[test]
    fn table_gather_keeps_column_names() {
        let df = Vector::from(table(vec![
            ("c1", Vector::ints(&[10, 20, 30])),
            ("c2", Vector::strs(&["x", "y", "z"])),
        ]));
        let out = Slicer::default()
            .slice(&df, &Subscript::from(&[3_i64, 1][..]))
            .expect("slice");
        let expected = Vector::from(table(vec![
            ("c1", Vector::ints(&[30, 10])),
            ("c2", Vector::strs(&["z", "x"])),
        ]));
        assert_eq!(out, expected);
        assert_eq!(out.size(), 2);
    }

    #[test]
    fn nested_tables_gather_recursively() {
        let inner = Vector::from(table(vec![("n", Vector::raw(vec![1, 2]))]));
        let df = Vector::from(table(vec![("a", Vector::ints(&[1, 2])), ("inner", inner)]))
            .with_class(["data.frame"]);
        let out = Slicer::default()
            .slice(&df, &Subscript::Integer(vec![None, Some(2)]))
            .expect("slice");
        let Data::Table(t) = out.data() else {
            panic!("expected table");
        };
        assert_eq!(t.column("a"), Some(&Vector::integer(vec![None, Some(2)])));
        assert_eq!(
            t.column("inner"),
            Some(&Vector::from(table(vec![("n", Vector::raw(vec![0, 2]))])))
        );
        assert!(out.inherits("data.frame"));
    }

    #[test]
    fn classed_vectors_without_method_use_fallback() {
        let x = Vector::ints(&[1, 2, 3])
            .with_class(["money"])
            .with_attr("currency", Vector::strs(&["EUR"]));
        let out = Slicer::default()
            .slice(&x, &Subscript::from(&[2_i64][..]))
            .expect("slice");
        // The default fallback keeps the class itself, so restore is skipped.
        assert_eq!(out, Vector::ints(&[2]).with_class(["money"]));
    }

    #[test]
    fn registered_classes_gather_natively_and_restore() {
        let config = SliceConfig {
            proxy_classes: ["money".to_owned()].into(),
            ..SliceConfig::default()
        };
        let x = Vector::ints(&[1, 2, 3])
            .with_class(["money"])
            .with_attr("currency", Vector::strs(&["EUR"]));
        let out = Slicer::new(&config)
            .slice(&x, &Subscript::from(&[2_i64][..]))
            .expect("slice");
        assert_eq!(
            out,
            Vector::ints(&[2])
                .with_class(["money"])
                .with_attr("currency", Vector::strs(&["EUR"]))
        );
    }

    #[test]
    fn scalar_objects_cannot_be_sliced() {
        let record = Vector::list(vec![Vector::ints(&[1])]).with_class(["model"]);
        let err = Slicer::default()
            .slice(&record, &Subscript::from(&[1_i64][..]))
            .expect_err("must fail");
        assert!(matches!(err, SliceError::UnsupportedShape(_)));
    }

    #[test]
    fn dimensioned_input_goes_to_fallback() {
        let m = Vector::ints(&[1, 2, 3, 4, 5, 6])
            .with_dim(vec![3, 2])
            .expect("dim");
        let out = Slicer::default()
            .slice(&m, &Subscript::from(&[-1_i64][..]))
            .expect("slice");
        assert_eq!(out.data(), Vector::ints(&[2, 3, 5, 6]).data());
        assert_eq!(out.attributes().dim(), Some(&[2, 2][..]));
    }

    #[test]
    fn chop_slices_each_group() {
        let x = Vector::strs(&["a", "b", "c"]);
        let groups = vec![
            Positions::new(vec![Some(1), Some(3)], 3).expect("positions"),
            Positions::default(),
            Positions::new(vec![Some(2)], 3).expect("positions"),
        ];
        let out = Slicer::default().chop(&x, &groups).expect("chop");
        assert_eq!(
            out,
            vec![
                Vector::strs(&["a", "c"]),
                Vector::character(Vec::new()),
                Vector::strs(&["b"]),
            ]
        );
    }

    #[test]
    fn chop_rejects_positions_beyond_size() {
        let groups = vec![Positions::new(vec![Some(4)], 4).expect("positions")];
        let err = Slicer::default()
            .chop(&Vector::ints(&[1, 2]), &groups)
            .expect_err("must fail");
        assert_eq!(
            err,
            SliceError::Index(IndexError::OutOfRange {
                size: 2,
                position: 4
            })
        );
    }

    #[test]
    fn missing_builds_all_missing_vector_of_same_type() {
        let slicer = Slicer::default();
        let out = slicer
            .missing(&Vector::double(vec![Some(1.0)]), 2)
            .expect("missing");
        assert_eq!(out, Vector::double(vec![None, None]));

        let df = Vector::from(table(vec![
            ("a", Vector::ints(&[1])),
            ("b", Vector::list(vec![Vector::ints(&[1])])),
        ]));
        let out = slicer.missing(&df, 1).expect("missing");
        let expected = Vector::from(table(vec![
            ("a", Vector::integer(vec![None])),
            ("b", Vector::list(vec![Vector::null()])),
        ]));
        assert_eq!(out, expected);
    }

    // A record type whose fields are stored as a table proxy.
    pub(crate) struct RecordProxy;

    impl ProxyProvider for RecordProxy {
        fn proxy_info<'a>(&self, x: &'a Vector) -> ProxyInfo<'a> {
            if !x.inherits("rcrd") {
                return super::ClassProxy::default().proxy_info(x);
            }
            let Data::List(fields) = x.data() else {
                return super::ClassProxy::default().proxy_info(x);
            };
            let columns = ["x", "y"]
                .iter()
                .map(|n| (*n).to_owned())
                .zip(fields.iter().cloned())
                .collect();
            let proxy = Vector::from(Table::new(columns).expect("fields share a size"));
            ProxyInfo {
                kind: VecType::Table,
                proxy: Cow::Owned(proxy),
                has_method: true,
            }
        }
    }

    pub(crate) struct RecordRestore;

    impl Restorer for RecordRestore {
        fn restore(
            &self,
            sliced: Vector,
            original: &Vector,
            positions: &Positions,
        ) -> Result<Vector, SliceError> {
            if !original.inherits("rcrd") {
                return AttributeRestore.restore(sliced, original, positions);
            }
            let Data::Table(t) = sliced.into_data() else {
                return Err(SliceError::Internal("record proxy must be a table".to_owned()));
            };
            Ok(Vector::list(t.columns().to_vec()).with_class(["rcrd"]))
        }
    }

    pub(crate) fn record_slicer() -> Slicer {
        Slicer::with_collaborators(
            Box::new(RecordProxy),
            Box::new(BracketExtract),
            Box::new(RecordRestore),
        )
    }

    pub(crate) fn record(x: &[i64], y: &[&str]) -> Vector {
        Vector::list(vec![Vector::ints(x), Vector::strs(y)]).with_class(["rcrd"])
    }

    #[test]
    fn custom_proxies_route_through_table_gather() {
        let slicer = record_slicer();
        let rec = record(&[1, 2, 3], &["a", "b", "c"]);
        assert_eq!(slicer.size(&rec), 3);
        let out = slicer
            .slice(&rec, &Subscript::from(&[3_i64, 1][..]))
            .expect("slice");
        assert_eq!(
            out,
            Vector::list(vec![Vector::ints(&[3, 1]), Vector::strs(&["c", "a"])])
                .with_class(["rcrd"])
        );
    }

    #[test]
    fn fallback_tables_slice_columns_through_their_proxies() {
        let slicer = record_slicer();
        let tbl = Vector::from(
            Table::with_nrow(
                vec!["id".to_owned(), "rec".to_owned()],
                vec![Vector::ints(&[1, 2, 3]), record(&[7, 8, 9], &["a", "b", "c"])],
                3,
            )
            .expect("table"),
        )
        .with_class(["tbl"]);
        let out = slicer
            .slice(&tbl, &Subscript::from(&[3_i64, 2][..]))
            .expect("slice");
        let Data::Table(t) = out.data() else {
            panic!("expected table");
        };
        assert_eq!(t.column("id"), Some(&Vector::ints(&[3, 2])));
        assert_eq!(t.column("rec"), Some(&record(&[9, 8], &["c", "b"])));
        assert!(out.inherits("tbl"));
    }

    // Counts proxy queries, delegating to the default provider.
    struct CountingProxy(Arc<AtomicUsize>);

    impl ProxyProvider for CountingProxy {
        fn proxy_info<'a>(&self, x: &'a Vector) -> ProxyInfo<'a> {
            self.0.fetch_add(1, Ordering::SeqCst);
            super::ClassProxy::default().proxy_info(x)
        }
    }

    #[test]
    fn proxy_is_queried_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slicer = Slicer::with_collaborators(
            Box::new(CountingProxy(Arc::clone(&calls))),
            Box::new(BracketExtract),
            Box::new(AttributeRestore),
        );
        let x = Vector::ints(&[1, 2, 3]);

        slicer
            .slice(&x, &Subscript::from(&[2_i64][..]))
            .expect("slice");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        slicer
            .slice_positions(&x, &Positions::sequence(3))
            .expect("slice");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let groups = vec![Positions::sequence(1), Positions::default(), Positions::sequence(3)];
        slicer.chop(&x, &groups).expect("chop");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    struct BareFallback;

    impl CustomExtractor for BareFallback {
        fn extract(
            &self,
            _slicer: &Slicer,
            x: &Vector,
            positions: &Positions,
        ) -> Result<Vector, SliceError> {
            Ok(Vector::from(super::kernel::gather(x.data(), positions)?))
        }
    }

    #[test]
    fn bare_fallback_results_are_restored() {
        let slicer = Slicer::with_collaborators(
            Box::new(super::ClassProxy::default()),
            Box::new(BareFallback),
            Box::new(AttributeRestore),
        );
        let x = Vector::ints(&[1, 2])
            .with_class(["money"])
            .with_attr("currency", Vector::strs(&["EUR"]));
        let out = slicer
            .slice(&x, &Subscript::from(&[false, true][..]))
            .expect("slice");
        assert_eq!(
            out,
            Vector::ints(&[2])
                .with_class(["money"])
                .with_attr("currency", Vector::strs(&["EUR"]))
        );
    }

    struct NullProxy;

    impl ProxyProvider for NullProxy {
        fn proxy_info<'a>(&self, x: &'a Vector) -> ProxyInfo<'a> {
            ProxyInfo {
                kind: VecType::Null,
                proxy: Cow::Borrowed(x),
                has_method: true,
            }
        }
    }

    #[test]
    fn impossible_proxy_kinds_are_internal_errors() {
        let slicer = Slicer::with_collaborators(
            Box::new(NullProxy),
            Box::new(BracketExtract),
            Box::new(AttributeRestore),
        );
        let err = slicer
            .slice(&Vector::ints(&[1]), &Subscript::from(&[1_i64][..]))
            .expect_err("must fail");
        assert!(matches!(err, SliceError::Internal(_)));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SliceConfig =
            serde_json::from_str(r#"{"proxy_classes":["money"]}"#).expect("config json");
        assert!(config.proxy_classes.contains("money"));
        assert_eq!(config.table_classes, SliceConfig::default().table_classes);
        assert!(config.list_classes.contains("list"));
    }
}
