//! Semantic Catalog
//!
//! Read-only index of model clusters with business-name and alias lookup.
//! Every lookup is scoped to one cluster and matches case-insensitively on
//! the canonical name, the display name or any registered alias.

use crate::error::{ResolveError, Result};
use crate::semantic::cluster::ModelCluster;
use crate::semantic::dimension::Dimension;
use crate::semantic::metric::{Metric, MetricTypeParams};
use crate::sql_binder::walker::{expression_identifiers, parse_expression};
use std::collections::{HashMap, HashSet};

/// A catalog entry: either a metric or a dimension
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SemanticItem<'a> {
    Metric(&'a Metric),
    Dimension(&'a Dimension),
}

impl<'a> SemanticItem<'a> {
    /// Canonical identifier of the item
    pub fn name(&self) -> &'a str {
        match self {
            SemanticItem::Metric(m) => &m.name,
            SemanticItem::Dimension(d) => &d.name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemRef {
    Metric(usize),
    Dimension(usize),
}

#[derive(Debug)]
struct ClusterIndex {
    cluster: ModelCluster,
    terms: HashMap<String, ItemRef>,
    /// Physical columns read by atomic metrics and dimensions
    columns: HashMap<String, ItemRef>,
}

/// Lookup key for a business term
pub(crate) fn term_key(term: &str) -> String {
    term.trim().to_lowercase()
}

impl ClusterIndex {
    fn build(cluster: ModelCluster) -> Result<Self> {
        let mut terms: HashMap<String, ItemRef> = HashMap::new();
        let mut owners: HashMap<String, String> = HashMap::new();

        let mut seen_metrics = HashSet::new();
        for (idx, metric) in cluster.metrics.iter().enumerate() {
            if !seen_metrics.insert(metric.name.as_str()) {
                return Err(ResolveError::Catalog(format!(
                    "Duplicate metric '{}' in model cluster '{}'",
                    metric.name, cluster.name
                )));
            }
            let owner = format!("metric '{}'", metric.name);
            for term in metric.terms() {
                register_term(&cluster.name, &mut terms, &mut owners, term, &owner, ItemRef::Metric(idx))?;
            }
        }

        let mut seen_dimensions = HashSet::new();
        for (idx, dimension) in cluster.dimensions.iter().enumerate() {
            if !seen_dimensions.insert(dimension.name.as_str()) {
                return Err(ResolveError::Catalog(format!(
                    "Duplicate dimension '{}' in model cluster '{}'",
                    dimension.name, cluster.name
                )));
            }
            let owner = format!("dimension '{}'", dimension.name);
            for term in dimension.terms() {
                register_term(&cluster.name, &mut terms, &mut owners, term, &owner, ItemRef::Dimension(idx))?;
            }
        }

        let columns = physical_columns(&cluster, &terms)?;
        let index = Self {
            cluster,
            terms,
            columns,
        };
        index.validate_defaults()?;
        Ok(index)
    }

    fn validate_defaults(&self) -> Result<()> {
        let cluster = &self.cluster;

        if let Some(time_dimension) = &cluster.time_dimension {
            match self.lookup(time_dimension) {
                Some(SemanticItem::Dimension(d)) if d.is_time() => {}
                _ => {
                    return Err(ResolveError::Catalog(format!(
                        "Time dimension '{}' of model cluster '{}' is not a time-typed dimension",
                        time_dimension, cluster.name
                    )))
                }
            }
        }

        if let Some(default_metric) = &cluster.default_metric {
            if !matches!(self.lookup(default_metric), Some(SemanticItem::Metric(_))) {
                return Err(ResolveError::Catalog(format!(
                    "Default metric '{}' of model cluster '{}' does not exist",
                    default_metric, cluster.name
                )));
            }
        }

        if let Some(window) = &cluster.default_window {
            if window.unit == 0 {
                return Err(ResolveError::Catalog(format!(
                    "Default window of model cluster '{}' must cover at least one {}",
                    cluster.name,
                    window.grain.as_str()
                )));
            }
            if cluster.time_dimension.is_none() {
                return Err(ResolveError::Catalog(format!(
                    "Model cluster '{}' has a default window but no time dimension",
                    cluster.name
                )));
            }
        }

        Ok(())
    }

    fn lookup(&self, term: &str) -> Option<SemanticItem<'_>> {
        self.item(*self.terms.get(&term_key(term))?)
    }

    fn lookup_column(&self, column: &str) -> Option<SemanticItem<'_>> {
        self.item(*self.columns.get(&term_key(column))?)
    }

    fn item(&self, item: ItemRef) -> Option<SemanticItem<'_>> {
        match item {
            ItemRef::Metric(idx) => self.cluster.metrics.get(idx).map(SemanticItem::Metric),
            ItemRef::Dimension(idx) => self.cluster.dimensions.get(idx).map(SemanticItem::Dimension),
        }
    }
}

/// Map every physical column of a cluster to the item that reads it
///
/// Atomic metric expressions and derived formulas must parse. A column may
/// not also be a business term of a different item, and the first item
/// reading a shared column owns it.
fn physical_columns(
    cluster: &ModelCluster,
    terms: &HashMap<String, ItemRef>,
) -> Result<HashMap<String, ItemRef>> {
    let invalid = |metric: &str, expr: &str, e: String| {
        ResolveError::Catalog(format!(
            "Metric '{}' in model cluster '{}' has invalid expression '{}': {}",
            metric, cluster.name, expr, e
        ))
    };

    let mut read: Vec<(String, ItemRef)> = Vec::new();
    for (idx, metric) in cluster.metrics.iter().enumerate() {
        match &metric.params {
            MetricTypeParams::Atomic { expr, .. } => {
                let mut parsed =
                    parse_expression(expr).map_err(|e| invalid(&metric.name, expr, e.to_string()))?;
                let names =
                    expression_identifiers(&mut parsed).map_err(|e| invalid(&metric.name, expr, e.to_string()))?;
                read.extend(names.into_iter().map(|name| (name, ItemRef::Metric(idx))));
            }
            MetricTypeParams::Derived { expr, .. } => {
                parse_expression(expr).map_err(|e| invalid(&metric.name, expr, e.to_string()))?;
            }
            MetricTypeParams::Ratio { .. } => {}
        }
    }
    for (idx, dimension) in cluster.dimensions.iter().enumerate() {
        read.push((dimension.name.clone(), ItemRef::Dimension(idx)));
    }

    let mut columns = HashMap::new();
    for (column, item) in read {
        let key = term_key(&column);
        if let Some(term_owner) = terms.get(&key) {
            if *term_owner != item {
                return Err(ResolveError::Catalog(format!(
                    "Column '{}' in model cluster '{}' is also the business term of another item",
                    column, cluster.name
                )));
            }
        }
        columns.entry(key).or_insert(item);
    }
    Ok(columns)
}

fn register_term(
    cluster: &str,
    terms: &mut HashMap<String, ItemRef>,
    owners: &mut HashMap<String, String>,
    term: &str,
    owner: &str,
    item: ItemRef,
) -> Result<()> {
    let key = term_key(term);
    if let Some(existing) = owners.get(&key) {
        if existing != owner {
            return Err(ResolveError::Catalog(format!(
                "Term '{}' in model cluster '{}' names both {} and {}",
                term, cluster, existing, owner
            )));
        }
        return Ok(());
    }
    owners.insert(key.clone(), owner.to_string());
    terms.insert(key, item);
    Ok(())
}

/// In-memory semantic catalog
#[derive(Debug)]
pub struct SemanticCatalog {
    clusters: Vec<ClusterIndex>,
    by_name: HashMap<String, usize>,
}

impl SemanticCatalog {
    /// Build and validate a catalog; cluster order is preserved
    pub fn new(clusters: Vec<ModelCluster>) -> Result<Self> {
        let mut indexes = Vec::with_capacity(clusters.len());
        let mut by_name = HashMap::new();

        for cluster in clusters {
            let key = term_key(&cluster.name);
            if by_name.contains_key(&key) {
                return Err(ResolveError::Catalog(format!(
                    "Duplicate model cluster '{}'",
                    cluster.name
                )));
            }
            by_name.insert(key, indexes.len());
            indexes.push(ClusterIndex::build(cluster)?);
        }

        Ok(Self {
            clusters: indexes,
            by_name,
        })
    }

    pub fn empty() -> Self {
        Self {
            clusters: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    fn index(&self, cluster: &str) -> Option<&ClusterIndex> {
        self.by_name
            .get(&term_key(cluster))
            .and_then(|idx| self.clusters.get(*idx))
    }

    pub fn cluster(&self, name: &str) -> Option<&ModelCluster> {
        self.index(name).map(|i| &i.cluster)
    }

    /// Clusters in insertion order
    pub fn clusters(&self) -> impl Iterator<Item = &ModelCluster> {
        self.clusters.iter().map(|i| &i.cluster)
    }

    pub fn lookup(&self, cluster: &str, term: &str) -> Option<SemanticItem<'_>> {
        self.index(cluster)?.lookup(term)
    }

    /// Item reading a physical column; dimensions are their own column
    pub fn lookup_column(&self, cluster: &str, column: &str) -> Option<SemanticItem<'_>> {
        self.index(cluster)?.lookup_column(column)
    }

    pub fn lookup_metric(&self, cluster: &str, term: &str) -> Option<&Metric> {
        match self.lookup(cluster, term)? {
            SemanticItem::Metric(m) => Some(m),
            SemanticItem::Dimension(_) => None,
        }
    }

    pub fn lookup_dimension(&self, cluster: &str, term: &str) -> Option<&Dimension> {
        match self.lookup(cluster, term)? {
            SemanticItem::Dimension(d) => Some(d),
            SemanticItem::Metric(_) => None,
        }
    }

    /// Metrics of a cluster in insertion order; empty for unknown clusters
    pub fn list_metrics(&self, cluster: &str) -> &[Metric] {
        self.cluster(cluster).map(|c| c.metrics.as_slice()).unwrap_or(&[])
    }

    /// Dimensions of a cluster in insertion order; empty for unknown clusters
    pub fn list_dimensions(&self, cluster: &str) -> &[Dimension] {
        self.cluster(cluster).map(|c| c.dimensions.as_slice()).unwrap_or(&[])
    }

    pub fn metric_count(&self) -> usize {
        self.clusters.iter().map(|i| i.cluster.metrics.len()).sum()
    }

    pub fn dimension_count(&self) -> usize {
        self.clusters.iter().map(|i| i.cluster.dimensions.len()).sum()
    }
}
