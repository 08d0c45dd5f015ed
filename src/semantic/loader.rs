//! Semantic Catalog Loader
//!
//! Loads model clusters and entity value domains from JSON configuration files.

use crate::error::{ResolveError, Result};
use crate::linking::value_index::{EntityValueIndex, ValueDomain};
use crate::semantic::catalog::SemanticCatalog;
use crate::semantic::cluster::{DateWindow, ModelCluster, TimeGrain};
use crate::semantic::dimension::{Dimension, ValueType};
use crate::semantic::metric::{Aggregation, Metric, MetricType, MetricTypeParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// JSON representation of a metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricJson {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "default_metric_type")]
    pub metric_type: String, // "atomic", "derived", "ratio"
    /// Atomic only: "sum", "avg", "count", "count_distinct", "min", "max"
    #[serde(default)]
    pub aggregation: Option<String>,
    /// Atomic: column expression (defaults to the metric name). Derived: formula.
    #[serde(default)]
    pub expr: Option<String>,
    /// Derived only
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Ratio only
    #[serde(default)]
    pub numerator: Option<String>,
    #[serde(default)]
    pub denominator: Option<String>,
}

fn default_metric_type() -> String {
    "atomic".to_string()
}

/// JSON representation of a dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionJson {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_value_type")]
    pub value_type: String, // "categorical", "numeric", "time"
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub description: String,
}

fn default_value_type() -> String {
    "categorical".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowJson {
    pub grain: String, // "day", "week", "month", "quarter", "year"
    pub unit: u32,
}

/// JSON representation of a model cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterJson {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub table: String,
    #[serde(default)]
    pub metrics: Vec<MetricJson>,
    #[serde(default)]
    pub dimensions: Vec<DimensionJson>,
    #[serde(default)]
    pub time_dimension: Option<String>,
    #[serde(default)]
    pub default_metric: Option<String>,
    #[serde(default)]
    pub default_window: Option<WindowJson>,
}

/// Catalog JSON structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogJson {
    pub clusters: Vec<ClusterJson>,
    /// Out-of-band value domains for the entity value index
    #[serde(default)]
    pub values: Vec<ValueDomain>,
}

pub fn parse_window(window: &WindowJson) -> Result<DateWindow> {
    let grain = TimeGrain::parse(&window.grain)
        .ok_or_else(|| ResolveError::Catalog(format!("Unknown time grain: {}", window.grain)))?;
    Ok(DateWindow::new(grain, window.unit))
}

fn build_metric(cluster: &str, metric_json: MetricJson) -> Result<Metric> {
    let metric_type = MetricType::parse(&metric_json.metric_type).ok_or_else(|| {
        ResolveError::Catalog(format!(
            "Unknown metric type '{}' for metric '{}'",
            metric_json.metric_type, metric_json.name
        ))
    })?;

    let missing = |field: &str| {
        ResolveError::Catalog(format!(
            "Metric '{}' in model cluster '{}' is missing '{}'",
            metric_json.name, cluster, field
        ))
    };

    let params = match metric_type {
        MetricType::Atomic => {
            let aggregation = match &metric_json.aggregation {
                Some(agg) => Aggregation::parse(agg)
                    .ok_or_else(|| ResolveError::Catalog(format!("Unknown aggregation type: {}", agg)))?,
                None => Aggregation::Sum,
            };
            MetricTypeParams::Atomic {
                aggregation,
                expr: metric_json.expr.clone().unwrap_or_else(|| metric_json.name.clone()),
            }
        }
        MetricType::Derived => {
            if metric_json.metrics.is_empty() {
                return Err(missing("metrics"));
            }
            MetricTypeParams::Derived {
                expr: metric_json.expr.clone().ok_or_else(|| missing("expr"))?,
                metrics: metric_json.metrics.clone(),
            }
        }
        MetricType::Ratio => MetricTypeParams::Ratio {
            numerator: metric_json.numerator.clone().ok_or_else(|| missing("numerator"))?,
            denominator: metric_json.denominator.clone().ok_or_else(|| missing("denominator"))?,
        },
    };

    Ok(Metric {
        name: metric_json.name,
        display_name: metric_json.display_name,
        aliases: metric_json.aliases,
        owners: metric_json.owners,
        description: metric_json.description,
        params,
    })
}

fn build_dimension(dimension_json: DimensionJson) -> Result<Dimension> {
    let value_type = ValueType::parse(&dimension_json.value_type).ok_or_else(|| {
        ResolveError::Catalog(format!("Unknown value type: {}", dimension_json.value_type))
    })?;

    Ok(Dimension {
        name: dimension_json.name,
        display_name: dimension_json.display_name,
        aliases: dimension_json.aliases,
        value_type,
        values: dimension_json.values,
        description: dimension_json.description,
    })
}

fn build_cluster(cluster_json: ClusterJson) -> Result<ModelCluster> {
    let name = cluster_json.name;
    let metrics = cluster_json
        .metrics
        .into_iter()
        .map(|m| build_metric(&name, m))
        .collect::<Result<Vec<_>>>()?;
    let dimensions = cluster_json
        .dimensions
        .into_iter()
        .map(build_dimension)
        .collect::<Result<Vec<_>>>()?;
    let default_window = cluster_json.default_window.as_ref().map(parse_window).transpose()?;

    Ok(ModelCluster {
        name,
        display_name: cluster_json.display_name,
        table: cluster_json.table,
        metrics,
        dimensions,
        time_dimension: cluster_json.time_dimension,
        default_metric: cluster_json.default_metric,
        default_window,
    })
}

/// Load a catalog and its entity value index from JSON
pub fn load_from_json(json_str: &str) -> Result<(SemanticCatalog, EntityValueIndex)> {
    let catalog_json: CatalogJson = serde_json::from_str(json_str)
        .map_err(|e| ResolveError::Catalog(format!("Failed to parse catalog JSON: {}", e)))?;

    let clusters = catalog_json
        .clusters
        .into_iter()
        .map(build_cluster)
        .collect::<Result<Vec<_>>>()?;
    let catalog = SemanticCatalog::new(clusters)?;
    let index = EntityValueIndex::build(&catalog, &catalog_json.values)?;

    Ok((catalog, index))
}

/// Load a catalog from file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<(SemanticCatalog, EntityValueIndex)> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ResolveError::Catalog(format!("Failed to read catalog file {}: {}", path.display(), e))
    })?;
    load_from_json(&contents)
}
