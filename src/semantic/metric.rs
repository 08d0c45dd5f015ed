//! Semantic Metric Definition
//!
//! Defines the structure of metrics in a model cluster.

use serde::{Deserialize, Serialize};

/// Aggregation function type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
}

impl Aggregation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Some(Aggregation::Sum),
            "avg" => Some(Aggregation::Avg),
            "count" => Some(Aggregation::Count),
            "count_distinct" => Some(Aggregation::CountDistinct),
            "min" => Some(Aggregation::Min),
            "max" => Some(Aggregation::Max),
            _ => None,
        }
    }

    /// Wrap a column expression in this aggregation
    pub fn apply(&self, expr: &str) -> String {
        match self {
            Aggregation::Sum => format!("SUM({})", expr),
            Aggregation::Avg => format!("AVG({})", expr),
            Aggregation::Count => format!("COUNT({})", expr),
            Aggregation::CountDistinct => format!("COUNT(DISTINCT {})", expr),
            Aggregation::Min => format!("MIN({})", expr),
            Aggregation::Max => format!("MAX({})", expr),
        }
    }
}

/// Metric type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Atomic,
    Derived,
    Ratio,
}

impl MetricType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "atomic" => Some(MetricType::Atomic),
            "derived" => Some(MetricType::Derived),
            "ratio" => Some(MetricType::Ratio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Atomic => "atomic",
            MetricType::Derived => "derived",
            MetricType::Ratio => "ratio",
        }
    }
}

/// Type-specific metric parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricTypeParams {
    /// Aggregation over a physical column expression
    Atomic { aggregation: Aggregation, expr: String },
    /// Expression over other metrics of the same cluster
    Derived { expr: String, metrics: Vec<String> },
    /// numerator / denominator, both metrics of the same cluster
    Ratio { numerator: String, denominator: String },
}

/// Semantic metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Canonical identifier, unique within the cluster; also the physical column name
    pub name: String,
    /// Business display name
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub params: MetricTypeParams,
}

impl Metric {
    /// Atomic metric aggregating its own column
    pub fn atomic(name: &str, display_name: &str, aggregation: Aggregation) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            aliases: Vec::new(),
            owners: Vec::new(),
            description: String::new(),
            params: MetricTypeParams::Atomic {
                aggregation,
                expr: name.to_string(),
            },
        }
    }

    /// Atomic metric aggregating a physical column expression other than its name
    pub fn atomic_with_expr(name: &str, display_name: &str, aggregation: Aggregation, expr: &str) -> Self {
        let mut metric = Self::atomic(name, display_name, aggregation);
        metric.params = MetricTypeParams::Atomic {
            aggregation,
            expr: expr.to_string(),
        };
        metric
    }

    pub fn derived(name: &str, display_name: &str, expr: &str, metrics: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            aliases: Vec::new(),
            owners: Vec::new(),
            description: String::new(),
            params: MetricTypeParams::Derived {
                expr: expr.to_string(),
                metrics: metrics.iter().map(|m| m.to_string()).collect(),
            },
        }
    }

    pub fn ratio(name: &str, display_name: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            aliases: Vec::new(),
            owners: Vec::new(),
            description: String::new(),
            params: MetricTypeParams::Ratio {
                numerator: numerator.to_string(),
                denominator: denominator.to_string(),
            },
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_owners(mut self, owners: Vec<String>) -> Self {
        self.owners = owners;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn metric_type(&self) -> MetricType {
        match self.params {
            MetricTypeParams::Atomic { .. } => MetricType::Atomic,
            MetricTypeParams::Derived { .. } => MetricType::Derived,
            MetricTypeParams::Ratio { .. } => MetricType::Ratio,
        }
    }

    /// Metrics this metric is computed from
    pub fn referenced_metrics(&self) -> Vec<&str> {
        match &self.params {
            MetricTypeParams::Atomic { .. } => Vec::new(),
            MetricTypeParams::Derived { metrics, .. } => metrics.iter().map(|m| m.as_str()).collect(),
            MetricTypeParams::Ratio {
                numerator,
                denominator,
            } => vec![numerator.as_str(), denominator.as_str()],
        }
    }

    /// Every term this metric answers to: canonical name, display name, aliases
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(std::iter::once(self.display_name.as_str()))
            .chain(self.aliases.iter().map(|a| a.as_str()))
            .filter(|t| !t.trim().is_empty())
    }
}
