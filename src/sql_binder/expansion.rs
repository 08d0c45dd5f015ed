//! Metric expansion
//!
//! Turns a metric into the physical SQL it stands for. Atomic metrics become
//! their column expression. Derived and ratio metrics become an expression
//! over the aggregated forms of their sub-metrics, expanded recursively.

use crate::error::{ResolveError, Result};
use crate::semantic::catalog::SemanticCatalog;
use crate::semantic::metric::{Metric, MetricTypeParams};
use crate::sql_binder::derivation::check_derivation;
use crate::sql_binder::draft::identifier_name;
use crate::sql_binder::walker::{parse_expression, walk_expr};
use sqlparser::ast::Expr;
use std::collections::BTreeSet;

/// Physical expression of one metric
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub expr: Expr,
    /// Atomic metrics whose columns `expr` reads
    pub atomic: BTreeSet<String>,
}

pub struct MetricExpander<'a> {
    catalog: &'a SemanticCatalog,
    cluster: &'a str,
}

impl<'a> MetricExpander<'a> {
    pub fn new(catalog: &'a SemanticCatalog, cluster: &'a str) -> Self {
        Self { catalog, cluster }
    }

    /// Expression standing in for a draft reference to `metric`
    ///
    /// An atomic metric stays unaggregated; the draft aggregates it.
    pub fn expand(&self, metric: &Metric) -> Result<Expansion> {
        check_derivation(self.catalog, self.cluster, &metric.name)?;
        let mut atomic = BTreeSet::new();
        let expr = self.physical(metric, &mut atomic)?;
        Ok(Expansion { expr, atomic })
    }

    /// Aggregated expression of `metric`, as injected for a default metric
    pub fn expand_aggregated(&self, metric: &Metric) -> Result<Expansion> {
        check_derivation(self.catalog, self.cluster, &metric.name)?;
        let mut atomic = BTreeSet::new();
        let expr = self.aggregated(metric, &mut atomic)?;
        Ok(Expansion { expr, atomic })
    }

    fn physical(&self, metric: &Metric, atomic: &mut BTreeSet<String>) -> Result<Expr> {
        match &metric.params {
            MetricTypeParams::Atomic { expr, .. } => {
                atomic.insert(metric.name.clone());
                Ok(grouped(self.parse(metric, expr)?))
            }
            MetricTypeParams::Derived { expr, metrics } => {
                let declared: Vec<&str> = metrics
                    .iter()
                    .filter_map(|m| self.catalog.lookup_metric(self.cluster, m))
                    .map(|m| m.name.as_str())
                    .collect();
                let mut formula = self.parse(metric, expr)?;
                walk_expr(&mut formula, &mut |node: &mut Expr| {
                    let name = match identifier_name(node) {
                        Some(name) => name.to_string(),
                        None => return Ok(()),
                    };
                    let sub = self
                        .catalog
                        .lookup_metric(self.cluster, &name)
                        .filter(|sub| declared.contains(&sub.name.as_str()))
                        .ok_or_else(|| ResolveError::InvalidMetricDerivation {
                            metric: metric.name.clone(),
                            reason: format!("formula reads '{}', which is not one of its metrics", name),
                        })?;
                    *node = self.aggregated(sub, atomic)?;
                    Ok(())
                })
                .map_err(|e| match e {
                    ResolveError::MalformedDraftSql(reason) => ResolveError::InvalidMetricDerivation {
                        metric: metric.name.clone(),
                        reason,
                    },
                    other => other,
                })?;
                Ok(Expr::Nested(Box::new(formula)))
            }
            MetricTypeParams::Ratio {
                numerator,
                denominator,
            } => {
                let numerator = self.aggregated(self.sub_metric(metric, numerator)?, atomic)?;
                let denominator = self.aggregated(self.sub_metric(metric, denominator)?, atomic)?;
                let ratio = format!("{} / NULLIF({}, 0)", numerator, denominator);
                Ok(Expr::Nested(Box::new(self.parse(metric, &ratio)?)))
            }
        }
    }

    fn aggregated(&self, metric: &Metric, atomic: &mut BTreeSet<String>) -> Result<Expr> {
        match &metric.params {
            MetricTypeParams::Atomic { aggregation, expr } => {
                atomic.insert(metric.name.clone());
                self.parse(metric, &aggregation.apply(expr))
            }
            MetricTypeParams::Derived { .. } | MetricTypeParams::Ratio { .. } => {
                self.physical(metric, atomic)
            }
        }
    }

    fn sub_metric(&self, metric: &Metric, term: &str) -> Result<&'a Metric> {
        self.catalog
            .lookup_metric(self.cluster, term)
            .ok_or_else(|| ResolveError::InvalidMetricDerivation {
                metric: metric.name.clone(),
                reason: format!("'{}' references unknown metric '{}'", metric.name, term),
            })
    }

    fn parse(&self, metric: &Metric, text: &str) -> Result<Expr> {
        parse_expression(text).map_err(|e| ResolveError::InvalidMetricDerivation {
            metric: metric.name.clone(),
            reason: format!("invalid expression '{}': {}", text, e),
        })
    }
}

/// Parenthesize compound expressions so they keep their meaning when spliced
fn grouped(expr: Expr) -> Expr {
    match expr {
        Expr::Identifier(_)
        | Expr::CompoundIdentifier(_)
        | Expr::Function(_)
        | Expr::Value(_)
        | Expr::Nested(_) => expr,
        other => Expr::Nested(Box::new(other)),
    }
}
