//! SQL Binder
//!
//! Binds a parsed draft to one model cluster: every business name becomes
//! its canonical column, filter literals are replaced by linked entity
//! values, and missing metric / time window defaults are completed.

use crate::config::{DefaultPrecedence, ResolverConfig};
use crate::error::{ResolveError, Result};
use crate::fuzzy_matcher::normalize_string;
use crate::linking::linker::ElementValue;
use crate::semantic::catalog::{SemanticCatalog, SemanticItem};
use crate::semantic::cluster::{DateWindow, ModelCluster, TimeGrain};
use crate::semantic::dimension::Dimension;
use crate::sql_binder::draft::{alias_reference, identifier_name, select_mut, DraftSql};
use crate::sql_binder::expansion::MetricExpander;
use crate::sql_binder::walker::{walk_statement, Clause};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, Ident, ObjectName, SelectItem, Statement, TableFactor, Value,
};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Where a completed default came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSource {
    Request,
    Cluster,
}

/// A default the binder injected into the draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultSubstitution {
    Metric {
        metric: String,
        expression: String,
        source: DefaultSource,
    },
    TimeWindow {
        dimension: String,
        grain: TimeGrain,
        unit: u32,
        start: NaiveDate,
        end: NaiveDate,
        source: DefaultSource,
    },
}

/// A filter literal replaced by a linked entity value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSubstitution {
    pub dimension: String,
    pub original: String,
    pub value: String,
    pub confidence: f64,
}

/// Validated SQL over canonical names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundQuery {
    pub cluster: String,
    pub sql: String,
    /// Atomic metrics whose columns `sql` reads, sorted
    ///
    /// Derived and ratio metrics are reported through the atomic metrics
    /// they expand to.
    pub metrics: Vec<String>,
    /// Canonical dimension names referenced by `sql`, sorted
    pub dimensions: Vec<String>,
    pub defaults: Vec<DefaultSubstitution>,
    pub substitutions: Vec<ValueSubstitution>,
}

impl BoundQuery {
    pub fn used_defaults(&self) -> bool {
        !self.defaults.is_empty()
    }
}

/// Everything one bind call reads
#[derive(Debug, Clone, Copy)]
pub struct BindContext<'a> {
    pub catalog: &'a SemanticCatalog,
    pub cluster: &'a ModelCluster,
    pub linked: &'a [ElementValue],
    /// Reference date for default windows
    pub current_date: NaiveDate,
    /// Request-level default metric override
    pub default_metric: Option<&'a str>,
    /// Request-level default window override
    pub default_window: Option<DateWindow>,
}

#[derive(Debug, Default)]
struct BindState {
    metrics: BTreeSet<String>,
    dimensions: BTreeSet<String>,
    substitutions: Vec<ValueSubstitution>,
    /// WHERE already filters on a time dimension
    time_filtered: bool,
}

impl BindState {
    fn visit(
        &mut self,
        ctx: &BindContext<'_>,
        aliases: &HashSet<String>,
        clause: Clause,
        expr: &mut Expr,
    ) -> Result<()> {
        if identifier_name(expr).is_some() {
            return self.resolve_identifier(ctx, aliases, clause, expr);
        }

        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq | BinaryOperator::NotEq,
                right,
            } => {
                if let Some(dimension) = dimension_of(ctx, left) {
                    if let Expr::Value(Value::SingleQuotedString(literal)) = right.as_mut() {
                        self.substitute(ctx, dimension, literal);
                    }
                } else if let Some(dimension) = dimension_of(ctx, right) {
                    if let Expr::Value(Value::SingleQuotedString(literal)) = left.as_mut() {
                        self.substitute(ctx, dimension, literal);
                    }
                }
            }
            Expr::InList { expr: target, list, .. } => {
                if let Some(dimension) = dimension_of(ctx, target) {
                    for item in list.iter_mut() {
                        if let Expr::Value(Value::SingleQuotedString(literal)) = item {
                            self.substitute(ctx, dimension, literal);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn resolve_identifier(
        &mut self,
        ctx: &BindContext<'_>,
        aliases: &HashSet<String>,
        clause: Clause,
        expr: &mut Expr,
    ) -> Result<()> {
        let name = match identifier_name(expr) {
            Some(name) => name.to_string(),
            None => return Ok(()),
        };
        if alias_reference(aliases, clause, expr) {
            return Ok(());
        }

        // A physical column wins over a business term of the same item
        let cluster = &ctx.cluster.name;
        let item = match ctx.catalog.lookup_column(cluster, &name) {
            Some(item) => Some((item, true)),
            None => ctx.catalog.lookup(cluster, &name).map(|item| (item, false)),
        };

        *expr = match item {
            Some((SemanticItem::Dimension(dimension), _)) => {
                if clause == Clause::Where && dimension.is_time() {
                    self.time_filtered = true;
                }
                self.dimensions.insert(dimension.name.clone());
                Expr::Identifier(Ident::new(dimension.name.clone()))
            }
            Some((SemanticItem::Metric(metric), true)) => {
                self.metrics.insert(metric.name.clone());
                Expr::Identifier(Ident::new(name))
            }
            Some((SemanticItem::Metric(metric), false)) => {
                let expansion = MetricExpander::new(ctx.catalog, cluster).expand(metric)?;
                debug!(metric = %metric.name, expression = %expansion.expr, "expanded metric");
                self.metrics.extend(expansion.atomic);
                expansion.expr
            }
            None => {
                return Err(ResolveError::UnresolvedIdentifier {
                    identifier: name,
                    cluster: cluster.clone(),
                })
            }
        };
        Ok(())
    }

    /// Replace `literal` with the best linked value of `dimension` it names
    ///
    /// Higher confidence wins; the earlier linked value wins a tie.
    fn substitute(&mut self, ctx: &BindContext<'_>, dimension: &Dimension, literal: &mut String) {
        let wanted = normalize_string(literal);
        if wanted.is_empty() {
            return;
        }

        let mut best: Option<&ElementValue> = None;
        for linked in ctx.linked.iter().filter(|v| v.dimension == dimension.name) {
            if normalize_string(&linked.text) != wanted && normalize_string(&linked.value) != wanted {
                continue;
            }
            if best.map_or(true, |b| linked.confidence > b.confidence) {
                best = Some(linked);
            }
        }

        if let Some(linked) = best {
            if linked.value != *literal {
                debug!(
                    dimension = %dimension.name,
                    original = %literal,
                    value = %linked.value,
                    "substituted linked value"
                );
                self.substitutions.push(ValueSubstitution {
                    dimension: dimension.name.clone(),
                    original: literal.clone(),
                    value: linked.value.clone(),
                    confidence: linked.confidence,
                });
                *literal = linked.value.clone();
            }
        }
    }
}

fn dimension_of<'a>(ctx: &BindContext<'a>, expr: &Expr) -> Option<&'a Dimension> {
    let name = identifier_name(expr)?;
    ctx.catalog.lookup_dimension(&ctx.cluster.name, name)
}

fn quoted_date(column: &str, op: BinaryOperator, date: NaiveDate) -> Expr {
    Expr::BinaryOp {
        left: Box::new(Expr::Identifier(Ident::new(column))),
        op,
        right: Box::new(Expr::Value(Value::SingleQuotedString(
            date.format("%Y-%m-%d").to_string(),
        ))),
    }
}

/// `column >= 'start' AND column <= 'end'`
fn window_predicate(column: &str, start: NaiveDate, end: NaiveDate) -> Expr {
    Expr::BinaryOp {
        left: Box::new(quoted_date(column, BinaryOperator::GtEq, start)),
        op: BinaryOperator::And,
        right: Box::new(quoted_date(column, BinaryOperator::LtEq, end)),
    }
}

/// Draft-to-SQL binder
#[derive(Debug, Clone)]
pub struct SqlBinder {
    precedence: DefaultPrecedence,
    inject_default_metric: bool,
    inject_default_window: bool,
}

impl Default for SqlBinder {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl SqlBinder {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            precedence: config.default_precedence,
            inject_default_metric: config.inject_default_metric,
            inject_default_window: config.inject_default_window,
        }
    }

    /// Bind a draft against the context's cluster
    ///
    /// Fails without producing SQL if any identifier is unresolved, any
    /// referenced metric has a broken derivation or a default window falls
    /// outside the calendar.
    pub fn bind(&self, draft: &DraftSql, ctx: &BindContext<'_>) -> Result<BoundQuery> {
        let cluster = ctx.cluster;
        let mut statement = draft.statement.clone();
        let mut state = BindState::default();
        let mut defaults = Vec::new();

        rewrite_table(&mut statement, &cluster.table)?;
        walk_statement(&mut statement, &mut |clause, expr| {
            state.visit(ctx, &draft.aliases, clause, expr)
        })?;
        debug!(
            cluster = %cluster.name,
            metrics = ?state.metrics,
            dimensions = ?state.dimensions,
            substitutions = state.substitutions.len(),
            "resolved draft identifiers"
        );

        if state.metrics.is_empty() && self.inject_default_metric {
            let request = ctx.default_metric.map(|m| (m, DefaultSource::Request));
            let from_cluster = cluster.default_metric.as_deref().map(|m| (m, DefaultSource::Cluster));
            if let Some((name, source)) = self.precedence.choose(request, from_cluster) {
                let metric = ctx.catalog.lookup_metric(&cluster.name, name).ok_or_else(|| {
                    ResolveError::UnresolvedIdentifier {
                        identifier: name.to_string(),
                        cluster: cluster.name.clone(),
                    }
                })?;
                let expansion = MetricExpander::new(ctx.catalog, &cluster.name).expand_aggregated(metric)?;
                let expression = expansion.expr.to_string();
                inject_metric(&mut statement, ctx, expansion.expr)?;
                debug!(metric = %metric.name, %expression, "injected default metric");
                state.metrics.extend(expansion.atomic);
                defaults.push(DefaultSubstitution::Metric {
                    metric: metric.name.clone(),
                    expression,
                    source,
                });
            }
        }

        if state.metrics.is_empty() && state.dimensions.is_empty() {
            return Err(ResolveError::EmptyResolution(cluster.name.clone()));
        }

        if !state.time_filtered && self.inject_default_window {
            let request = ctx.default_window.map(|w| (w, DefaultSource::Request));
            let from_cluster = cluster.default_window.map(|w| (w, DefaultSource::Cluster));
            let window = self.precedence.choose(request, from_cluster);
            match (window, cluster.time_dimension.as_deref()) {
                (Some((window, source)), Some(time_dimension)) => {
                    let dimension = ctx
                        .catalog
                        .lookup_dimension(&cluster.name, time_dimension)
                        .ok_or_else(|| ResolveError::UnresolvedIdentifier {
                            identifier: time_dimension.to_string(),
                            cluster: cluster.name.clone(),
                        })?;
                    let (start, end) = window.range(ctx.current_date).ok_or_else(|| {
                        ResolveError::InvalidTimeWindow(format!(
                            "{} {}(s) before {} is out of the calendar range",
                            window.unit,
                            window.grain.as_str(),
                            ctx.current_date
                        ))
                    })?;
                    inject_window(&mut statement, window_predicate(&dimension.name, start, end))?;
                    debug!(dimension = %dimension.name, %start, %end, "injected default window");
                    state.dimensions.insert(dimension.name.clone());
                    defaults.push(DefaultSubstitution::TimeWindow {
                        dimension: dimension.name.clone(),
                        grain: window.grain,
                        unit: window.unit,
                        start,
                        end,
                        source,
                    });
                }
                (Some(_), None) => {
                    debug!(cluster = %cluster.name, "default window skipped, cluster has no time dimension");
                }
                (None, _) => {}
            }
        }

        Ok(BoundQuery {
            cluster: cluster.name.clone(),
            sql: statement.to_string(),
            metrics: state.metrics.into_iter().collect(),
            dimensions: state.dimensions.into_iter().collect(),
            defaults,
            substitutions: state.substitutions,
        })
    }
}

fn rewrite_table(statement: &mut Statement, table: &str) -> Result<()> {
    let select = select_mut(statement)?;
    match select.from.first_mut().map(|from| &mut from.relation) {
        Some(TableFactor::Table { name, .. }) => {
            *name = ObjectName(table.split('.').map(Ident::new).collect());
            Ok(())
        }
        _ => Err(ResolveError::MalformedDraftSql("FROM must name a table".to_string())),
    }
}

/// Add a metric expression to the projection
///
/// Bare `*` items are dropped. An empty GROUP BY is filled with the
/// projection's bare dimension columns so the aggregate stays valid.
fn inject_metric(statement: &mut Statement, ctx: &BindContext<'_>, metric: Expr) -> Result<()> {
    let select = select_mut(statement)?;
    select
        .projection
        .retain(|item| !matches!(item, SelectItem::Wildcard(_)));

    let grouping: Vec<Expr> = select
        .projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => Some(expr),
            _ => None,
        })
        .filter(|expr| matches!(expr, Expr::Identifier(_)) && dimension_of(ctx, expr).is_some())
        .cloned()
        .collect();
    select.projection.push(SelectItem::UnnamedExpr(metric));

    if let GroupByExpr::Expressions(exprs) = &mut select.group_by {
        if exprs.is_empty() {
            *exprs = grouping;
        }
    }
    Ok(())
}

/// AND a predicate onto the WHERE clause
fn inject_window(statement: &mut Statement, predicate: Expr) -> Result<()> {
    let select = select_mut(statement)?;
    select.selection = Some(match select.selection.take() {
        None => predicate,
        Some(existing) => {
            let existing = match existing {
                Expr::BinaryOp {
                    op: BinaryOperator::Or,
                    ..
                } => Expr::Nested(Box::new(existing)),
                other => other,
            };
            Expr::BinaryOp {
                left: Box::new(existing),
                op: BinaryOperator::And,
                right: Box::new(predicate),
            }
        }
    });
    Ok(())
}
