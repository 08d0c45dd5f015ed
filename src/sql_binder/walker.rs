//! Expression walker over the draft statement
//!
//! Visits every expression of the supported draft shape in post-order, so a
//! visitor sees rewritten children before their parent. Expression forms
//! outside the supported subset are rejected as malformed.

use crate::error::{ResolveError, Result};
use crate::sql_binder::draft::identifier_name;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{Expr, FunctionArg, FunctionArgExpr, GroupByExpr, Query, SelectItem, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::Token;

/// Clause an expression belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    Select,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

/// Walk one expression tree, children first
pub fn walk_expr<F>(expr: &mut Expr, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut Expr) -> Result<()>,
{
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) | Expr::Value(_) | Expr::TypedString { .. } => {}
        Expr::BinaryOp { left, right, .. } => {
            walk_expr(left, visit)?;
            walk_expr(right, visit)?;
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::Cast { expr: inner, .. } => walk_expr(inner, visit)?,
        Expr::InList { expr: inner, list, .. } => {
            walk_expr(inner, visit)?;
            for item in list.iter_mut() {
                walk_expr(item, visit)?;
            }
        }
        Expr::Between { expr: inner, low, high, .. } => {
            walk_expr(inner, visit)?;
            walk_expr(low, visit)?;
            walk_expr(high, visit)?;
        }
        Expr::Like { expr: inner, pattern, .. } | Expr::ILike { expr: inner, pattern, .. } => {
            walk_expr(inner, visit)?;
            walk_expr(pattern, visit)?;
        }
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            if let Some(operand) = operand {
                walk_expr(operand, visit)?;
            }
            for condition in conditions.iter_mut() {
                walk_expr(condition, visit)?;
            }
            for result in results.iter_mut() {
                walk_expr(result, visit)?;
            }
            if let Some(else_result) = else_result {
                walk_expr(else_result, visit)?;
            }
        }
        Expr::Function(func) => {
            if func.over.is_some() {
                return Err(ResolveError::MalformedDraftSql(format!(
                    "window function {} is not supported",
                    func.name
                )));
            }
            for arg in func.args.iter_mut() {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(inner))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(inner),
                        ..
                    } => walk_expr(inner, visit)?,
                    _ => {}
                }
            }
        }
        other => {
            return Err(ResolveError::MalformedDraftSql(format!(
                "unsupported expression: {}",
                other
            )))
        }
    }
    visit(expr)
}

/// Parse a standalone SQL expression such as a metric formula
pub(crate) fn parse_expression(text: &str) -> std::result::Result<Expr, ParserError> {
    let dialect = GenericDialect {};
    let mut parser = Parser::new(&dialect).try_with_sql(text)?;
    let expr = parser.parse_expr()?;
    parser.expect_token(&Token::EOF)?;
    Ok(expr)
}

/// Unqualified identifiers of an expression, in walk order
pub(crate) fn expression_identifiers(expr: &mut Expr) -> Result<Vec<String>> {
    let mut names = Vec::new();
    walk_expr(expr, &mut |e: &mut Expr| {
        if let Some(name) = identifier_name(e) {
            names.push(name.to_string());
        }
        Ok(())
    })?;
    Ok(names)
}

/// Walk every expression of a single-SELECT statement, tagged with its clause
///
/// The statement must already have passed draft shape validation.
pub fn walk_statement<F>(statement: &mut Statement, visit: &mut F) -> Result<()>
where
    F: FnMut(Clause, &mut Expr) -> Result<()>,
{
    let query: &mut Query = match statement {
        Statement::Query(query) => query,
        _ => return Err(ResolveError::MalformedDraftSql("expected a SELECT query".to_string())),
    };
    let Query { body, order_by, .. } = query;
    let select = match body.as_mut() {
        SetExpr::Select(select) => select,
        _ => return Err(ResolveError::MalformedDraftSql("expected a single SELECT".to_string())),
    };

    for item in select.projection.iter_mut() {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                walk_expr(expr, &mut |e: &mut Expr| visit(Clause::Select, e))?;
            }
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {}
        }
    }
    if let Some(selection) = select.selection.as_mut() {
        walk_expr(selection, &mut |e: &mut Expr| visit(Clause::Where, e))?;
    }
    if let GroupByExpr::Expressions(exprs) = &mut select.group_by {
        for expr in exprs.iter_mut() {
            walk_expr(expr, &mut |e: &mut Expr| visit(Clause::GroupBy, e))?;
        }
    }
    if let Some(having) = select.having.as_mut() {
        walk_expr(having, &mut |e: &mut Expr| visit(Clause::Having, e))?;
    }
    for order in order_by.iter_mut() {
        walk_expr(&mut order.expr, &mut |e: &mut Expr| visit(Clause::OrderBy, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn parse(sql: &str) -> Statement {
        Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0)
    }

    #[test]
    fn test_children_before_parent() {
        let mut statement = parse("SELECT SUM(a) FROM t WHERE b = 'x' ORDER BY c");
        let mut seen = Vec::new();
        walk_statement(&mut statement, &mut |clause, expr| {
            seen.push((clause, expr.to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (Clause::Select, "a".to_string()),
                (Clause::Select, "SUM(a)".to_string()),
                (Clause::Where, "b".to_string()),
                (Clause::Where, "'x'".to_string()),
                (Clause::Where, "b = 'x'".to_string()),
                (Clause::OrderBy, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_rewrite_in_place() {
        let mut statement = parse("SELECT a + b FROM t");
        walk_statement(&mut statement, &mut |_, expr| {
            if let Expr::Identifier(ident) = expr {
                ident.value = ident.value.to_uppercase();
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(statement.to_string(), "SELECT A + B FROM t");
    }

    #[test]
    fn test_window_function_rejected() {
        let mut statement = parse("SELECT ROW_NUMBER() OVER (ORDER BY a) FROM t");
        let err = walk_statement(&mut statement, &mut |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedDraftSql(_)));
    }

    #[test]
    fn test_expression_identifiers() {
        let mut expr = parse_expression("SUM(price * qty) / NULLIF(t.orders, 0)").unwrap();
        assert_eq!(expression_identifiers(&mut expr).unwrap(), vec!["price", "qty", "orders"]);
        assert!(parse_expression("SUM(").is_err());
        assert!(parse_expression("play_cnt extra").is_err());
    }

    #[test]
    fn test_subquery_rejected() {
        let mut statement = parse("SELECT a FROM t WHERE b IN (SELECT b FROM u)");
        assert!(walk_statement(&mut statement, &mut |_, _| Ok(())).is_err());
    }
}
