//! Draft SQL parsing
//!
//! A draft is a single SELECT over one table, written over business names.
//! Parsing validates that shape and collects every identifier the draft
//! references, tagged with the clause it appears in.

use crate::error::{ResolveError, Result};
use crate::semantic::catalog::term_key;
use crate::sql_binder::walker::{walk_statement, Clause};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{Expr, Select, SelectItem, SetExpr, Statement, TableFactor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;

/// An identifier referenced by the draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftIdentifier {
    /// Unqualified name as written
    pub name: String,
    pub clause: Clause,
    /// Refers to a projection alias rather than the catalog
    pub alias: bool,
}

/// A parsed, shape-checked draft
#[derive(Debug, Clone)]
pub struct DraftSql {
    pub sql: String,
    pub statement: Statement,
    /// Identifiers in walk order, duplicates included
    pub identifiers: Vec<DraftIdentifier>,
    /// Projection aliases (lookup keys)
    pub aliases: HashSet<String>,
}

impl DraftSql {
    /// Distinct identifiers that must resolve in the catalog, in first-seen order
    pub fn catalog_identifiers(&self) -> Vec<String> {
        self.identifiers
            .iter()
            .filter(|id| !id.alias)
            .unique_by(|id| term_key(&id.name))
            .map(|id| id.name.clone())
            .collect()
    }
}

/// Clauses where a bare name may refer to a projection alias
pub(crate) fn is_alias_clause(clause: Clause) -> bool {
    matches!(clause, Clause::GroupBy | Clause::Having | Clause::OrderBy)
}

/// Whether `expr` names a projection alias
///
/// Only an unqualified identifier can; `t.total` always names a column.
pub(crate) fn alias_reference(aliases: &HashSet<String>, clause: Clause, expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(ident) => is_alias_clause(clause) && aliases.contains(&term_key(&ident.value)),
        _ => false,
    }
}

/// Unqualified name of an identifier expression
pub(crate) fn identifier_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.as_str()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|p| p.value.as_str()),
        _ => None,
    }
}

fn malformed(message: impl Into<String>) -> ResolveError {
    ResolveError::MalformedDraftSql(message.into())
}

/// The single SELECT of a shape-checked statement
pub(crate) fn select_mut(statement: &mut Statement) -> Result<&mut Select> {
    if let Statement::Query(query) = statement {
        if let SetExpr::Select(select) = query.body.as_mut() {
            return Ok(select);
        }
    }
    Err(malformed("expected a single SELECT"))
}

fn check_shape(statement: &Statement) -> Result<()> {
    let query = match statement {
        Statement::Query(query) => query,
        other => return Err(malformed(format!("expected a SELECT query, got: {}", other))),
    };
    if query.with.is_some() {
        return Err(malformed("common table expressions are not supported"));
    }
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select,
        SetExpr::SetOperation { .. } => return Err(malformed("set operations are not supported")),
        _ => return Err(malformed("expected a single SELECT")),
    };

    if select.from.len() != 1 {
        return Err(malformed("draft must select from exactly one table"));
    }
    let from = &select.from[0];
    if !from.joins.is_empty() {
        return Err(malformed("joins are not supported"));
    }
    if !matches!(from.relation, TableFactor::Table { .. }) {
        return Err(malformed("FROM must name a table"));
    }
    if select.projection.is_empty() {
        return Err(malformed("empty projection"));
    }
    Ok(())
}

/// Parse a draft and collect its identifiers
pub fn parse_draft(sql: &str) -> Result<DraftSql> {
    let dialect = GenericDialect {};
    let mut statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| malformed(format!("failed to parse draft SQL: {}", e)))?;
    if statements.len() != 1 {
        return Err(malformed(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    }
    let mut statement = statements.remove(0);
    check_shape(&statement)?;

    let aliases: HashSet<String> = select_mut(&mut statement)?
        .projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::ExprWithAlias { alias, .. } => Some(term_key(&alias.value)),
            _ => None,
        })
        .collect();

    let mut identifiers = Vec::new();
    walk_statement(&mut statement, &mut |clause, expr| {
        if let Some(name) = identifier_name(expr) {
            identifiers.push(DraftIdentifier {
                name: name.to_string(),
                clause,
                alias: alias_reference(&aliases, clause, expr),
            });
        }
        Ok(())
    })?;

    Ok(DraftSql {
        sql: sql.to_string(),
        statement,
        identifiers,
        aliases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_collects_identifiers_by_clause() {
        let draft = parse_draft(
            "SELECT 歌曲名, SUM(播放量) AS total FROM t WHERE t.歌手 = '筷子兄弟' \
             GROUP BY 歌曲名 ORDER BY total DESC LIMIT 10",
        )
        .unwrap();

        let names: Vec<(&str, Clause)> = draft
            .identifiers
            .iter()
            .map(|id| (id.name.as_str(), id.clause))
            .collect();
        assert_eq!(
            names,
            vec![
                ("歌曲名", Clause::Select),
                ("播放量", Clause::Select),
                ("歌手", Clause::Where),
                ("歌曲名", Clause::GroupBy),
                ("total", Clause::OrderBy),
            ]
        );
        // "total" in ORDER BY is the projection alias
        assert_eq!(draft.catalog_identifiers(), vec!["歌曲名", "播放量", "歌手"]);
    }

    #[test]
    fn test_qualified_alias_name_is_a_column() {
        let draft = parse_draft("SELECT SUM(播放量) AS total FROM t ORDER BY t.total").unwrap();
        assert!(!draft.identifiers[1].alias);
        assert_eq!(draft.catalog_identifiers(), vec!["播放量", "total"]);

        let draft = parse_draft("SELECT SUM(播放量) AS Total FROM t HAVING total > 1 ORDER BY TOTAL").unwrap();
        assert!(draft.identifiers[1..].iter().all(|id| id.alias));
        assert_eq!(draft.catalog_identifiers(), vec!["播放量"]);
    }

    #[test]
    fn test_unparseable_draft() {
        let err = parse_draft("SELEC 播放量 FORM t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDraftSql);
    }

    #[test]
    fn test_unsupported_shapes() {
        for sql in [
            "SELECT a FROM t JOIN u ON t.id = u.id",
            "WITH x AS (SELECT a FROM t) SELECT a FROM x",
            "SELECT a FROM t UNION SELECT a FROM u",
            "SELECT a FROM t; SELECT b FROM t",
            "DELETE FROM t",
            "SELECT a FROM (SELECT a FROM t) s",
        ] {
            let err = parse_draft(sql).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedDraftSql, "{}", sql);
        }
    }
}
