//! SQL Binder: draft parsing, identifier binding, default completion

pub mod binder;
pub mod derivation;
pub mod draft;
pub mod expansion;
pub mod walker;

pub use binder::*;
pub use derivation::check_derivation;
pub use draft::{parse_draft, DraftIdentifier, DraftSql};
pub use expansion::{Expansion, MetricExpander};
pub use walker::{walk_expr, walk_statement, Clause};
