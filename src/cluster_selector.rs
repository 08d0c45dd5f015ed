//! Model Cluster Selector
//!
//! Picks the one cluster a draft belongs to. An explicit hint that owns
//! every draft identifier wins outright; otherwise clusters are scored by
//! how many draft identifiers they resolve, and ties are reported rather
//! than guessed.

use crate::error::{ResolveError, Result};
use crate::semantic::catalog::{term_key, SemanticCatalog};
use crate::semantic::cluster::ModelCluster;
use crate::sql_binder::draft::DraftSql;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How well one cluster covers a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterScore {
    pub cluster: String,
    pub resolved: usize,
    pub total: usize,
}

impl ClusterScore {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.resolved as f64 / self.total as f64
        }
    }
}

pub struct ClusterSelector<'a> {
    catalog: &'a SemanticCatalog,
}

impl<'a> ClusterSelector<'a> {
    pub fn new(catalog: &'a SemanticCatalog) -> Self {
        Self { catalog }
    }

    /// A draft identifier resolves as a physical column or a business term
    fn resolves(&self, cluster: &str, identifier: &str) -> bool {
        self.catalog.lookup_column(cluster, identifier).is_some() || self.catalog.lookup(cluster, identifier).is_some()
    }

    /// Score every cluster by the draft identifiers it resolves
    pub fn score_identifiers(&self, identifiers: &[String]) -> Vec<ClusterScore> {
        self.catalog
            .clusters()
            .map(|cluster| ClusterScore {
                cluster: cluster.name.clone(),
                resolved: identifiers.iter().filter(|id| self.resolves(&cluster.name, id)).count(),
                total: identifiers.len(),
            })
            .collect()
    }

    /// Score every cluster by the catalog items its business terms name in the question
    pub fn score_question(&self, question: &str) -> Vec<ClusterScore> {
        let question = term_key(question);
        self.catalog
            .clusters()
            .map(|cluster| {
                let metric_hits = cluster
                    .metrics
                    .iter()
                    .filter(|m| m.terms().any(|t| question.contains(&term_key(t))))
                    .count();
                let dimension_hits = cluster
                    .dimensions
                    .iter()
                    .filter(|d| d.terms().any(|t| question.contains(&term_key(t))))
                    .count();
                ClusterScore {
                    cluster: cluster.name.clone(),
                    resolved: metric_hits + dimension_hits,
                    total: cluster.metrics.len() + cluster.dimensions.len(),
                }
            })
            .collect()
    }

    pub fn select(&self, question: &str, draft: &DraftSql, hint: Option<&str>) -> Result<&'a ModelCluster> {
        let identifiers = draft.catalog_identifiers();

        let hinted = match hint {
            Some(name) => {
                let cluster = self.catalog.cluster(name);
                if cluster.is_none() {
                    warn!(hint = name, "ignoring unknown model cluster hint");
                }
                cluster
            }
            None => None,
        };

        if let Some(cluster) = hinted {
            if identifiers.iter().all(|id| self.resolves(&cluster.name, id)) {
                debug!(cluster = %cluster.name, "hinted cluster owns every identifier");
                return Ok(cluster);
            }
        }

        let scores = if identifiers.is_empty() {
            self.score_question(question)
        } else {
            self.score_identifiers(&identifiers)
        };
        debug!(?scores, "scored model clusters");

        let winners: Vec<&ClusterScore> = scores.iter().max_set_by_key(|s| s.resolved);
        if winners.first().map_or(true, |s| s.resolved == 0) {
            // Let the binder name the identifier that failed
            if let Some(cluster) = hinted {
                return Ok(cluster);
            }
            return Err(ResolveError::ClusterNotFound { identifiers });
        }

        if winners.len() > 1 {
            return Err(ResolveError::ClusterAmbiguous(
                winners.iter().map(|s| s.cluster.clone()).collect(),
            ));
        }
        self.catalog
            .cluster(&winners[0].cluster)
            .ok_or_else(|| ResolveError::ClusterNotFound { identifiers })
    }
}
