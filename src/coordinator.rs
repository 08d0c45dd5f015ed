//! Resolution Coordinator
//!
//! Runs one resolution against a single catalog snapshot:
//! parse draft, select cluster, link question values, bind.
//! The first failing stage ends the call with its typed error.

use crate::cluster_selector::ClusterSelector;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::linking::linker::{ElementValue, EntityLinker};
use crate::linking::value_index::EntityValueIndex;
use crate::request::{AgentToolContext, DraftRequest, DraftResponse, QueryRequest, ResolveRequest};
use crate::semantic::catalog::SemanticCatalog;
use crate::semantic::cluster::ModelCluster;
use crate::snapshot::SnapshotStore;
use crate::sql_binder::binder::{BindContext, BoundQuery, SqlBinder};
use crate::sql_binder::draft::parse_draft;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// Result bundle of one successful resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub cluster: ModelCluster,
    pub query: QueryRequest,
    pub draft: DraftRequest,
    pub response: DraftResponse,
    pub tool: AgentToolContext,
    /// Linked question values, in question order of discovery
    pub linked_values: Vec<ElementValue>,
    pub bound: BoundQuery,
    /// Catalog generation the result was resolved against
    pub generation: u64,
}

impl ParseResult {
    /// Stable cache key over the cluster and the bound SQL
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.cluster.name.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.bound.sql.as_bytes());
        hex::encode(hasher.finalize())
    }
}

pub struct ResolutionCoordinator {
    store: Arc<SnapshotStore>,
    config: ResolverConfig,
}

impl ResolutionCoordinator {
    pub fn new(store: Arc<SnapshotStore>, config: ResolverConfig) -> Self {
        Self { store, config }
    }

    /// Coordinator over a fresh store holding one catalog generation
    pub fn from_catalog(catalog: SemanticCatalog, values: EntityValueIndex, config: ResolverConfig) -> Self {
        Self::new(Arc::new(SnapshotStore::new(catalog, values)), config)
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(&self, request: &ResolveRequest) -> Result<ParseResult> {
        let snapshot = self.store.load();
        let catalog = &snapshot.catalog;
        let question = request.draft.question.as_str();

        let draft = parse_draft(&request.response.sql)?;
        debug!(
            generation = snapshot.generation,
            identifiers = draft.identifiers.len(),
            "parsed draft SQL"
        );

        let cluster = ClusterSelector::new(catalog).select(
            question,
            &draft,
            request.draft.cluster_hint.as_deref(),
        )?;
        debug!(cluster = %cluster.name, "selected model cluster");

        let linked_values: Vec<ElementValue> = EntityLinker::new(self.config.confidence_floor)
            .with_token_threshold(self.config.fuzzy_token_threshold)
            .link(&snapshot.values, &cluster.name, question)
            .collect();
        debug!(linked = linked_values.len(), "linked question values");

        let ctx = BindContext {
            catalog,
            cluster,
            linked: &linked_values,
            current_date: request.draft.current_date,
            default_metric: request.draft.default_metric.as_deref(),
            default_window: request.draft.default_window,
        };
        let bound = SqlBinder::new(&self.config).bind(&draft, &ctx)?;
        info!(
            cluster = %cluster.name,
            sql = %bound.sql,
            defaults = bound.defaults.len(),
            "resolved draft query"
        );

        Ok(ParseResult {
            cluster: cluster.clone(),
            query: request.query.clone(),
            draft: request.draft.clone(),
            response: request.response.clone(),
            tool: request.tool.clone(),
            linked_values,
            bound,
            generation: snapshot.generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::semantic::cluster::{DateWindow, TimeGrain};
    use crate::semantic::dimension::Dimension;
    use crate::semantic::metric::{Aggregation, Metric};
    use chrono::NaiveDate;

    fn coordinator() -> ResolutionCoordinator {
        let cluster = ModelCluster::new("play_stats", "t_song_play")
            .with_metric(Metric::atomic("play_cnt", "播放量", Aggregation::Sum))
            .with_dimension(Dimension::categorical("song_name", "歌曲名").with_values(&["小苹果"]));
        let catalog = SemanticCatalog::new(vec![cluster]).unwrap();
        let values = EntityValueIndex::from_catalog(&catalog);
        ResolutionCoordinator::from_catalog(catalog, values, ResolverConfig::default())
    }

    fn request(sql: &str) -> ResolveRequest {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        ResolveRequest::new(DraftRequest::new("小苹果的播放量", date), DraftResponse::new(sql))
    }

    #[test]
    fn test_resolve_bundles_every_stage() {
        let result = coordinator()
            .resolve(&request("SELECT 播放量 FROM t WHERE 歌曲名 = '小苹果'"))
            .unwrap();
        assert_eq!(result.cluster.name, "play_stats");
        assert_eq!(result.query.query_text, "小苹果的播放量");
        assert_eq!(result.linked_values.len(), 1);
        assert_eq!(result.linked_values[0].value, "小苹果");
        assert_eq!(result.generation, 0);
        assert_eq!(result.fingerprint().len(), 64);
    }

    #[test]
    fn test_first_error_is_surfaced() {
        let err = coordinator().resolve(&request("SELEC 播放量 FORM t")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDraftSql);
    }

    #[test]
    fn test_token_threshold_survives_publish() {
        let english = || {
            let cluster = ModelCluster::new("play_stats", "t_song_play")
                .with_metric(Metric::atomic("play_cnt", "播放量", Aggregation::Sum))
                .with_dimension(Dimension::categorical("song_name", "歌曲名").with_values(&["Little Apple"]));
            let catalog = SemanticCatalog::new(vec![cluster]).unwrap();
            let values = EntityValueIndex::from_catalog(&catalog);
            (catalog, values)
        };
        let typo = |coordinator: &ResolutionCoordinator| {
            let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
            let request = ResolveRequest::new(
                DraftRequest::new("little appel", date),
                DraftResponse::new("SELECT 播放量 FROM t"),
            );
            coordinator.resolve(&request).unwrap().linked_values.len()
        };

        let (catalog, values) = english();
        assert_eq!(typo(&ResolutionCoordinator::from_catalog(catalog, values, ResolverConfig::default())), 1);

        let strict = ResolverConfig {
            fuzzy_token_threshold: 0.99,
            ..ResolverConfig::default()
        };
        let (catalog, values) = english();
        let coordinator = ResolutionCoordinator::from_catalog(catalog, values, strict.clone());
        assert_eq!(typo(&coordinator), 0);

        let (catalog, values) = english();
        coordinator.store().publish(catalog, values);
        assert_eq!(typo(&coordinator), 0);

        let (catalog, values) = english();
        let shared = ResolutionCoordinator::new(Arc::new(SnapshotStore::new(catalog, values)), strict);
        assert_eq!(typo(&shared), 0);
    }

    #[test]
    fn test_request_default_window_reaches_binder() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let coordinator = {
            let cluster = ModelCluster::new("play_stats", "t_song_play")
                .with_metric(Metric::atomic("play_cnt", "播放量", Aggregation::Sum))
                .with_dimension(Dimension::time("sys_imp_date", "数据日期"))
                .with_time_dimension("sys_imp_date");
            let catalog = SemanticCatalog::new(vec![cluster]).unwrap();
            let values = EntityValueIndex::from_catalog(&catalog);
            ResolutionCoordinator::from_catalog(catalog, values, ResolverConfig::default())
        };
        let windowed = |window: DateWindow| {
            ResolveRequest::new(
                DraftRequest::new("", date).with_default_window(window),
                DraftResponse::new("SELECT 播放量 FROM t"),
            )
        };

        let result = coordinator.resolve(&windowed(DateWindow::new(TimeGrain::Week, 1))).unwrap();
        assert_eq!(
            result.bound.sql,
            "SELECT play_cnt FROM t_song_play WHERE sys_imp_date >= '2024-03-04' AND sys_imp_date <= '2024-03-10'"
        );

        let err = coordinator
            .resolve(&windowed(DateWindow::new(TimeGrain::Year, 400_000_000)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTimeWindow);
    }
}
