#![allow(dead_code)]

use chrono::NaiveDate;
use s2sql_resolver::{
    Aggregation, DateWindow, Dimension, DraftRequest, DraftResponse, EntityValueIndex, Metric, ModelCluster,
    ResolutionCoordinator, ResolveRequest, ResolverConfig, SemanticCatalog,
};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
}

/// Song play statistics, without a default window
pub fn play_cluster() -> ModelCluster {
    ModelCluster::new("play_stats", "t_song_play")
        .with_display_name("歌曲播放")
        .with_metric(Metric::atomic("play_cnt", "播放量", Aggregation::Sum).with_aliases(&["播放次数"]))
        .with_metric(Metric::atomic("like_cnt", "点赞量", Aggregation::Sum))
        .with_metric(Metric::atomic_with_expr(
            "user_cnt",
            "用户数",
            Aggregation::CountDistinct,
            "user_id",
        ))
        .with_metric(Metric::ratio("play_per_user", "人均播放量", "play_cnt", "user_cnt"))
        .with_dimension(
            Dimension::categorical("song_name", "歌曲名")
                .with_aliases(&["歌名"])
                .with_values(&["小苹果", "最炫民族风", "Little Apple"]),
        )
        .with_dimension(Dimension::categorical("singer", "歌手").with_values(&["筷子兄弟", "凤凰传奇"]))
        .with_dimension(Dimension::time("sys_imp_date", "数据日期"))
        .with_time_dimension("sys_imp_date")
        .with_default_metric("play_cnt")
}

pub fn singer_cluster() -> ModelCluster {
    ModelCluster::new("singer_stats", "t_singer_fans")
        .with_metric(Metric::atomic("fans_cnt", "粉丝数", Aggregation::Sum))
        .with_dimension(Dimension::categorical("singer", "歌手").with_values(&["筷子兄弟", "凤凰传奇"]))
}

pub fn music_catalog() -> SemanticCatalog {
    SemanticCatalog::new(vec![play_cluster(), singer_cluster()]).unwrap()
}

pub fn windowed_catalog() -> SemanticCatalog {
    SemanticCatalog::new(vec![
        play_cluster().with_default_window(DateWindow::days(3)),
        singer_cluster(),
    ])
    .unwrap()
}

pub fn coordinator(catalog: SemanticCatalog) -> ResolutionCoordinator {
    let values = EntityValueIndex::from_catalog(&catalog);
    ResolutionCoordinator::from_catalog(catalog, values, ResolverConfig::default())
}

pub fn request(question: &str, sql: &str) -> ResolveRequest {
    ResolveRequest::new(DraftRequest::new(question, today()), DraftResponse::new(sql))
}

pub fn hinted_request(question: &str, sql: &str, cluster: &str) -> ResolveRequest {
    ResolveRequest::new(
        DraftRequest::new(question, today()).with_cluster_hint(cluster),
        DraftResponse::new(sql),
    )
}
