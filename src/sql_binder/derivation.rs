//! Derived metric validation
//!
//! Derived and ratio metrics must bottom out in atomic metrics of the same
//! cluster. A missing reference or a cycle anywhere below a metric makes
//! that metric unusable.

use crate::error::{ResolveError, Result};
use crate::semantic::catalog::SemanticCatalog;
use std::collections::HashSet;

/// Check that `metric` and everything it derives from resolves without cycles
pub fn check_derivation(catalog: &SemanticCatalog, cluster: &str, metric: &str) -> Result<()> {
    let mut path: Vec<String> = Vec::new();
    let mut visiting: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    visit(catalog, cluster, metric, metric, &mut path, &mut visiting, &mut visited)
}

fn visit(
    catalog: &SemanticCatalog,
    cluster: &str,
    root: &str,
    term: &str,
    path: &mut Vec<String>,
    visiting: &mut HashSet<String>,
    visited: &mut HashSet<String>,
) -> Result<()> {
    let metric = catalog.lookup_metric(cluster, term).ok_or_else(|| ResolveError::InvalidMetricDerivation {
        metric: root.to_string(),
        reason: match path.last() {
            Some(parent) => format!("'{}' references unknown metric '{}'", parent, term),
            None => format!("unknown metric '{}'", term),
        },
    })?;
    let name = metric.name.as_str();

    if visiting.contains(name) {
        path.push(name.to_string());
        return Err(ResolveError::InvalidMetricDerivation {
            metric: root.to_string(),
            reason: format!("cyclic derivation {}", path.join(" -> ")),
        });
    }
    if visited.contains(name) {
        return Ok(());
    }

    visiting.insert(name.to_string());
    path.push(name.to_string());
    for reference in metric.referenced_metrics() {
        visit(catalog, cluster, root, reference, path, visiting, visited)?;
    }
    path.pop();
    visiting.remove(name);
    visited.insert(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::semantic::cluster::ModelCluster;
    use crate::semantic::metric::{Aggregation, Metric};

    fn catalog() -> SemanticCatalog {
        let cluster = ModelCluster::new("play_stats", "t_song_play")
            .with_metric(Metric::atomic("play_cnt", "播放量", Aggregation::Sum))
            .with_metric(Metric::atomic("user_cnt", "用户数", Aggregation::CountDistinct))
            .with_metric(Metric::ratio("play_per_user", "人均播放量", "播放量", "user_cnt"))
            .with_metric(Metric::derived("weekly_avg", "周均人均播放", "play_per_user / 7", &["play_per_user"]))
            .with_metric(Metric::derived("loop_a", "循环A", "loop_b + 1", &["loop_b"]))
            .with_metric(Metric::derived("loop_b", "循环B", "loop_a + 1", &["loop_a"]))
            .with_metric(Metric::derived("broken", "断链", "ghost * 2", &["ghost"]));
        SemanticCatalog::new(vec![cluster]).unwrap()
    }

    #[test]
    fn test_nested_derivation_resolves() {
        let catalog = catalog();
        assert!(check_derivation(&catalog, "play_stats", "weekly_avg").is_ok());
        assert!(check_derivation(&catalog, "play_stats", "play_cnt").is_ok());
    }

    #[test]
    fn test_cycle_rejected() {
        let err = check_derivation(&catalog(), "play_stats", "loop_a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMetricDerivation);
        assert!(err.to_string().contains("loop_a -> loop_b -> loop_a"));
    }

    #[test]
    fn test_missing_reference_rejected() {
        let err = check_derivation(&catalog(), "play_stats", "broken").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMetricDerivation);
        assert!(err.to_string().contains("ghost"));
    }
}
