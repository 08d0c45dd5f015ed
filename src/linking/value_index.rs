//! Entity Value Index
//!
//! Reverse index from value strings to the dimension values they name,
//! scoped per model cluster. Candidates are ranked in three tiers:
//! exact text match, case/punctuation-insensitive match, token-overlap match.

use crate::error::{ResolveError, Result};
use crate::fuzzy_matcher::{normalize_string, tokenize, FuzzyMatcher};
use crate::semantic::catalog::{term_key, SemanticCatalog};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Score of an exact text match
pub const EXACT_SCORE: f64 = 1.0;
/// Score of a case/punctuation-insensitive match
pub const NORMALIZED_SCORE: f64 = 0.9;
/// Weight applied to the token-overlap ratio of a fuzzy match
pub const FUZZY_WEIGHT: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Normalized,
    Fuzzy,
}

/// Enumerated values of one dimension, supplied out-of-band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDomain {
    pub cluster: String,
    pub dimension: String,
    pub values: Vec<String>,
}

/// A ranked candidate for a piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCandidate {
    pub cluster: String,
    /// Canonical dimension name
    pub dimension: String,
    pub value: String,
    pub score: f64,
    pub kind: MatchKind,
}

#[derive(Debug)]
struct IndexEntry {
    cluster: String,
    dimension: String,
    value: String,
    value_chars: usize,
    tokens: Vec<String>,
}

#[derive(Debug, Default)]
struct ClusterValues {
    entries: Vec<IndexEntry>,
    exact: HashMap<String, Vec<usize>>,
    normalized: HashMap<String, Vec<usize>>,
    max_tokens: usize,
}

impl ClusterValues {
    fn insert(&mut self, entry: IndexEntry) {
        let idx = self.entries.len();
        self.max_tokens = self.max_tokens.max(entry.tokens.len());
        self.exact.entry(entry.value.clone()).or_default().push(idx);
        self.normalized
            .entry(entry.tokens.join(" "))
            .or_default()
            .push(idx);
        self.entries.push(entry);
    }

    fn contains(&self, dimension: &str, value: &str) -> bool {
        self.exact
            .get(value)
            .map(|ids| ids.iter().any(|i| self.entries[*i].dimension == dimension))
            .unwrap_or(false)
    }
}

/// Reverse index from value text to (dimension, value)
#[derive(Debug, Default)]
pub struct EntityValueIndex {
    clusters: HashMap<String, ClusterValues>,
    cluster_order: Vec<String>,
}

impl EntityValueIndex {
    /// Index the enumerated values declared on the catalog's dimensions
    pub fn from_catalog(catalog: &SemanticCatalog) -> Self {
        let mut index = Self::default();
        for cluster in catalog.clusters() {
            for dimension in &cluster.dimensions {
                for value in &dimension.values {
                    index.insert(&cluster.name, &dimension.name, value);
                }
            }
        }
        index
    }

    /// Index catalog values plus out-of-band value domains
    ///
    /// Every domain must name a dimension of the catalog.
    pub fn build(catalog: &SemanticCatalog, domains: &[ValueDomain]) -> Result<Self> {
        let mut index = Self::from_catalog(catalog);
        for domain in domains {
            let cluster = catalog.cluster(&domain.cluster).ok_or_else(|| {
                ResolveError::Catalog(format!(
                    "Value domain references unknown model cluster '{}'",
                    domain.cluster
                ))
            })?;
            let dimension = catalog
                .lookup_dimension(&cluster.name, &domain.dimension)
                .ok_or_else(|| {
                    ResolveError::Catalog(format!(
                        "Value domain references unknown dimension '{}' in model cluster '{}'",
                        domain.dimension, cluster.name
                    ))
                })?;
            for value in &domain.values {
                index.insert(&cluster.name, &dimension.name, value);
            }
        }
        Ok(index)
    }

    fn insert(&mut self, cluster: &str, dimension: &str, value: &str) {
        let key = term_key(cluster);
        if !self.clusters.contains_key(&key) {
            self.cluster_order.push(key.clone());
        }
        let values = self.clusters.entry(key).or_default();
        // Duplicate (dimension, value) pairs would only produce tied candidates
        if values.contains(dimension, value) {
            return;
        }
        let tokens: Vec<String> = tokenize(value).into_iter().map(|t| t.text).collect();
        if tokens.is_empty() {
            return;
        }
        values.insert(IndexEntry {
            cluster: cluster.to_string(),
            dimension: dimension.to_string(),
            value: value.to_string(),
            value_chars: value.chars().count(),
            tokens,
        });
    }

    pub fn len(&self) -> usize {
        self.clusters.values().map(|c| c.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longest indexed value of a cluster, in tokens
    pub fn max_tokens(&self, cluster: &str) -> usize {
        self.clusters
            .get(&term_key(cluster))
            .map(|c| c.max_tokens)
            .unwrap_or(0)
    }

    /// Ranked candidates for `text` across every cluster
    pub fn candidates(&self, text: &str, matcher: &FuzzyMatcher) -> Vec<ValueCandidate> {
        let mut all: Vec<ValueCandidate> = self
            .cluster_order
            .iter()
            .flat_map(|cluster| self.candidates_in(cluster, text, matcher))
            .collect();
        all.sort_by(|a, b| rank(a, b));
        all
    }

    /// Ranked candidates for `text` within one cluster
    ///
    /// Order: score descending, then shorter matched value, then dimension
    /// name, then value. The order is total, so results are deterministic.
    /// `matcher` decides which word tokens overlap in the fuzzy tier.
    pub fn candidates_in(&self, cluster: &str, text: &str, matcher: &FuzzyMatcher) -> Vec<ValueCandidate> {
        let values = match self.clusters.get(&term_key(cluster)) {
            Some(values) => values,
            None => return Vec::new(),
        };

        let text_tokens: Vec<String> = tokenize(text).into_iter().map(|t| t.text).collect();
        if text_tokens.is_empty() {
            return Vec::new();
        }
        let normalized = normalize_string(text);

        let mut best: HashMap<usize, (f64, MatchKind)> = HashMap::new();
        if let Some(ids) = values.exact.get(text) {
            for idx in ids {
                best.insert(*idx, (EXACT_SCORE, MatchKind::Exact));
            }
        }
        if let Some(ids) = values.normalized.get(&normalized) {
            for idx in ids {
                best.entry(*idx).or_insert((NORMALIZED_SCORE, MatchKind::Normalized));
            }
        }
        for (idx, entry) in values.entries.iter().enumerate() {
            if best.contains_key(&idx) {
                continue;
            }
            let overlap = matcher.token_overlap(&text_tokens, &entry.tokens);
            if overlap > 0.0 {
                best.insert(idx, (FUZZY_WEIGHT * overlap, MatchKind::Fuzzy));
            }
        }

        let mut ranked: Vec<(usize, ValueCandidate)> = best
            .into_iter()
            .map(|(idx, (score, kind))| {
                let entry = &values.entries[idx];
                (
                    entry.value_chars,
                    ValueCandidate {
                        cluster: entry.cluster.clone(),
                        dimension: entry.dimension.clone(),
                        value: entry.value.clone(),
                        score,
                        kind,
                    },
                )
            })
            .collect();
        ranked.sort_by(|(len_a, a), (len_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(len_a.cmp(len_b))
                .then_with(|| a.dimension.cmp(&b.dimension))
                .then_with(|| a.value.cmp(&b.value))
        });
        ranked.into_iter().map(|(_, c)| c).collect()
    }
}

fn rank(a: &ValueCandidate, b: &ValueCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then(a.value.chars().count().cmp(&b.value.chars().count()))
        .then_with(|| a.dimension.cmp(&b.dimension))
        .then_with(|| a.value.cmp(&b.value))
        .then_with(|| a.cluster.cmp(&b.cluster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::cluster::ModelCluster;
    use crate::semantic::dimension::Dimension;

    fn catalog() -> SemanticCatalog {
        let cluster = ModelCluster::new("play_stats", "t_song_play")
            .with_dimension(Dimension::categorical("song_name", "歌曲名").with_values(&["小苹果", "Little Apple"]))
            .with_dimension(Dimension::categorical("album", "专辑").with_values(&["Apple"]))
            .with_dimension(Dimension::categorical("singer", "歌手").with_values(&["筷子兄弟"]));
        SemanticCatalog::new(vec![cluster]).unwrap()
    }

    #[test]
    fn test_exact_ranks_first() {
        let index = EntityValueIndex::from_catalog(&catalog());
        let candidates = index.candidates_in("play_stats", "小苹果", &FuzzyMatcher::default());
        assert_eq!(candidates[0].value, "小苹果");
        assert_eq!(candidates[0].score, EXACT_SCORE);
        assert_eq!(candidates[0].kind, MatchKind::Exact);
    }

    #[test]
    fn test_normalized_match() {
        let index = EntityValueIndex::from_catalog(&catalog());
        let candidates = index.candidates_in("play_stats", "little-apple", &FuzzyMatcher::default());
        assert_eq!(candidates[0].value, "Little Apple");
        assert_eq!(candidates[0].kind, MatchKind::Normalized);
        assert_eq!(candidates[0].score, NORMALIZED_SCORE);
    }

    #[test]
    fn test_tiers_rank_by_score() {
        let index = EntityValueIndex::from_catalog(&catalog());
        // "apple" overlaps "Apple" exactly (normalized) and half of "Little Apple"
        let candidates = index.candidates_in("play_stats", "apple", &FuzzyMatcher::default());
        assert_eq!(candidates[0].value, "Apple");
        assert_eq!(candidates[0].kind, MatchKind::Normalized);
        assert_eq!(candidates[1].value, "Little Apple");
        assert_eq!(candidates[1].kind, MatchKind::Fuzzy);
        assert!((candidates[1].score - FUZZY_WEIGHT * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ties_break_on_length_then_dimension() {
        let cluster = ModelCluster::new("play_stats", "t_song_play")
            .with_dimension(Dimension::categorical("song_name", "歌曲名").with_values(&["Apple", "Apple Pie"]))
            .with_dimension(Dimension::categorical("album", "专辑").with_values(&["Apple", "Apple Tree"]));
        let index = EntityValueIndex::from_catalog(&SemanticCatalog::new(vec![cluster]).unwrap());

        let candidates = index.candidates_in("play_stats", "Apple", &FuzzyMatcher::default());
        let order: Vec<(&str, &str)> = candidates
            .iter()
            .map(|c| (c.dimension.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("album", "Apple"),
                ("song_name", "Apple"),
                ("song_name", "Apple Pie"),
                ("album", "Apple Tree"),
            ]
        );
    }

    #[test]
    fn test_build_rejects_unknown_dimension() {
        let domains = vec![ValueDomain {
            cluster: "play_stats".into(),
            dimension: "missing".into(),
            values: vec!["x".into()],
        }];
        assert!(EntityValueIndex::build(&catalog(), &domains).is_err());

        let domains = vec![ValueDomain {
            cluster: "play_stats".into(),
            dimension: "歌手".into(),
            values: vec!["凤凰传奇".into(), "筷子兄弟".into()],
        }];
        let index = EntityValueIndex::build(&catalog(), &domains).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.candidates_in("play_stats", "凤凰传奇", &FuzzyMatcher::default())[0].dimension, "singer");
    }
}
