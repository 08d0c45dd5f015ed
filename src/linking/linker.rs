//! Entity Linker
//!
//! Scans a question for spans that name dimension values of one cluster.
//! Spans are tried longest first, left to right; once a span is linked its
//! tokens are consumed, so no two linked values ever overlap.

use crate::fuzzy_matcher::{tokenize, FuzzyMatcher, Token};
use crate::linking::value_index::{EntityValueIndex, MatchKind};
use serde::{Deserialize, Serialize};

/// One resolved entity mention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementValue {
    /// Text of the question span
    pub text: String,
    /// Char offset where the span starts
    pub start: usize,
    /// Char offset one past the end of the span
    pub end: usize,
    /// Canonical dimension name
    pub dimension: String,
    /// Concrete dimension value
    pub value: String,
    pub confidence: f64,
    pub kind: MatchKind,
}

impl ElementValue {
    pub fn overlaps(&self, other: &ElementValue) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Entity linker with a confidence floor and a fuzzy token matcher
#[derive(Debug, Clone)]
pub struct EntityLinker {
    pub confidence_floor: f64,
    pub matcher: FuzzyMatcher,
}

impl Default for EntityLinker {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl EntityLinker {
    pub fn new(confidence_floor: f64) -> Self {
        Self {
            confidence_floor,
            matcher: FuzzyMatcher::default(),
        }
    }

    pub fn with_token_threshold(mut self, threshold: f64) -> Self {
        self.matcher = FuzzyMatcher::new(threshold);
        self
    }

    /// Lazily link the mentions of `question` against the values of `cluster`
    ///
    /// Every call starts a fresh scan, so the sequence can be restarted.
    pub fn link<'a>(
        &self,
        index: &'a EntityValueIndex,
        cluster: &'a str,
        question: &'a str,
    ) -> LinkedValues<'a> {
        let tokens = tokenize(question);
        let window = index.max_tokens(cluster).min(tokens.len());
        LinkedValues {
            index,
            matcher: self.matcher.clone(),
            cluster,
            question,
            consumed: vec![false; tokens.len()],
            tokens,
            window,
            start: 0,
            floor: self.confidence_floor,
        }
    }
}

/// Iterator over the linked values of one question
#[derive(Debug, Clone)]
pub struct LinkedValues<'a> {
    index: &'a EntityValueIndex,
    matcher: FuzzyMatcher,
    cluster: &'a str,
    question: &'a str,
    tokens: Vec<Token>,
    consumed: Vec<bool>,
    /// Current span length in tokens
    window: usize,
    /// Next start token for the current span length
    start: usize,
    floor: f64,
}

impl<'a> LinkedValues<'a> {
    /// A fuzzy span must start and end on tokens the value shares
    fn anchored(&self, head: &Token, tail: &Token, value: &str) -> bool {
        let value_tokens = tokenize(value);
        let shared = |t: &Token| {
            value_tokens
                .iter()
                .any(|v| self.matcher.tokens_match(&t.text, &v.text))
        };
        shared(head) && shared(tail)
    }

    fn try_span(&mut self, first: usize, len: usize) -> Option<ElementValue> {
        let last = first + len - 1;
        if self.consumed[first..=last].iter().any(|c| *c) {
            return None;
        }

        let question: &'a str = self.question;
        let (head, tail) = (&self.tokens[first], &self.tokens[last]);
        let (start, end) = (head.char_start, tail.char_end);
        let text = &question[head.byte_start..tail.byte_end];
        let floor = self.floor;
        let best = self
            .index
            .candidates_in(self.cluster, text, &self.matcher)
            .into_iter()
            .take_while(|c| c.score >= floor)
            .find(|c| c.kind != MatchKind::Fuzzy || self.anchored(head, tail, &c.value))?;

        for c in &mut self.consumed[first..=last] {
            *c = true;
        }
        Some(ElementValue {
            text: text.to_string(),
            start,
            end,
            dimension: best.dimension,
            value: best.value,
            confidence: best.score,
            kind: best.kind,
        })
    }
}

impl<'a> Iterator for LinkedValues<'a> {
    type Item = ElementValue;

    fn next(&mut self) -> Option<ElementValue> {
        while self.window > 0 {
            while self.start + self.window <= self.tokens.len() {
                let first = self.start;
                self.start += 1;
                if let Some(value) = self.try_span(first, self.window) {
                    return Some(value);
                }
            }
            self.window -= 1;
            self.start = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::catalog::SemanticCatalog;
    use crate::semantic::cluster::ModelCluster;
    use crate::semantic::dimension::Dimension;

    fn index() -> EntityValueIndex {
        let cluster = ModelCluster::new("play_stats", "t_song_play")
            .with_dimension(
                Dimension::categorical("song_name", "歌曲名").with_values(&["小苹果", "苹果", "Little Apple"]),
            )
            .with_dimension(Dimension::categorical("singer", "歌手").with_values(&["筷子兄弟"]));
        EntityValueIndex::from_catalog(&SemanticCatalog::new(vec![cluster]).unwrap())
    }

    #[test]
    fn test_longest_match_first() {
        let index = index();
        let linked: Vec<ElementValue> = EntityLinker::default()
            .link(&index, "play_stats", "筷子兄弟的小苹果播放量")
            .collect();

        assert_eq!(linked.len(), 2);
        assert_eq!(linked[0].value, "筷子兄弟");
        assert_eq!((linked[0].start, linked[0].end), (0, 4));
        assert_eq!(linked[1].value, "小苹果");
        assert_eq!((linked[1].start, linked[1].end), (5, 8));
        // "苹果" lies inside the consumed "小苹果" span and is not emitted
        assert!(linked.iter().all(|v| v.value != "苹果"));
    }

    #[test]
    fn test_normalized_span() {
        let index = index();
        let linked: Vec<ElementValue> = EntityLinker::default()
            .link(&index, "play_stats", "plays of little-apple yesterday")
            .collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].text, "little-apple");
        assert_eq!(linked[0].value, "Little Apple");
        assert_eq!(linked[0].kind, MatchKind::Normalized);
        assert_eq!((linked[0].start, linked[0].end), (9, 21));
    }

    #[test]
    fn test_confidence_floor_filters() {
        let index = index();
        // "apple" alone overlaps half of "Little Apple": 0.4
        let strict: Vec<ElementValue> = EntityLinker::new(0.6).link(&index, "play_stats", "apple").collect();
        assert!(strict.is_empty());

        let loose: Vec<ElementValue> = EntityLinker::new(0.3).link(&index, "play_stats", "apple").collect();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].kind, MatchKind::Fuzzy);
    }

    #[test]
    fn test_token_threshold_controls_fuzzy_tokens() {
        let index = index();
        // "appel" is a near miss of "apple" (Jaro-Winkler ~0.95)
        let loose: Vec<ElementValue> = EntityLinker::default()
            .link(&index, "play_stats", "little appel")
            .collect();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].value, "Little Apple");

        let strict = EntityLinker::default()
            .with_token_threshold(0.99)
            .link(&index, "play_stats", "little appel");
        assert_eq!(strict.count(), 0);
    }

    #[test]
    fn test_unknown_cluster_links_nothing() {
        let index = index();
        assert_eq!(EntityLinker::default().link(&index, "missing", "小苹果").count(), 0);
    }

    #[test]
    fn test_scan_is_restartable() {
        let index = index();
        let linker = EntityLinker::default();
        let first: Vec<ElementValue> = linker.link(&index, "play_stats", "小苹果").collect();
        let second: Vec<ElementValue> = linker.link(&index, "play_stats", "小苹果").collect();
        assert_eq!(first, second);
    }
}
