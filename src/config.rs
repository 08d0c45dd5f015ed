//! Resolver Configuration
//!
//! Tunables for entity linking and default completion. Values come from
//! `Default`, a JSON file, or `S2SQL_*` environment variables.

use crate::error::{ResolveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which source wins when both the request and the cluster define a default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPrecedence {
    /// Request overrides first, cluster defaults as fallback
    RequestFirst,
    /// Cluster defaults first, request overrides as fallback
    ClusterFirst,
}

impl DefaultPrecedence {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "request_first" | "request" => Some(DefaultPrecedence::RequestFirst),
            "cluster_first" | "cluster" => Some(DefaultPrecedence::ClusterFirst),
            _ => None,
        }
    }

    /// Pick between a request-level and a cluster-level value
    pub fn choose<T>(&self, request: Option<T>, cluster: Option<T>) -> Option<T> {
        match self {
            DefaultPrecedence::RequestFirst => request.or(cluster),
            DefaultPrecedence::ClusterFirst => cluster.or(request),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum score (0.0-1.0) an entity candidate needs to be linked
    pub confidence_floor: f64,

    /// Jaro-Winkler similarity at which two word tokens count as the same token
    pub fuzzy_token_threshold: f64,

    /// Precedence between request and cluster defaults
    pub default_precedence: DefaultPrecedence,

    /// Inject a default metric when the draft references none
    pub inject_default_metric: bool,

    /// Inject a default time window when the draft has no time predicate
    pub inject_default_window: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            fuzzy_token_threshold: 0.9,
            default_precedence: DefaultPrecedence::RequestFirst,
            inject_default_metric: true,
            inject_default_window: true,
        }
    }
}

impl ResolverConfig {
    /// Defaults overlaid with `S2SQL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("S2SQL_CONFIDENCE_FLOOR") {
            config.confidence_floor = parse_unit_interval("S2SQL_CONFIDENCE_FLOOR", &raw)?;
        }
        if let Ok(raw) = std::env::var("S2SQL_FUZZY_TOKEN_THRESHOLD") {
            config.fuzzy_token_threshold = parse_unit_interval("S2SQL_FUZZY_TOKEN_THRESHOLD", &raw)?;
        }
        if let Ok(raw) = std::env::var("S2SQL_DEFAULT_PRECEDENCE") {
            config.default_precedence = DefaultPrecedence::parse(&raw).ok_or_else(|| {
                ResolveError::Config(format!("S2SQL_DEFAULT_PRECEDENCE: unknown precedence '{}'", raw))
            })?;
        }
        if let Ok(raw) = std::env::var("S2SQL_INJECT_DEFAULT_METRIC") {
            config.inject_default_metric = parse_bool("S2SQL_INJECT_DEFAULT_METRIC", &raw)?;
        }
        if let Ok(raw) = std::env::var("S2SQL_INJECT_DEFAULT_WINDOW") {
            config.inject_default_window = parse_bool("S2SQL_INJECT_DEFAULT_WINDOW", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: ResolverConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_floor", self.confidence_floor),
            ("fuzzy_token_threshold", self.fuzzy_token_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ResolveError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn parse_unit_interval(var: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ResolveError::Config(format!("{}: {}", var, e)))
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ResolveError::Config(format!("{}: expected a boolean, got '{}'", var, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_choose() {
        assert_eq!(DefaultPrecedence::RequestFirst.choose(Some(1), Some(2)), Some(1));
        assert_eq!(DefaultPrecedence::ClusterFirst.choose(Some(1), Some(2)), Some(2));
        assert_eq!(DefaultPrecedence::ClusterFirst.choose(Some(1), None), Some(1));
        assert_eq!(DefaultPrecedence::RequestFirst.choose::<u8>(None, None), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"confidence_floor": 0.75, "default_precedence": "cluster_first"}"#).unwrap();
        assert_eq!(config.confidence_floor, 0.75);
        assert_eq!(config.default_precedence, DefaultPrecedence::ClusterFirst);
        assert!(config.inject_default_metric);
        assert_eq!(config.fuzzy_token_threshold, 0.9);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = ResolverConfig {
            confidence_floor: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ResolveError::Config(_))));
    }

    #[test]
    fn test_env_overlay() {
        const VARS: [&str; 5] = [
            "S2SQL_CONFIDENCE_FLOOR",
            "S2SQL_FUZZY_TOKEN_THRESHOLD",
            "S2SQL_DEFAULT_PRECEDENCE",
            "S2SQL_INJECT_DEFAULT_METRIC",
            "S2SQL_INJECT_DEFAULT_WINDOW",
        ];
        let clear = || VARS.iter().for_each(|var| std::env::remove_var(var));

        clear();
        let config = ResolverConfig::from_env().unwrap();
        assert_eq!(config.confidence_floor, 0.6);
        assert_eq!(config.default_precedence, DefaultPrecedence::RequestFirst);

        std::env::set_var("S2SQL_CONFIDENCE_FLOOR", " 0.8 ");
        std::env::set_var("S2SQL_FUZZY_TOKEN_THRESHOLD", "0.95");
        std::env::set_var("S2SQL_DEFAULT_PRECEDENCE", "cluster");
        std::env::set_var("S2SQL_INJECT_DEFAULT_METRIC", "off");
        std::env::set_var("S2SQL_INJECT_DEFAULT_WINDOW", "No");
        let config = ResolverConfig::from_env().unwrap();
        assert_eq!(config.confidence_floor, 0.8);
        assert_eq!(config.fuzzy_token_threshold, 0.95);
        assert_eq!(config.default_precedence, DefaultPrecedence::ClusterFirst);
        assert!(!config.inject_default_metric);
        assert!(!config.inject_default_window);

        for (var, raw) in [
            ("S2SQL_CONFIDENCE_FLOOR", "high"),
            ("S2SQL_CONFIDENCE_FLOOR", "1.5"),
            ("S2SQL_DEFAULT_PRECEDENCE", "whichever"),
            ("S2SQL_INJECT_DEFAULT_WINDOW", "maybe"),
        ] {
            clear();
            std::env::set_var(var, raw);
            assert!(
                matches!(ResolverConfig::from_env(), Err(ResolveError::Config(_))),
                "{}={}",
                var,
                raw
            );
        }
        clear();
    }
}
