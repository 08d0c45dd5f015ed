//! Semantic Dimension Definition
//!
//! Defines the structure of dimensions in a model cluster.

use serde::{Deserialize, Serialize};

/// Dimension value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Categorical,
    Numeric,
    Time,
}

impl ValueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "categorical" | "string" | "enum" => Some(ValueType::Categorical),
            "numeric" | "integer" | "decimal" => Some(ValueType::Numeric),
            "time" | "date" => Some(ValueType::Time),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Categorical => "categorical",
            ValueType::Numeric => "numeric",
            ValueType::Time => "time",
        }
    }
}

/// Semantic dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Canonical identifier, unique within the cluster; also the physical column name
    pub name: String,
    /// Business display name
    pub display_name: String,
    /// Business aliases, matched case-insensitively
    #[serde(default)]
    pub aliases: Vec<String>,
    pub value_type: ValueType,
    /// Enumerated value domain fed to the entity value index
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl Dimension {
    pub fn new(name: &str, display_name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            aliases: Vec::new(),
            value_type,
            values: Vec::new(),
            description: String::new(),
        }
    }

    pub fn categorical(name: &str, display_name: &str) -> Self {
        Self::new(name, display_name, ValueType::Categorical)
    }

    pub fn time(name: &str, display_name: &str) -> Self {
        Self::new(name, display_name, ValueType::Time)
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn is_time(&self) -> bool {
        self.value_type == ValueType::Time
    }

    /// Every term this dimension answers to: canonical name, display name, aliases
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(std::iter::once(self.display_name.as_str()))
            .chain(self.aliases.iter().map(|a| a.as_str()))
            .filter(|t| !t.trim().is_empty())
    }
}
