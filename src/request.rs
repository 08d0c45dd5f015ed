//! Request bundle
//!
//! The inbound question, the drafting request sent to the language model,
//! its SQL response and an opaque tool context. The resolver reads the
//! question, hint, defaults and SQL; everything else passes through.

use crate::semantic::cluster::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inbound user request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub user: Option<String>,
}

impl QueryRequest {
    pub fn new(query_text: &str) -> Self {
        Self {
            query_text: query_text.to_string(),
            chat_id: None,
            user: None,
        }
    }
}

/// Request the SQL draft was produced from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub question: String,
    /// Model cluster the caller believes the question belongs to
    #[serde(default)]
    pub cluster_hint: Option<String>,
    /// Earlier turns of the conversation, passed through
    #[serde(default)]
    pub prior_context: Vec<String>,
    /// Reference date for relative time windows
    pub current_date: NaiveDate,
    #[serde(default)]
    pub default_metric: Option<String>,
    #[serde(default)]
    pub default_window: Option<DateWindow>,
}

impl DraftRequest {
    pub fn new(question: &str, current_date: NaiveDate) -> Self {
        Self {
            question: question.to_string(),
            cluster_hint: None,
            prior_context: Vec::new(),
            current_date,
            default_metric: None,
            default_window: None,
        }
    }

    pub fn with_cluster_hint(mut self, cluster: &str) -> Self {
        self.cluster_hint = Some(cluster.to_string());
        self
    }

    pub fn with_default_metric(mut self, metric: &str) -> Self {
        self.default_metric = Some(metric.to_string());
        self
    }

    pub fn with_default_window(mut self, window: DateWindow) -> Self {
        self.default_window = Some(window);
        self
    }
}

/// SQL draft written over business names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResponse {
    pub sql: String,
}

impl DraftResponse {
    pub fn new(sql: &str) -> Self {
        Self { sql: sql.to_string() }
    }
}

/// Tool/agent selection context, never interpreted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentToolContext(pub serde_json::Value);

/// Everything one resolution call needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub query: QueryRequest,
    pub draft: DraftRequest,
    pub response: DraftResponse,
    #[serde(default)]
    pub tool: AgentToolContext,
}

impl ResolveRequest {
    /// Request whose inbound query text is the drafting question
    pub fn new(draft: DraftRequest, response: DraftResponse) -> Self {
        Self {
            query: QueryRequest::new(&draft.question),
            draft,
            response,
            tool: AgentToolContext::default(),
        }
    }
}
