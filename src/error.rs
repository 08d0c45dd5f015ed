use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Malformed draft SQL: {0}")]
    MalformedDraftSql(String),

    #[error("Draft query is ambiguous between model clusters: {}", .0.join(", "))]
    ClusterAmbiguous(Vec<String>),

    #[error("No model cluster resolves identifiers {identifiers:?}")]
    ClusterNotFound { identifiers: Vec<String> },

    #[error("Identifier '{identifier}' is not a metric or dimension of model cluster '{cluster}'")]
    UnresolvedIdentifier { identifier: String, cluster: String },

    #[error("Invalid derivation of metric '{metric}': {reason}")]
    InvalidMetricDerivation { metric: String, reason: String },

    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    #[error("Draft query resolves to no metrics or dimensions in model cluster '{0}'")]
    EmptyResolution(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error kind without payload, for callers that branch on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedDraftSql,
    ClusterAmbiguous,
    ClusterNotFound,
    UnresolvedIdentifier,
    InvalidMetricDerivation,
    InvalidTimeWindow,
    EmptyResolution,
    Catalog,
    Config,
    Io,
    Json,
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::MalformedDraftSql(_) => ErrorKind::MalformedDraftSql,
            ResolveError::ClusterAmbiguous(_) => ErrorKind::ClusterAmbiguous,
            ResolveError::ClusterNotFound { .. } => ErrorKind::ClusterNotFound,
            ResolveError::UnresolvedIdentifier { .. } => ErrorKind::UnresolvedIdentifier,
            ResolveError::InvalidMetricDerivation { .. } => ErrorKind::InvalidMetricDerivation,
            ResolveError::InvalidTimeWindow(_) => ErrorKind::InvalidTimeWindow,
            ResolveError::EmptyResolution(_) => ErrorKind::EmptyResolution,
            ResolveError::Catalog(_) => ErrorKind::Catalog,
            ResolveError::Config(_) => ErrorKind::Config,
            ResolveError::Io(_) => ErrorKind::Io,
            ResolveError::Json(_) => ErrorKind::Json,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
