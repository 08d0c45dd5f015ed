pub mod cluster_selector;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fuzzy_matcher;
pub mod linking;
pub mod request;
pub mod semantic;
pub mod snapshot;
pub mod sql_binder;

pub use cluster_selector::{ClusterScore, ClusterSelector};
pub use config::{DefaultPrecedence, ResolverConfig};
pub use coordinator::{ParseResult, ResolutionCoordinator};
pub use error::{ErrorKind, ResolveError, Result};
pub use linking::{ElementValue, EntityLinker, EntityValueIndex, MatchKind, ValueDomain};
pub use request::{AgentToolContext, DraftRequest, DraftResponse, QueryRequest, ResolveRequest};
pub use semantic::{
    Aggregation, DateWindow, Dimension, Metric, MetricType, ModelCluster, SemanticCatalog, SemanticItem, TimeGrain,
    ValueType,
};
pub use snapshot::{SemanticSnapshot, SnapshotStore};
pub use sql_binder::{parse_draft, BindContext, BoundQuery, DefaultSubstitution, SqlBinder, ValueSubstitution};
