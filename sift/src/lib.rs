//! sift: query predicates and result trees for cluster-management APIs.
//!
//! Compiles URL query strings into predicates, filters resources through
//! pluggable providers (in memory or DuckDB), and assembles the matching
//! resources into hierarchical result trees with hrefs.

pub mod config;
pub mod error;
pub mod path;
pub mod predicate;
pub mod provider;
pub mod query;
pub mod request;
pub mod resource;
pub mod result;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use path::{FieldSpec, PropertyPath, TemporalInfo};
pub use predicate::{evaluate, CompareOp, Comparison, Predicate};
pub use provider::{BackedProvider, Backend, MemoryBackend, ProviderModule, ResourceProvider};
pub use query::{compile, InvalidQuery, InvalidQueryKind};
pub use request::{QueryRequest, ResourceInstance, ResultStatus};
pub use resource::{Resource, ResourceType};
pub use result::{ResultPostProcessor, ResultTree};
pub use schema::{Operation, ResourceTypeSchema, SchemaRegistry};
pub use store::Store;
