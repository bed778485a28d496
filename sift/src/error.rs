//! Error types for sift operations.

use std::path::PathBuf;

use crate::path::PropertyPath;
use crate::query::InvalidQuery;
use crate::resource::ResourceType;
use crate::schema::Operation;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unable to compile query predicate: {0}")]
    InvalidQuery(#[from] InvalidQuery),

    #[error("Invalid fields: {0}")]
    InvalidFields(String),

    #[error("Unsupported properties for {resource_type}: {}", join_paths(.properties))]
    UnsupportedProperties {
        resource_type: ResourceType,
        properties: Vec<PropertyPath>,
    },

    #[error("Operation '{operation}' is not supported for {resource_type} resources")]
    UnsupportedOperation {
        resource_type: ResourceType,
        operation: Operation,
    },

    #[error("Missing key property {key} for {resource_type}")]
    MissingKey {
        resource_type: ResourceType,
        key: PropertyPath,
    },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not initialized at {0}")]
    NotInitialized(PathBuf),

    #[error("Already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_paths(paths: &[PropertyPath]) -> String {
    paths
        .iter()
        .map(PropertyPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
