//! Mutation events emitted by observable providers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::PropertyMap;
use crate::predicate::Predicate;
use crate::resource::ResourceType;

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A successful mutation of one resource type.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier (UUIDv7, time-ordered).
    pub id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub resource_type: ResourceType,

    pub kind: EventKind,

    /// Predicate selecting the mutated resources (update and delete).
    pub predicate: Option<Predicate>,

    /// Property sets of the request (create and update).
    pub property_sets: Vec<PropertyMap>,
}

impl ProviderEvent {
    pub fn new(
        resource_type: ResourceType,
        kind: EventKind,
        predicate: Option<Predicate>,
        property_sets: Vec<PropertyMap>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            resource_type,
            kind,
            predicate,
            property_sets,
        }
    }
}

/// Receives provider events. Registered once at startup.
pub trait ProviderObserver: Send + Sync {
    fn update(&self, event: &ProviderEvent);
}
