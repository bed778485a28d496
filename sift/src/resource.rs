//! Managed resources and their types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::path::PropertyPath;
use crate::predicate::PropertyBag;

/// Kinds of managed entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Cluster,
    Host,
    Service,
    Component,
    HostComponent,
    Request,
    Task,
    Configuration,
    User,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        ResourceType::Cluster,
        ResourceType::Host,
        ResourceType::Service,
        ResourceType::Component,
        ResourceType::HostComponent,
        ResourceType::Request,
        ResourceType::Task,
        ResourceType::Configuration,
        ResourceType::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Cluster => "Cluster",
            ResourceType::Host => "Host",
            ResourceType::Service => "Service",
            ResourceType::Component => "Component",
            ResourceType::HostComponent => "HostComponent",
            ResourceType::Request => "Request",
            ResourceType::Task => "Task",
            ResourceType::Configuration => "Configuration",
            ResourceType::User => "User",
        }
    }

    /// Collection name used in URIs and as the name of sub-resource nodes.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceType::Cluster => "clusters",
            ResourceType::Host => "hosts",
            ResourceType::Service => "services",
            ResourceType::Component => "components",
            ResourceType::HostComponent => "host_components",
            ResourceType::Request => "requests",
            ResourceType::Task => "tasks",
            ResourceType::Configuration => "configurations",
            ResourceType::User => "users",
        }
    }

    /// Look up a type by its collection name.
    pub fn from_plural(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.plural() == name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    /// Accepts the type name or its collection name, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().to_ascii_lowercase() == lower || t.plural() == lower)
            .ok_or_else(|| Error::UnknownResourceType(s.to_string()))
    }
}

/// A resource instance: its type plus a flat property bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: ResourceType,
    pub properties: BTreeMap<PropertyPath, String>,
}

impl Resource {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, path: impl Into<PropertyPath>, value: impl Into<String>) -> Self {
        self.set_property(path, value);
        self
    }

    pub fn set_property(&mut self, path: impl Into<PropertyPath>, value: impl Into<String>) {
        self.properties.insert(path.into(), value.into());
    }

    pub fn get(&self, path: &PropertyPath) -> Option<&str> {
        self.properties.get(path).map(String::as_str)
    }
}

impl PropertyBag for Resource {
    fn property(&self, path: &PropertyPath) -> Option<&str> {
        self.properties.property(path)
    }

    fn has_under(&self, category: &PropertyPath) -> bool {
        self.properties.has_under(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{evaluate, Predicate};

    #[test]
    fn test_parse_resource_type() {
        assert_eq!("host".parse::<ResourceType>().unwrap(), ResourceType::Host);
        assert_eq!("Hosts".parse::<ResourceType>().unwrap(), ResourceType::Host);
        assert_eq!(
            "host_components".parse::<ResourceType>().unwrap(),
            ResourceType::HostComponent
        );
        assert!(matches!(
            "widgets".parse::<ResourceType>(),
            Err(Error::UnknownResourceType(_))
        ));
    }

    #[test]
    fn test_from_plural() {
        assert_eq!(ResourceType::from_plural("requests"), Some(ResourceType::Request));
        assert_eq!(ResourceType::from_plural("Request"), None);
    }

    #[test]
    fn test_resource_as_property_bag() {
        let host = Resource::new(ResourceType::Host)
            .with_property("Hosts/host_name", "h1")
            .with_property("Hosts/cpu_count", "8");

        let pred = Predicate::and(
            Predicate::eq(PropertyPath::new("Hosts/host_name"), "h1"),
            Predicate::not(Predicate::CategoryIsEmpty(PropertyPath::new("Hosts"))),
        );
        assert!(evaluate(&pred, &host));
    }
}
