//! Resource-type schemas.
//!
//! Each resource type declares the property paths it knows about, the key
//! properties that identify it (and its ancestors), the sub-resource types
//! that appear beneath it in a result tree, and the mutations it supports.
//!
//! The registry is built once at startup and only read afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::path::PropertyPath;
use crate::predicate::Predicate;
use crate::resource::{Resource, ResourceType};
use crate::{Error, Result};

/// Provider operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resource: its key property values in key order.
pub type Identity = Vec<Option<String>>;

/// Known properties, keys and sub-resources of one resource type.
#[derive(Debug, Clone)]
pub struct ResourceTypeSchema {
    resource_type: ResourceType,
    property_ids: BTreeSet<PropertyPath>,
    key_property_ids: BTreeMap<ResourceType, PropertyPath>,
    /// Categories whose children are open-ended (arbitrary map keys).
    dynamic_categories: BTreeSet<PropertyPath>,
    sub_resources: Vec<ResourceType>,
    unsupported: BTreeSet<Operation>,
}

impl ResourceTypeSchema {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            property_ids: BTreeSet::new(),
            key_property_ids: BTreeMap::new(),
            dynamic_categories: BTreeSet::new(),
            sub_resources: Vec::new(),
            unsupported: BTreeSet::new(),
        }
    }

    /// Declare the property identifying `owner`. Key properties are also
    /// known properties.
    pub fn key(mut self, owner: ResourceType, path: &str) -> Self {
        let path = PropertyPath::new(path);
        self.property_ids.insert(path.clone());
        self.key_property_ids.insert(owner, path);
        self
    }

    pub fn properties<'a>(mut self, paths: impl IntoIterator<Item = &'a str>) -> Self {
        self.property_ids.extend(paths.into_iter().map(PropertyPath::new));
        self
    }

    pub fn dynamic_category(mut self, path: &str) -> Self {
        self.dynamic_categories.insert(PropertyPath::new(path));
        self
    }

    pub fn sub_resources(mut self, types: impl IntoIterator<Item = ResourceType>) -> Self {
        self.sub_resources.extend(types);
        self
    }

    pub fn unsupported(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.unsupported.extend(operations);
        self
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn property_ids(&self) -> &BTreeSet<PropertyPath> {
        &self.property_ids
    }

    pub fn key_property_ids(&self) -> &BTreeMap<ResourceType, PropertyPath> {
        &self.key_property_ids
    }

    /// The property identifying a resource of `owner` type, if this schema
    /// carries one.
    pub fn key_for(&self, owner: ResourceType) -> Option<&PropertyPath> {
        self.key_property_ids.get(&owner)
    }

    /// This type's own key property.
    pub fn own_key(&self) -> Option<&PropertyPath> {
        self.key_for(self.resource_type)
    }

    pub fn is_key(&self, path: &PropertyPath) -> bool {
        self.key_property_ids.values().any(|k| k == path)
    }

    pub fn sub_resource_types(&self) -> &[ResourceType] {
        &self.sub_resources
    }

    pub fn supports(&self, operation: Operation) -> bool {
        !self.unsupported.contains(&operation)
    }

    /// Fail with `UnsupportedOperation` unless `operation` is supported.
    pub fn require(&self, operation: Operation) -> Result<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation {
                resource_type: self.resource_type,
                operation,
            })
        }
    }

    /// Return the subset of `paths` this schema does not support.
    pub fn check_property_ids<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a PropertyPath>,
    ) -> BTreeSet<PropertyPath> {
        paths
            .into_iter()
            .filter(|path| !self.is_supported(path))
            .cloned()
            .collect()
    }

    fn is_supported(&self, path: &PropertyPath) -> bool {
        if self.property_ids.contains(path) {
            return true;
        }
        // A bare category of a known property
        if self.property_ids.iter().any(|known| path.is_category_of(known)) {
            return true;
        }
        // A key of a map-valued property
        if let Some(parent) = path.category() {
            if self.property_ids.contains(&parent) {
                return true;
            }
        }
        self.dynamic_categories.iter().any(|cat| cat.contains(path))
    }

    /// Key property values of `resource`, in key order.
    pub fn identity(&self, resource: &Resource) -> Identity {
        self.key_property_ids
            .values()
            .map(|path| resource.get(path).map(str::to_string))
            .collect()
    }

    /// Equalities that restrict resources of this type to those beneath
    /// `parent`, built from the keys both schemas share.
    pub fn parent_constraint(&self, parent: &ResourceTypeSchema, resource: &Resource) -> Option<Predicate> {
        let equalities = self
            .key_property_ids
            .iter()
            .filter(|(owner, _)| **owner != self.resource_type)
            .filter_map(|(owner, path)| {
                let value = parent.key_for(*owner).and_then(|p| resource.get(p))?;
                Some(Predicate::eq(path.clone(), value))
            });
        Predicate::all(equalities)
    }
}

/// All resource-type schemas known to the process.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<ResourceType, ResourceTypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ResourceTypeSchema) {
        self.schemas.insert(schema.resource_type(), schema);
    }

    pub fn with(mut self, schema: ResourceTypeSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, resource_type: ResourceType) -> Result<&ResourceTypeSchema> {
        self.schemas
            .get(&resource_type)
            .ok_or_else(|| Error::UnknownResourceType(resource_type.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.schemas.keys().copied()
    }

    pub fn schemas(&self) -> impl Iterator<Item = &ResourceTypeSchema> {
        self.schemas.values()
    }

    /// Declared sub-resource types of `resource_type`; empty when unknown.
    pub fn sub_resources(&self, resource_type: ResourceType) -> &[ResourceType] {
        self.schemas
            .get(&resource_type)
            .map(ResourceTypeSchema::sub_resource_types)
            .unwrap_or(&[])
    }

    /// Schemas for a cluster-management server.
    pub fn cluster_management() -> Self {
        use Operation::*;
        use ResourceType::*;

        Self::new()
            .with(
                ResourceTypeSchema::new(Cluster)
                    .key(Cluster, "Clusters/cluster_name")
                    .properties([
                        "Clusters/cluster_id",
                        "Clusters/version",
                        "Clusters/total_hosts",
                    ])
                    .sub_resources([Service, Host, Configuration, Request]),
            )
            .with(
                ResourceTypeSchema::new(Host)
                    .key(Cluster, "Hosts/cluster_name")
                    .key(Host, "Hosts/host_name")
                    .properties([
                        "Hosts/ip",
                        "Hosts/cpu_count",
                        "Hosts/total_mem",
                        "Hosts/os_type",
                        "Hosts/rack_info",
                        "Hosts/host_status",
                        "Hosts/last_heartbeat_time",
                        "metrics/cpu/cpu_user",
                        "metrics/cpu/cpu_system",
                        "metrics/memory/mem_free",
                        "metrics/load/load_one",
                    ])
                    .sub_resources([HostComponent]),
            )
            .with(
                ResourceTypeSchema::new(Service)
                    .key(Cluster, "ServiceInfo/cluster_name")
                    .key(Service, "ServiceInfo/service_name")
                    .properties(["ServiceInfo/state", "ServiceInfo/maintenance_state"])
                    .sub_resources([Component]),
            )
            .with(
                ResourceTypeSchema::new(Component)
                    .key(Cluster, "ServiceComponentInfo/cluster_name")
                    .key(Service, "ServiceComponentInfo/service_name")
                    .key(Component, "ServiceComponentInfo/component_name")
                    .properties([
                        "ServiceComponentInfo/state",
                        "ServiceComponentInfo/category",
                    ])
                    .sub_resources([HostComponent]),
            )
            .with(
                ResourceTypeSchema::new(HostComponent)
                    .key(Cluster, "HostRoles/cluster_name")
                    .key(Service, "HostRoles/service_name")
                    .key(Component, "HostRoles/component_name")
                    .key(Host, "HostRoles/host_name")
                    // addressed by component name beneath a host
                    .key(HostComponent, "HostRoles/component_name")
                    .properties([
                        "HostRoles/state",
                        "HostRoles/desired_state",
                        "HostRoles/stack_id",
                        "HostRoles/desired_stack_id",
                        "HostRoles/ha_status",
                        "HostRoles/configs",
                    ])
                    .dynamic_category("config"),
            )
            .with(
                ResourceTypeSchema::new(Request)
                    .key(Cluster, "Requests/cluster_name")
                    .key(Request, "Requests/id")
                    .properties(["Requests/request_context", "Requests/request_status"])
                    .sub_resources([Task])
                    .unsupported([Update, Delete]),
            )
            .with(
                ResourceTypeSchema::new(Task)
                    .key(Cluster, "Tasks/cluster_name")
                    .key(Request, "Tasks/request_id")
                    .key(Task, "Tasks/id")
                    .properties([
                        "Tasks/host_name",
                        "Tasks/role",
                        "Tasks/command",
                        "Tasks/status",
                        "Tasks/exit_code",
                        "Tasks/stdout",
                        "Tasks/stderr",
                        "Tasks/start_time",
                        "Tasks/end_time",
                    ])
                    .unsupported([Create, Update, Delete]),
            )
            .with(
                ResourceTypeSchema::new(Configuration)
                    .key(Cluster, "Config/cluster_name")
                    .key(Configuration, "Config/tag")
                    .properties(["Config/type", "properties"])
                    .dynamic_category("properties")
                    .unsupported([Update, Delete]),
            )
            .with(
                ResourceTypeSchema::new(User)
                    .key(User, "Users/user_name")
                    .properties(["Users/password", "Users/roles", "Users/ldap_user"]),
            )
    }
}
