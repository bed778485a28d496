//! Resource providers.
//!
//! A provider owns CRUD and filtering for one resource type. The generic
//! [`BackedProvider`] delegates storage to a [`Backend`] and applies the
//! read algorithm:
//!
//! 1. If the backend can evaluate the whole predicate, push it down.
//! 2. A top-level `Or` is split into one fetch per disjunct; results are
//!    merged by identity.
//! 3. For a top-level `And`, the conjuncts the backend can evaluate are
//!    pushed down.
//! 4. The full predicate is always re-applied locally, then results are
//!    projected onto the requested fields.

pub mod events;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::path::{FieldSpec, PropertyPath};
use crate::predicate::{evaluate, Predicate};
use crate::resource::{Resource, ResourceType};
use crate::schema::{Operation, ResourceTypeSchema, SchemaRegistry};
use crate::{Error, Result};

pub use events::{EventKind, ProviderEvent, ProviderObserver};
pub use memory::MemoryBackend;

/// Flat property set of a create or update request.
pub type PropertyMap = BTreeMap<PropertyPath, String>;

/// Default cap on per-disjunct fetches for a top-level `Or`.
pub const DEFAULT_OR_SPLIT_LIMIT: usize = 16;

/// Outcome of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestStatus {
    /// Number of resources created, updated or deleted.
    pub affected: usize,
}

impl RequestStatus {
    pub fn complete(affected: usize) -> Self {
        Self { affected }
    }
}

/// CRUD and filtering for one resource type.
pub trait ResourceProvider: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    fn schema(&self) -> &ResourceTypeSchema;

    fn create(&self, property_sets: Vec<PropertyMap>) -> Result<RequestStatus>;

    /// Resources matching `predicate` (all when `None`), projected onto `fields`.
    fn read(&self, predicate: Option<&Predicate>, fields: &FieldSpec) -> Result<Vec<Resource>>;

    fn update(&self, predicate: Option<&Predicate>, properties: PropertyMap) -> Result<RequestStatus>;

    fn delete(&self, predicate: Option<&Predicate>) -> Result<RequestStatus>;

    /// The subset of `paths` this provider does not support.
    fn check_property_ids(&self, paths: &BTreeSet<PropertyPath>) -> BTreeSet<PropertyPath> {
        self.schema().check_property_ids(paths)
    }
}

/// Storage a provider delegates to.
///
/// `fetch` must return at least every resource matching a predicate for
/// which `can_evaluate` answered true; it may return more.
pub trait Backend: Send + Sync {
    /// Whether `fetch` can filter by `predicate` itself.
    fn can_evaluate(&self, schema: &ResourceTypeSchema, predicate: &Predicate) -> bool;

    fn fetch(&self, schema: &ResourceTypeSchema, predicate: Option<&Predicate>) -> Result<Vec<Resource>>;

    /// Insert resources, replacing any with the same identity.
    fn insert(&self, schema: &ResourceTypeSchema, resources: &[Resource]) -> Result<()>;

    /// Apply `properties` to each of `targets`. Returns the number changed.
    fn update(
        &self,
        schema: &ResourceTypeSchema,
        targets: &[Resource],
        properties: &PropertyMap,
    ) -> Result<usize>;

    /// Remove `targets`. Returns the number removed.
    fn remove(&self, schema: &ResourceTypeSchema, targets: &[Resource]) -> Result<usize>;
}

/// A provider over any [`Backend`].
pub struct BackedProvider<B> {
    schema: ResourceTypeSchema,
    backend: Arc<B>,
    or_split_limit: usize,
    observers: Vec<Arc<dyn ProviderObserver>>,
}

impl<B: Backend> BackedProvider<B> {
    pub fn new(schema: ResourceTypeSchema, backend: Arc<B>) -> Self {
        Self {
            schema,
            backend,
            or_split_limit: DEFAULT_OR_SPLIT_LIMIT,
            observers: Vec::new(),
        }
    }

    pub fn with_or_split_limit(mut self, limit: usize) -> Self {
        self.or_split_limit = limit;
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ProviderObserver>) {
        self.observers.push(observer);
    }

    fn notify(&self, event: ProviderEvent) {
        log::debug!(
            "{} {} event {} to {} observer(s)",
            event.resource_type,
            event.kind,
            event.id,
            self.observers.len()
        );
        for observer in &self.observers {
            observer.update(&event);
        }
    }

    /// The part of `predicate` the backend can evaluate.
    fn pushdown(&self, predicate: &Predicate) -> Option<Predicate> {
        if self.backend.can_evaluate(&self.schema, predicate) {
            return Some(predicate.clone());
        }
        match predicate {
            Predicate::And(conjuncts) => Predicate::all(
                conjuncts
                    .iter()
                    .filter(|c| self.backend.can_evaluate(&self.schema, c))
                    .cloned(),
            ),
            _ => None,
        }
    }

    /// Fetch candidates for `predicate`; they still need local filtering.
    fn candidates(&self, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        let Some(predicate) = predicate else {
            return self.backend.fetch(&self.schema, None);
        };

        if self.backend.can_evaluate(&self.schema, predicate) {
            log::trace!("{}: pushing down {}", self.schema.resource_type(), predicate);
            return self.backend.fetch(&self.schema, Some(predicate));
        }

        match predicate {
            Predicate::Or(disjuncts) if disjuncts.len() <= self.or_split_limit => {
                let pushed: Vec<Option<Predicate>> =
                    disjuncts.iter().map(|d| self.pushdown(d)).collect();

                // One unfiltered disjunct means every resource is a candidate
                if pushed.iter().any(Option::is_none) {
                    log::trace!(
                        "{}: disjunct not evaluable by backend, fetching all",
                        self.schema.resource_type()
                    );
                    return self.backend.fetch(&self.schema, None);
                }

                log::trace!(
                    "{}: splitting Or into {} fetches",
                    self.schema.resource_type(),
                    pushed.len()
                );
                let mut merged = Vec::new();
                let mut seen = HashSet::new();
                for disjunct in pushed.iter().flatten() {
                    for resource in self.backend.fetch(&self.schema, Some(disjunct))? {
                        let identity = self.schema.identity(&resource);
                        let is_new = if identity.iter().all(Option::is_none) {
                            !merged.contains(&resource)
                        } else {
                            seen.insert(identity)
                        };
                        if is_new {
                            merged.push(resource);
                        }
                    }
                }
                Ok(merged)
            }
            Predicate::Or(disjuncts) => {
                log::debug!(
                    "{}: Or of {} disjuncts exceeds split limit {}, fetching all",
                    self.schema.resource_type(),
                    disjuncts.len(),
                    self.or_split_limit
                );
                self.backend.fetch(&self.schema, None)
            }
            other => {
                let pushed = self.pushdown(other);
                self.backend.fetch(&self.schema, pushed.as_ref())
            }
        }
    }

    /// Every stored resource matching `predicate`, unprojected.
    fn select(&self, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        let mut resources = self.candidates(predicate)?;
        if let Some(predicate) = predicate {
            resources.retain(|r| evaluate(predicate, r));
        }
        Ok(resources)
    }

    fn project(&self, mut resource: Resource, fields: &FieldSpec) -> Resource {
        if !fields.is_empty() {
            resource
                .properties
                .retain(|path, _| fields.selects(path) || self.schema.is_key(path));
        }
        resource
    }

    fn check_supported(&self, paths: &BTreeSet<PropertyPath>) -> Result<()> {
        let unsupported = self.schema.check_property_ids(paths);
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(Error::UnsupportedProperties {
                resource_type: self.schema.resource_type(),
                properties: unsupported.into_iter().collect(),
            })
        }
    }
}

impl<B: Backend> ResourceProvider for BackedProvider<B> {
    fn resource_type(&self) -> ResourceType {
        self.schema.resource_type()
    }

    fn schema(&self) -> &ResourceTypeSchema {
        &self.schema
    }

    fn create(&self, property_sets: Vec<PropertyMap>) -> Result<RequestStatus> {
        self.schema.require(Operation::Create)?;

        let mut resources = Vec::with_capacity(property_sets.len());
        for properties in &property_sets {
            let paths: BTreeSet<_> = properties.keys().cloned().collect();
            self.check_supported(&paths)?;
            if let Some(key) = self.schema.own_key() {
                if !properties.contains_key(key) {
                    return Err(Error::MissingKey {
                        resource_type: self.schema.resource_type(),
                        key: key.clone(),
                    });
                }
            }
            resources.push(Resource {
                resource_type: self.schema.resource_type(),
                properties: properties.clone(),
            });
        }

        self.backend.insert(&self.schema, &resources)?;
        self.notify(ProviderEvent::new(
            self.schema.resource_type(),
            EventKind::Create,
            None,
            property_sets,
        ));
        Ok(RequestStatus::complete(resources.len()))
    }

    fn read(&self, predicate: Option<&Predicate>, fields: &FieldSpec) -> Result<Vec<Resource>> {
        let resources = self.select(predicate)?;
        log::debug!(
            "{}: read {} resource(s)",
            self.schema.resource_type(),
            resources.len()
        );
        Ok(resources
            .into_iter()
            .map(|r| self.project(r, fields))
            .collect())
    }

    fn update(&self, predicate: Option<&Predicate>, properties: PropertyMap) -> Result<RequestStatus> {
        self.schema.require(Operation::Update)?;
        let paths: BTreeSet<_> = properties.keys().cloned().collect();
        self.check_supported(&paths)?;

        let targets = self.select(predicate)?;
        let affected = self.backend.update(&self.schema, &targets, &properties)?;
        self.notify(ProviderEvent::new(
            self.schema.resource_type(),
            EventKind::Update,
            predicate.cloned(),
            vec![properties],
        ));
        Ok(RequestStatus::complete(affected))
    }

    fn delete(&self, predicate: Option<&Predicate>) -> Result<RequestStatus> {
        self.schema.require(Operation::Delete)?;

        let targets = self.select(predicate)?;
        let affected = self.backend.remove(&self.schema, &targets)?;
        self.notify(ProviderEvent::new(
            self.schema.resource_type(),
            EventKind::Delete,
            predicate.cloned(),
            Vec::new(),
        ));
        Ok(RequestStatus::complete(affected))
    }
}

/// The process-wide provider for every registered resource type.
pub struct ProviderModule {
    providers: BTreeMap<ResourceType, Arc<dyn ResourceProvider>>,
}

impl ProviderModule {
    /// Build a [`BackedProvider`] over `backend` for every type in `registry`.
    pub fn new<B: Backend + 'static>(
        registry: &SchemaRegistry,
        backend: Arc<B>,
        or_split_limit: usize,
        observers: &[Arc<dyn ProviderObserver>],
    ) -> Self {
        let providers = registry
            .schemas()
            .map(|schema| {
                let mut provider = BackedProvider::new(schema.clone(), Arc::clone(&backend))
                    .with_or_split_limit(or_split_limit);
                for observer in observers {
                    provider.add_observer(Arc::clone(observer));
                }
                let provider: Arc<dyn ResourceProvider> = Arc::new(provider);
                (schema.resource_type(), provider)
            })
            .collect();
        Self { providers }
    }

    pub fn from_providers(providers: impl IntoIterator<Item = Arc<dyn ResourceProvider>>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.resource_type(), p))
                .collect(),
        }
    }

    pub fn provider(&self, resource_type: ResourceType) -> Result<&Arc<dyn ResourceProvider>> {
        self.providers
            .get(&resource_type)
            .ok_or_else(|| Error::UnknownResourceType(resource_type.to_string()))
    }
}
