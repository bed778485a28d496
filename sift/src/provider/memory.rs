//! In-process backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::{Backend, PropertyMap};
use crate::predicate::{evaluate, CompareOp, Comparison, Predicate};
use crate::resource::{Resource, ResourceType};
use crate::schema::{Identity, ResourceTypeSchema};
use crate::{Error, Result};

/// Resources held in memory, keyed by type and identity.
///
/// Evaluates single `=` comparisons on key properties itself; anything
/// else is left to the provider.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    resources: RwLock<HashMap<ResourceType, BTreeMap<Identity, Resource>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources of `resource_type`.
    pub fn len(&self, resource_type: ResourceType) -> usize {
        let guard = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(&resource_type).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, resource_type: ResourceType) -> bool {
        self.len(resource_type) == 0
    }
}

impl Backend for MemoryBackend {
    fn can_evaluate(&self, schema: &ResourceTypeSchema, predicate: &Predicate) -> bool {
        matches!(
            predicate,
            Predicate::Comparison(Comparison { path, op: CompareOp::Eq, .. }) if schema.is_key(path)
        )
    }

    fn fetch(&self, schema: &ResourceTypeSchema, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        let guard = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = guard.get(&schema.resource_type()) else {
            return Ok(Vec::new());
        };
        Ok(stored
            .values()
            .filter(|r| predicate.map_or(true, |p| evaluate(p, *r)))
            .cloned()
            .collect())
    }

    fn insert(&self, schema: &ResourceTypeSchema, resources: &[Resource]) -> Result<()> {
        let mut guard = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        let stored = guard.entry(schema.resource_type()).or_default();
        for resource in resources {
            stored.insert(schema.identity(resource), resource.clone());
        }
        Ok(())
    }

    fn update(
        &self,
        schema: &ResourceTypeSchema,
        targets: &[Resource],
        properties: &PropertyMap,
    ) -> Result<usize> {
        let mut guard = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        let stored = guard.entry(schema.resource_type()).or_default();
        // Applied to a copy so a collision leaves the stored set untouched
        let mut updated = stored.clone();
        let mut changed = 0;
        for target in targets {
            let old = schema.identity(target);
            let Some(mut resource) = updated.remove(&old) else {
                continue;
            };
            resource
                .properties
                .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            let new = schema.identity(&resource);
            if new != old && updated.contains_key(&new) {
                return Err(Error::Storage(format!(
                    "{} update would overwrite another resource with key {:?}",
                    schema.resource_type(),
                    new
                )));
            }
            updated.insert(new, resource);
            changed += 1;
        }
        *stored = updated;
        Ok(changed)
    }

    fn remove(&self, schema: &ResourceTypeSchema, targets: &[Resource]) -> Result<usize> {
        let mut guard = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = guard.get_mut(&schema.resource_type()) else {
            return Ok(0);
        };
        Ok(targets
            .iter()
            .filter(|t| stored.remove(&schema.identity(t)).is_some())
            .count())
    }
}
