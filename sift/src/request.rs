//! Query requests: from a URI and optional body query to a result tree.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::path::{FieldSpec, PropertyPath};
use crate::predicate::Predicate;
use crate::provider::ProviderModule;
use crate::query;
use crate::resource::ResourceType;
use crate::result::{assemble, ResultPostProcessor, ResultTree};
use crate::schema::{ResourceTypeSchema, SchemaRegistry};
use crate::{Error, Result};

/// The resource (or collection) a URI addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInstance {
    /// Type of the addressed resources.
    pub resource_type: ResourceType,
    /// Identifying ids taken from the URI, by the type they identify.
    pub ids: BTreeMap<ResourceType, String>,
    /// Whether the URI ends in a collection name rather than an id.
    pub collection: bool,
}

impl ResourceInstance {
    pub fn collection(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            ids: BTreeMap::new(),
            collection: true,
        }
    }

    pub fn single(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            ids: BTreeMap::from([(resource_type, id.into())]),
            collection: false,
        }
    }

    /// Add an enclosing resource's id.
    pub fn with_id(mut self, owner: ResourceType, id: impl Into<String>) -> Self {
        self.ids.insert(owner, id.into());
        self
    }

    /// Parse a URI such as `/api/v1/clusters/c1/hosts/h1?fields=...`.
    ///
    /// A scheme and authority are dropped, then `api_root` when the path
    /// starts with it. The remainder alternates collection names and ids.
    pub fn from_uri(uri: &str, api_root: &str) -> Result<Self> {
        let path = strip_query(uri);
        let path = match path.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
            None => path,
        };
        let root = api_root.trim_end_matches('/');
        let path = if root.is_empty() {
            path
        } else {
            path.strip_prefix(root).unwrap_or(path)
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut ids = BTreeMap::new();
        let mut target = None;
        let mut collection = true;

        for pair in segments.chunks(2) {
            let resource_type = ResourceType::from_plural(pair[0])
                .ok_or_else(|| Error::UnknownResourceType(pair[0].to_string()))?;
            match pair.get(1) {
                Some(id) => {
                    let id = urlencoding::decode(id)
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| id.to_string());
                    ids.insert(resource_type, id);
                    collection = false;
                }
                None => collection = true,
            }
            target = Some(resource_type);
        }

        let resource_type =
            target.ok_or_else(|| Error::NotFound(format!("no resource addressed by '{}'", uri)))?;
        Ok(Self {
            resource_type,
            ids,
            collection,
        })
    }

    /// Equalities pinning the URI ids to `schema`'s key properties.
    pub fn id_predicate(&self, schema: &ResourceTypeSchema) -> Result<Option<Predicate>> {
        Ok(Predicate::all(self.id_equalities(schema)?))
    }

    /// The id equalities and `predicate` as one flat conjunction, so each
    /// key equality stays visible to backend pushdown.
    pub fn scope(
        &self,
        schema: &ResourceTypeSchema,
        predicate: Option<Predicate>,
    ) -> Result<Option<Predicate>> {
        Ok(Predicate::all(self.id_equalities(schema)?.into_iter().chain(predicate)))
    }

    fn id_equalities(&self, schema: &ResourceTypeSchema) -> Result<Vec<Predicate>> {
        self.ids
            .iter()
            .map(|(owner, id)| {
                let key = schema.key_for(*owner).ok_or_else(|| {
                    Error::NotFound(format!(
                        "{} resources are not addressable beneath {} '{}'",
                        schema.resource_type(),
                        owner,
                        id
                    ))
                })?;
                Ok(Predicate::eq(key.clone(), id.as_str()))
            })
            .collect()
    }
}

/// A read request: target URI plus its query string.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    uri: String,
    query: String,
    fields: FieldSpec,
    api_root: String,
}

impl QueryRequest {
    /// The predicate query is `body_query` when given, otherwise the URI's
    /// `?...` part. Fields are always read from the URI. Both are
    /// percent-decoded before use.
    pub fn new(uri: impl Into<String>, body_query: Option<&str>) -> Result<Self> {
        let uri = uri.into();
        let uri_query = decode(uri.split_once('?').map_or("", |(_, q)| q))?;
        let fields = FieldSpec::from_query(&uri_query)?;
        let query = match body_query {
            Some(body) => decode(body)?,
            None => uri_query,
        };

        Ok(Self {
            uri,
            query,
            fields,
            api_root: "/api/v1".to_string(),
        })
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The decoded query string.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fields(&self) -> &FieldSpec {
        &self.fields
    }

    /// The resource the URI addresses.
    pub fn instance(&self) -> Result<ResourceInstance> {
        ResourceInstance::from_uri(&self.uri, &self.api_root)
    }

    /// Compile the query into a predicate.
    pub fn predicate(&self) -> Result<Option<Predicate>> {
        Ok(query::compile(&self.query)?)
    }

    /// Run the request against `providers` and build the result tree.
    pub fn process(
        &self,
        providers: &ProviderModule,
        registry: &SchemaRegistry,
        instance: &ResourceInstance,
    ) -> Result<ResultTree> {
        let schema = registry.get(instance.resource_type)?;
        let provider = providers.provider(instance.resource_type)?;
        let predicate = self.predicate()?;
        let (own_fields, mut sub_fields) =
            split_sub_resource_fields(&self.fields, registry, instance.resource_type);

        let mut requested: BTreeSet<PropertyPath> = predicate
            .iter()
            .flat_map(Predicate::property_paths)
            .collect();
        requested.extend(own_fields.paths().cloned());
        check_supported(providers, instance.resource_type, &requested)?;

        for (sub_type, fields) in sub_fields.iter_mut() {
            if fields.is_empty() {
                continue;
            }
            check_supported(providers, *sub_type, &fields.paths().cloned().collect::<BTreeSet<_>>())?;
            // keys are needed to link each sub-resource
            for key in registry.get(*sub_type)?.key_property_ids().values() {
                fields.insert(key.clone(), None);
            }
        }

        // only sub-resource fields requested: the resource itself shows its keys
        let own_fields = if own_fields.is_empty() && !sub_fields.is_empty() {
            key_fields(schema)
        } else {
            own_fields
        };

        let filter = instance.scope(schema, predicate)?;
        let resources = provider.read(filter.as_ref(), &own_fields)?;
        log::debug!(
            "{} {} resource(s) matched {}",
            resources.len(),
            instance.resource_type,
            filter.as_ref().map_or_else(|| "no predicate".to_string(), |p| p.to_string())
        );

        if !instance.collection && resources.is_empty() {
            return Err(Error::NotFound(format!(
                "{} resource not found: {}",
                instance.resource_type,
                strip_query(&self.uri)
            )));
        }

        let mut tree = assemble(instance, registry, resources, |sub_type, constraint| {
            let keys;
            let fields = match sub_fields.get(&sub_type) {
                Some(fields) => fields,
                None => {
                    keys = key_fields(registry.get(sub_type)?);
                    &keys
                }
            };
            providers.provider(sub_type)?.read(constraint, fields)
        })?;

        ResultPostProcessor::new(registry, instance.resource_type, &self.api_root)
            .process(&mut tree, &self.uri);
        Ok(tree)
    }
}

fn decode(raw: &str) -> Result<String> {
    Ok(urlencoding::decode(raw)
        .map_err(|e| Error::InvalidQuery(query::InvalidQuery::lex(e.to_string())))?
        .into_owned())
}

fn check_supported(
    providers: &ProviderModule,
    resource_type: ResourceType,
    paths: &BTreeSet<PropertyPath>,
) -> Result<()> {
    let unsupported = providers.provider(resource_type)?.check_property_ids(paths);
    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(Error::UnsupportedProperties {
            resource_type,
            properties: unsupported.into_iter().collect(),
        })
    }
}

/// Separate fields addressed to declared sub-resources, such as
/// `host_components/HostRoles/state` or `host_components/*`, from the
/// resource's own fields. An empty sub-resource spec selects everything.
fn split_sub_resource_fields(
    fields: &FieldSpec,
    registry: &SchemaRegistry,
    resource_type: ResourceType,
) -> (FieldSpec, BTreeMap<ResourceType, FieldSpec>) {
    let subs = registry.sub_resources(resource_type);
    let mut own = FieldSpec::new();
    let mut nested: BTreeMap<ResourceType, FieldSpec> = BTreeMap::new();
    let mut whole = BTreeSet::new();

    for (path, temporal) in fields.iter() {
        let mut segments = path.segments();
        let sub_type = segments
            .next()
            .and_then(ResourceType::from_plural)
            .filter(|t| subs.contains(t));
        match sub_type {
            Some(sub_type) => {
                let rest = PropertyPath::from_segments(segments);
                let spec = nested.entry(sub_type).or_default();
                if rest.is_empty() {
                    whole.insert(sub_type);
                } else {
                    spec.insert(rest, temporal.copied());
                }
            }
            None => own.insert(path.clone(), temporal.copied()),
        }
    }

    for sub_type in whole {
        nested.insert(sub_type, FieldSpec::new());
    }
    (own, nested)
}

/// Sub-resources are returned with their key properties only.
fn key_fields(schema: &ResourceTypeSchema) -> FieldSpec {
    let mut fields = FieldSpec::new();
    for key in schema.key_property_ids().values() {
        fields.insert(key.clone(), None);
    }
    fields
}

fn strip_query(uri: &str) -> &str {
    uri.split_once('?').map_or(uri, |(path, _)| path)
}

/// HTTP-style outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultStatus {
    pub code: u16,
    pub message: String,
}

impl ResultStatus {
    pub fn ok() -> Self {
        Self {
            code: 200,
            message: "OK".to_string(),
        }
    }

    pub fn from_error(error: &Error) -> Self {
        let code = match error {
            Error::InvalidQuery(_)
            | Error::UnsupportedProperties { .. }
            | Error::InvalidFields(_) => 400,
            Error::UnsupportedOperation { .. } => 405,
            Error::NotFound(_) => 404,
            _ => 500,
        };
        Self {
            code,
            message: error.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.code >= 400
    }
}
