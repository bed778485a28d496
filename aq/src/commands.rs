//! CLI command implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use sift::path::PropertyPath;
use sift::provider::{PropertyMap, ProviderEvent, ProviderObserver};
use sift::query;
use sift::{Config, Error, ProviderModule, QueryRequest, ResourceType, SchemaRegistry, Store};

use crate::render;

/// Logs every successful mutation.
struct LogObserver;

impl ProviderObserver for LogObserver {
    fn update(&self, event: &ProviderEvent) {
        log::info!(
            "{} {} {} ({} property set(s))",
            event.id,
            event.kind,
            event.resource_type,
            event.property_sets.len()
        );
    }
}

/// Open the configured store with a provider for every resource type.
fn open() -> sift::Result<(Config, SchemaRegistry, ProviderModule)> {
    let config = Config::load()?;
    let store = Arc::new(Store::open(&config)?);
    let registry = SchemaRegistry::cluster_management();
    let observers: Vec<Arc<dyn ProviderObserver>> = vec![Arc::new(LogObserver)];
    let providers = ProviderModule::new(&registry, store, config.or_split_limit, &observers);
    Ok((config, registry, providers))
}

pub fn init() -> sift::Result<()> {
    let config = Config::load()?;

    if config.db_path().exists() {
        println!("ambit already initialized at {}", config.root.display());
        return Ok(());
    }

    Store::initialize(&config)?;
    println!("ambit initialized at {}", config.root.display());
    println!("API root: {}", config.api_root);
    Ok(())
}

pub fn lex(query_str: &str) -> sift::Result<()> {
    for token in query::lex(query_str)? {
        println!("{}", token);
    }
    Ok(())
}

pub fn parse(query_str: &str, json: bool) -> sift::Result<()> {
    let predicate = query::compile(query_str)?;

    match (predicate, json) {
        (None, _) => println!("No predicate."),
        (Some(p), true) => println!("{}", serde_json::to_string_pretty(&p)?),
        (Some(p), false) => println!("{}", p),
    }
    Ok(())
}

pub fn check(resource_type: &str, paths: &[String]) -> sift::Result<()> {
    let resource_type: ResourceType = resource_type.parse()?;
    let registry = SchemaRegistry::cluster_management();
    let schema = registry.get(resource_type)?;

    let paths: Vec<PropertyPath> = paths.iter().map(PropertyPath::new).collect();
    let unsupported = schema.check_property_ids(&paths);
    if !unsupported.is_empty() {
        return Err(Error::UnsupportedProperties {
            resource_type,
            properties: unsupported.into_iter().collect(),
        });
    }

    println!("All {} path(s) supported by {}", paths.len(), resource_type);
    Ok(())
}

pub fn load(resource_type: &str, file: &str) -> sift::Result<()> {
    let resource_type: ResourceType = resource_type.parse()?;
    let contents = std::fs::read_to_string(file)?;
    let rows: Vec<BTreeMap<String, serde_json::Value>> = serde_json::from_str(&contents)?;

    let property_sets: Vec<PropertyMap> = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(path, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (PropertyPath::new(path), value)
                })
                .collect()
        })
        .collect();

    let (_, _, providers) = open()?;
    let status = providers.provider(resource_type)?.create(property_sets)?;
    println!("Loaded {} {} resource(s)", status.affected, resource_type);
    Ok(())
}

pub fn get(uri: &str, body_query: Option<&str>) -> sift::Result<()> {
    let (config, registry, providers) = open()?;

    let request = QueryRequest::new(uri, body_query)?.with_api_root(config.api_root.clone());
    let instance = request.instance()?;
    let tree = request.process(&providers, &registry, &instance)?;

    println!("{}", serde_json::to_string_pretty(&render::tree_to_json(&tree))?);
    Ok(())
}
