//! Result post-processing: per-type hooks that annotate resource nodes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::path::PropertyPath;
use crate::resource::ResourceType;
use crate::schema::{ResourceTypeSchema, SchemaRegistry};

use super::tree::{NodeId, ResultTree};

/// Hook run on every resource node of one type.
pub trait PostProcessor: Send + Sync {
    /// Annotate `node`; `href` is the link inherited from the nearest
    /// resource ancestor (or the request URI).
    fn process(&self, tree: &mut ResultTree, node: NodeId, href: &str);
}

/// Sets `href` from the inherited href and the resource's own key.
#[derive(Debug, Clone)]
pub struct HrefPostProcessor {
    key: PropertyPath,
}

impl HrefPostProcessor {
    pub fn new(key: PropertyPath) -> Self {
        Self { key }
    }
}

impl PostProcessor for HrefPostProcessor {
    fn process(&self, tree: &mut ResultTree, node: NodeId, href: &str) {
        let id = tree
            .resource(node)
            .and_then(|r| r.get(&self.key))
            .map(str::to_string);
        let parent = tree.parent(node);
        let parent_name = parent.and_then(|p| tree.name(p)).map(str::to_string);

        let base = strip_query(href).trim_end_matches('/');
        let link = match (id, parent, parent_name) {
            (Some(id), Some(parent), Some(_)) if tree.is_collection(parent) => {
                format!("{}/{}", base, id)
            }
            (Some(id), Some(_), Some(name)) => format!("{}/{}/{}", base, name, id),
            _ => href.to_string(),
        };
        tree.set_property(node, ResultTree::HREF, link);
    }
}

/// Links requests under their cluster, wherever they appear in the tree.
#[derive(Debug, Clone)]
pub struct RequestHrefPostProcessor {
    api_root: String,
}

impl RequestHrefPostProcessor {
    const CLUSTER: &'static str = "Requests/cluster_name";
    const ID: &'static str = "Requests/id";

    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
        }
    }
}

impl PostProcessor for RequestHrefPostProcessor {
    fn process(&self, tree: &mut ResultTree, node: NodeId, href: &str) {
        let Some(resource) = tree.resource(node) else {
            return;
        };
        let (Some(cluster), Some(id)) = (
            resource.get(&PropertyPath::new(Self::CLUSTER)),
            resource.get(&PropertyPath::new(Self::ID)),
        ) else {
            return;
        };

        let prefix = match href.find("/clusters/") {
            Some(i) => &href[..i],
            None => self.api_root.trim_end_matches('/'),
        };
        let link = format!("{}/clusters/{}/requests/{}", prefix, cluster, id);
        tree.set_property(node, ResultTree::HREF, link);
    }
}

/// Per-request registry of post-processing hooks, keyed by resource type.
pub struct ResultPostProcessor {
    processors: HashMap<ResourceType, Vec<Arc<dyn PostProcessor>>>,
}

impl ResultPostProcessor {
    /// Register hooks for `root` and every type reachable through declared
    /// sub-resources. Request hooks are always registered, since requests
    /// can be returned outside their place in the hierarchy.
    pub fn new(registry: &SchemaRegistry, root: ResourceType, api_root: &str) -> Self {
        let mut processors = HashMap::new();
        let mut seen = BTreeSet::new();
        let mut pending = vec![root];

        while let Some(resource_type) = pending.pop() {
            if !seen.insert(resource_type) {
                continue;
            }
            if let Ok(schema) = registry.get(resource_type) {
                processors.insert(resource_type, hooks_for(schema, api_root));
            }
            pending.extend(registry.sub_resources(resource_type).iter().rev());
        }

        processors.insert(
            ResourceType::Request,
            vec![Arc::new(RequestHrefPostProcessor::new(api_root)) as Arc<dyn PostProcessor>],
        );

        log::debug!(
            "registered post-processors for {} resource type(s) under {}",
            processors.len(),
            root
        );
        Self { processors }
    }

    pub fn is_registered(&self, resource_type: ResourceType) -> bool {
        self.processors.contains_key(&resource_type)
    }

    /// Add a hook for a type, after any already registered.
    pub fn register(&mut self, resource_type: ResourceType, processor: Arc<dyn PostProcessor>) {
        self.processors.entry(resource_type).or_default().push(processor);
    }

    /// Walk the tree in pre-order starting with `href` as the request URI.
    pub fn process(&self, tree: &mut ResultTree, href: &str) {
        let mut stack = vec![(tree.root(), href.to_string())];

        while let Some((node, href)) = stack.pop() {
            let child_href = match tree.resource(node).map(|r| r.resource_type) {
                Some(resource_type) => {
                    for processor in self.processors.get(&resource_type).into_iter().flatten() {
                        processor.process(tree, node, &href);
                    }
                    match tree.property(node, ResultTree::HREF) {
                        Some(own) => strip_query(own).to_string(),
                        None => href,
                    }
                }
                None => {
                    if tree.name(node).is_none() && tree.is_collection(node) {
                        tree.set_name(node, "items");
                        tree.set_property(node, ResultTree::HREF, href.clone());
                    }
                    href
                }
            };

            for &child in tree.children(node).iter().rev() {
                stack.push((child, child_href.clone()));
            }
        }
    }
}

fn hooks_for(schema: &ResourceTypeSchema, api_root: &str) -> Vec<Arc<dyn PostProcessor>> {
    if schema.resource_type() == ResourceType::Request {
        return vec![Arc::new(RequestHrefPostProcessor::new(api_root)) as Arc<dyn PostProcessor>];
    }
    match schema.own_key() {
        Some(key) => vec![Arc::new(HrefPostProcessor::new(key.clone())) as Arc<dyn PostProcessor>],
        None => Vec::new(),
    }
}

fn strip_query(href: &str) -> &str {
    href.split_once('?').map_or(href, |(path, _)| path)
}
