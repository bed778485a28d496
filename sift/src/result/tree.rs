//! Arena-backed result tree.
//!
//! Nodes own their children through index lists; the parent link is a
//! plain index, so the tree never holds a reference cycle.

use std::collections::BTreeMap;

use crate::resource::Resource;

/// Handle to a node of a [`ResultTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct Node {
    name: Option<String>,
    resource: Option<Resource>,
    properties: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Hierarchical response: resource nodes and structural grouping nodes.
#[derive(Debug, Clone)]
pub struct ResultTree {
    nodes: Vec<Node>,
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultTree {
    /// Property marking a structural node as the wrapper of a collection.
    pub const IS_COLLECTION: &'static str = "isCollection";

    /// Property holding a node's link.
    pub const HREF: &'static str = "href";

    /// A tree holding only an unnamed root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Append a child to `parent`, after its existing children.
    pub fn add_child(&mut self, parent: NodeId, name: Option<&str>, resource: Option<Resource>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.map(str::to_string),
            resource,
            properties: BTreeMap::new(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append a structural node wrapping a collection.
    pub fn add_collection(&mut self, parent: NodeId, name: Option<&str>) -> NodeId {
        let id = self.add_child(parent, name, None);
        self.set_property(id, Self::IS_COLLECTION, "true");
        id
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].name.as_deref()
    }

    pub fn set_name(&mut self, node: NodeId, name: impl Into<String>) {
        self.nodes[node.0].name = Some(name.into());
    }

    pub fn resource(&self, node: NodeId) -> Option<&Resource> {
        self.nodes[node.0].resource.as_ref()
    }

    pub fn property(&self, node: NodeId, key: &str) -> Option<&str> {
        self.nodes[node.0].properties.get(key).map(String::as_str)
    }

    pub fn properties(&self, node: NodeId) -> &BTreeMap<String, String> {
        &self.nodes[node.0].properties
    }

    pub fn set_property(&mut self, node: NodeId, key: impl Into<String>, value: impl Into<String>) {
        self.nodes[node.0].properties.insert(key.into(), value.into());
    }

    pub fn is_collection(&self, node: NodeId) -> bool {
        self.property(node, Self::IS_COLLECTION) == Some("true")
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Follow child names from `node`, e.g. `"items"` or `"hosts/host_components"`.
    pub fn child_by_path(&self, node: NodeId, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(node, |current, segment| {
                self.children(current)
                    .iter()
                    .copied()
                    .find(|child| self.name(*child) == Some(segment))
            })
    }

    /// Nodes in pre-order, starting at the root.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        order
    }
}
