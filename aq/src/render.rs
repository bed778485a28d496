//! JSON rendering of result trees.
//!
//! Resource properties are nested by category (`Hosts/host_name` becomes
//! `{"Hosts": {"host_name": ...}}`) and named child nodes become arrays.

use serde_json::{Map, Value};
use sift::result::{NodeId, ResultTree};

pub fn tree_to_json(tree: &ResultTree) -> Value {
    Value::Object(render_node(tree, tree.root()))
}

fn render_node(tree: &ResultTree, node: NodeId) -> Map<String, Value> {
    let mut object = Map::new();

    for (key, value) in tree.properties(node) {
        if key != ResultTree::IS_COLLECTION {
            object.insert(key.clone(), Value::String(value.clone()));
        }
    }

    if let Some(resource) = tree.resource(node) {
        for (path, value) in &resource.properties {
            let segments: Vec<&str> = path.segments().collect();
            insert_nested(&mut object, &segments, value);
        }
    }

    for &child in tree.children(node) {
        match tree.name(child) {
            Some(name) => {
                let items = tree
                    .children(child)
                    .iter()
                    .map(|&c| Value::Object(render_node(tree, c)))
                    .collect();
                object.insert(name.to_string(), Value::Array(items));
                if tree.is_collection(child) {
                    if let Some(href) = tree.property(child, ResultTree::HREF) {
                        object
                            .entry(ResultTree::HREF)
                            .or_insert_with(|| Value::String(href.to_string()));
                    }
                }
            }
            // a lone resource directly beneath the root
            None => object.extend(render_node(tree, child)),
        }
    }

    object
}

fn insert_nested(object: &mut Map<String, Value>, path: &[&str], value: &str) {
    match path {
        [] => {}
        [leaf] => {
            object.insert(leaf.to_string(), Value::String(value.to_string()));
        }
        [category, rest @ ..] => {
            let entry = object
                .entry(*category)
                .or_insert_with(|| Value::Object(Map::new()));
            // a value already stored at a category keeps precedence
            if let Value::Object(inner) = entry {
                insert_nested(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sift::{Resource, ResourceType};

    fn host(name: &str) -> Resource {
        Resource::new(ResourceType::Host)
            .with_property("Hosts/cluster_name", "c1")
            .with_property("Hosts/host_name", name)
            .with_property("metrics/cpu/cpu_user", "0.5")
    }

    #[test]
    fn test_render_collection() {
        let mut tree = ResultTree::new();
        let root = tree.root();
        let items = tree.add_collection(root, Some("items"));
        tree.set_property(items, ResultTree::HREF, "/api/v1/clusters/c1/hosts");
        let h1 = tree.add_child(items, None, Some(host("h1")));
        tree.set_property(h1, ResultTree::HREF, "/api/v1/clusters/c1/hosts/h1");
        tree.add_child(h1, Some("host_components"), None);

        assert_eq!(
            tree_to_json(&tree),
            json!({
                "href": "/api/v1/clusters/c1/hosts",
                "items": [{
                    "href": "/api/v1/clusters/c1/hosts/h1",
                    "Hosts": {"cluster_name": "c1", "host_name": "h1"},
                    "metrics": {"cpu": {"cpu_user": "0.5"}},
                    "host_components": []
                }]
            })
        );
    }

    #[test]
    fn test_render_single_resource() {
        let mut tree = ResultTree::new();
        let root = tree.root();
        let h1 = tree.add_child(root, None, Some(host("h1")));
        tree.set_property(h1, ResultTree::HREF, "/api/v1/clusters/c1/hosts/h1");

        let json = tree_to_json(&tree);
        assert_eq!(json["href"], "/api/v1/clusters/c1/hosts/h1");
        assert_eq!(json["Hosts"]["host_name"], "h1");
    }
}
