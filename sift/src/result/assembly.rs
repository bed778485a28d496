//! Build a result tree from fetched resources.

use crate::predicate::Predicate;
use crate::request::ResourceInstance;
use crate::resource::{Resource, ResourceType};
use crate::schema::SchemaRegistry;
use crate::Result;

use super::tree::{NodeId, ResultTree};

/// Assemble the tree for `instance` from its `resources`.
///
/// A collection request wraps the resources in an unnamed collection node;
/// a single-resource request hangs the resource directly off the root.
/// Under every resource node, one node per declared sub-resource type
/// (named by its plural) holds the sub-resources `read_children` returns
/// for the parent-key constraint. Types already on the path are skipped.
pub fn assemble<F>(
    instance: &ResourceInstance,
    registry: &SchemaRegistry,
    resources: Vec<Resource>,
    mut read_children: F,
) -> Result<ResultTree>
where
    F: FnMut(ResourceType, Option<&Predicate>) -> Result<Vec<Resource>>,
{
    let mut tree = ResultTree::new();
    let root = tree.root();
    let parent = if instance.collection {
        tree.add_collection(root, None)
    } else {
        root
    };

    let mut path: Vec<ResourceType> = instance.ids.keys().copied().collect();
    if !path.contains(&instance.resource_type) {
        path.push(instance.resource_type);
    }

    for resource in resources {
        let node = tree.add_child(parent, None, Some(resource.clone()));
        add_sub_resources(&mut tree, node, registry, &resource, &mut path, &mut read_children)?;
    }

    log::trace!("assembled result tree with {} node(s)", tree.len());
    Ok(tree)
}

fn add_sub_resources<F>(
    tree: &mut ResultTree,
    node: NodeId,
    registry: &SchemaRegistry,
    resource: &Resource,
    path: &mut Vec<ResourceType>,
    read_children: &mut F,
) -> Result<()>
where
    F: FnMut(ResourceType, Option<&Predicate>) -> Result<Vec<Resource>>,
{
    let parent_schema = registry.get(resource.resource_type)?;

    for &sub_type in registry.sub_resources(resource.resource_type) {
        if path.contains(&sub_type) {
            continue;
        }
        let constraint = registry.get(sub_type)?.parent_constraint(parent_schema, resource);
        let children = read_children(sub_type, constraint.as_ref())?;

        let group = tree.add_child(node, Some(sub_type.plural()), None);
        path.push(sub_type);
        for child in children {
            let child_node = tree.add_child(group, None, Some(child.clone()));
            add_sub_resources(tree, child_node, registry, &child, path, read_children)?;
        }
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::evaluate;
    use std::collections::BTreeMap;

    fn cluster(name: &str) -> Resource {
        Resource::new(ResourceType::Cluster).with_property("Clusters/cluster_name", name)
    }

    fn host(cluster: &str, name: &str) -> Resource {
        Resource::new(ResourceType::Host)
            .with_property("Hosts/cluster_name", cluster)
            .with_property("Hosts/host_name", name)
    }

    fn host_component(cluster: &str, host: &str, component: &str) -> Resource {
        Resource::new(ResourceType::HostComponent)
            .with_property("HostRoles/cluster_name", cluster)
            .with_property("HostRoles/host_name", host)
            .with_property("HostRoles/component_name", component)
    }

    /// Filters a fixed set of resources by the constraint.
    fn fixture(
        all: Vec<Resource>,
    ) -> impl FnMut(ResourceType, Option<&Predicate>) -> Result<Vec<Resource>> {
        move |resource_type: ResourceType, constraint: Option<&Predicate>| {
            Ok(all
                .iter()
                .filter(|r| r.resource_type == resource_type)
                .filter(|r| constraint.map_or(true, |p| evaluate(p, *r)))
                .cloned()
                .collect())
        }
    }

    #[test]
    fn test_collection_request() {
        let registry = SchemaRegistry::cluster_management();
        let instance = ResourceInstance {
            resource_type: ResourceType::Host,
            ids: BTreeMap::from([(ResourceType::Cluster, "c1".to_string())]),
            collection: true,
        };
        let store = vec![
            host_component("c1", "h1", "DATANODE"),
            host_component("c1", "h1", "NAMENODE"),
            host_component("c1", "h2", "DATANODE"),
        ];

        let tree = assemble(
            &instance,
            &registry,
            vec![host("c1", "h1"), host("c1", "h2")],
            fixture(store),
        )
        .unwrap();

        let root = tree.root();
        let collection = tree.children(root)[0];
        assert!(tree.is_collection(collection));
        assert_eq!(tree.name(collection), None);
        assert_eq!(tree.children(collection).len(), 2);

        let h1 = tree.children(collection)[0];
        let hcs = tree.child_by_path(h1, "host_components").unwrap();
        assert_eq!(tree.children(hcs).len(), 2);

        let h2 = tree.children(collection)[1];
        let hcs = tree.child_by_path(h2, "host_components").unwrap();
        assert_eq!(tree.children(hcs).len(), 1);
    }

    #[test]
    fn test_single_request_recurses_without_revisiting() {
        let registry = SchemaRegistry::cluster_management();
        let instance = ResourceInstance {
            resource_type: ResourceType::Cluster,
            ids: BTreeMap::from([(ResourceType::Cluster, "c1".to_string())]),
            collection: false,
        };
        let store = vec![
            host("c1", "h1"),
            host("c2", "h9"),
            host_component("c1", "h1", "NAMENODE"),
        ];

        let mut requested = Vec::new();
        let mut read = fixture(store);
        let tree = assemble(&instance, &registry, vec![cluster("c1")], |t, c| {
            requested.push(t);
            read(t, c)
        })
        .unwrap();

        let root = tree.root();
        let c1 = tree.children(root)[0];
        assert!(tree.resource(c1).is_some());

        let group_names: Vec<_> = tree.children(c1).iter().filter_map(|n| tree.name(*n)).collect();
        assert_eq!(group_names, vec!["services", "hosts", "configurations", "requests"]);

        let hosts = tree.child_by_path(c1, "hosts").unwrap();
        assert_eq!(tree.children(hosts).len(), 1);
        let hc = tree.child_by_path(tree.children(hosts)[0], "host_components").unwrap();
        assert_eq!(tree.children(hc).len(), 1);

        // no requests were found, so their tasks are never read
        assert!(!requested.contains(&ResourceType::Cluster));
        assert!(!requested.contains(&ResourceType::Task));
        assert_eq!(
            requested,
            vec![
                ResourceType::Service,
                ResourceType::Host,
                ResourceType::HostComponent,
                ResourceType::Configuration,
                ResourceType::Request,
            ]
        );
    }

    #[test]
    fn test_types_on_the_uri_path_are_skipped() {
        let registry = SchemaRegistry::cluster_management();
        // /clusters/c1/hosts/h1
        let instance = ResourceInstance {
            resource_type: ResourceType::Host,
            ids: BTreeMap::from([
                (ResourceType::Cluster, "c1".to_string()),
                (ResourceType::Host, "h1".to_string()),
            ]),
            collection: false,
        };
        let mut requested = Vec::new();
        let tree = assemble(&instance, &registry, vec![host("c1", "h1")], |t, _| {
            requested.push(t);
            Ok(Vec::new())
        })
        .unwrap();

        assert_eq!(requested, vec![ResourceType::HostComponent]);
        let h1 = tree.children(tree.root())[0];
        let hcs = tree.child_by_path(h1, "host_components").unwrap();
        assert!(tree.children(hcs).is_empty());
    }
}
