//! dag.rs
//! Read-only traversals over an `AnalysisStore`, driven by the reference
//! catalog's notion of which attributes are sources.

use super::node::{AnalysisNode, Attribute};
use super::storage::{AnalysisStore, NodeId};
use crate::catalog::ReferenceCatalog;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Clone, Copy)]
pub struct AnalysisGraph<'a> {
    store: &'a AnalysisStore,
    catalog: &'a dyn ReferenceCatalog,
}

impl<'a> AnalysisGraph<'a> {
    pub fn new(store: &'a AnalysisStore, catalog: &'a dyn ReferenceCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn node(&self, id: NodeId) -> Option<&'a AnalysisNode> {
        self.store.get(id)
    }

    pub fn store(&self) -> &'a AnalysisStore { self.store }
    pub fn catalog(&self) -> &'a dyn ReferenceCatalog { self.catalog }

    /// Node-valued source attributes of `id`, in the schema order of its type.
    pub fn sources_of(&self, id: NodeId) -> Vec<(String, NodeId)> {
        let Some(node) = self.store.get(id) else {
            return Vec::new();
        };
        self.catalog
            .source_names(node.analysis_type())
            .into_iter()
            .filter_map(|name| {
                let child = node.attribute(&name).and_then(Attribute::as_node)?;
                Some((name, child))
            })
            .collect()
    }

    /// Depth-first, pre-order search through source attributes.
    ///
    /// Returns the first node whose analysis id matches; each shared node is
    /// expanded at most once.
    pub fn find_analysis_by_id(&self, root: NodeId, analysis_id: &str) -> Option<NodeId> {
        let mut visited = HashSet::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = self.store.get(current)?;
            if node.id() == analysis_id {
                return Some(current);
            }
            // Reverse so the first source is popped first.
            for (_, child) in self.sources_of(current).into_iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    /// The root plus every node reachable through source attributes, each
    /// exactly once, in pre-order.
    pub fn nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if self.store.get(current).is_none() || !visited.insert(current) {
                continue;
            }
            order.push(current);
            for (_, child) in self.sources_of(current).into_iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Serializes the subgraph rooted at `id` into the `{id, type, params}` wire form.
    ///
    /// Only the sources and params of the node's current type are written, in
    /// attribute order. Shared nodes are written out in full at every place
    /// they are referenced.
    pub fn to_json(&self, id: NodeId) -> Option<Value> {
        let node = self.store.get(id)?;
        let schema: HashSet<String> = self
            .catalog
            .source_names(node.analysis_type())
            .into_iter()
            .chain(self.catalog.param_names(node.analysis_type()))
            .collect();

        let mut params = Map::new();
        for (name, attr) in node.attributes().filter(|(name, _)| schema.contains(*name)) {
            let value = match attr {
                Attribute::Value(value) => value.clone(),
                Attribute::Node(child) => self.to_json(*child).unwrap_or(Value::Null),
            };
            params.insert(name.to_string(), value);
        }

        let mut json = Map::new();
        json.insert("id".into(), Value::String(node.id().to_string()));
        json.insert("type".into(), Value::String(node.analysis_type().to_string()));
        json.insert("params".into(), Value::Object(params));
        Some(Value::Object(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use serde_json::json;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_analysis("source", &[], &["query"])
            .with_analysis("buffer", &["source"], &["radius"])
            .with_analysis("intersection", &["source", "target"], &[])
    }

    fn add(store: &mut AnalysisStore, id: &str, ty: &str, attrs: Vec<(&str, Attribute)>) -> NodeId {
        let mut node = AnalysisNode::new(id, ty);
        for (name, attr) in attrs {
            node.put_attribute(name.to_string(), attr);
        }
        store.insert(node)
    }

    #[test]
    fn test_diamond_nodes_are_listed_once() {
        // Shape: a3 -> (a1, a2), a1 -> a0, a2 -> a0
        let mut store = AnalysisStore::new();
        let a0 = add(&mut store, "a0", "source", vec![("query", json!("SELECT 1").into())]);
        let a1 = add(&mut store, "a1", "buffer", vec![("source", a0.into())]);
        let a2 = add(&mut store, "a2", "buffer", vec![("source", a0.into())]);
        let a3 = add(&mut store, "a3", "intersection", vec![("source", a1.into()), ("target", a2.into())]);

        let catalog = catalog();
        let graph = AnalysisGraph::new(&store, &catalog);
        assert_eq!(graph.nodes(a3), vec![a3, a1, a0, a2]);
        assert_eq!(graph.find_analysis_by_id(a3, "a2"), Some(a2));
        assert_eq!(graph.find_analysis_by_id(a3, "zz"), None);
    }

    #[test]
    fn test_to_json_writes_only_schema_attributes() {
        let mut store = AnalysisStore::new();
        let a0 = add(&mut store, "a0", "source", vec![("query", json!("q").into())]);
        let a1 = add(
            &mut store,
            "a1",
            "buffer",
            vec![("source", a0.into()), ("randomAttribute", json!("x").into()), ("radius", json!(3).into())],
        );

        let catalog = catalog();
        let graph = AnalysisGraph::new(&store, &catalog);
        assert_eq!(
            graph.to_json(a1).unwrap(),
            json!({
                "id": "a1",
                "type": "buffer",
                "params": {"source": {"id": "a0", "type": "source", "params": {"query": "q"}}, "radius": 3}
            })
        );
    }

    #[test]
    fn test_non_source_attributes_are_not_traversed() {
        let mut store = AnalysisStore::new();
        let a0 = add(&mut store, "a0", "source", vec![]);
        let a1 = add(&mut store, "a1", "buffer", vec![("radius", a0.into())]);

        let catalog = catalog();
        let graph = AnalysisGraph::new(&store, &catalog);
        assert_eq!(graph.nodes(a1), vec![a1]);
        assert_eq!(graph.find_analysis_by_id(a1, "a0"), None);
        // ...but serialization still nests them.
        assert_eq!(graph.to_json(a1).unwrap()["params"]["radius"]["id"], json!("a0"));
    }
}
