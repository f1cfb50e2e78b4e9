//! Cycle checks over the node-valued attributes of an `AnalysisStore`.
//!
//! Edges point from a consumer to the analyses it reads from, i.e. from a
//! node to every `Attribute::Node` it holds (sources and node-valued params).
use super::node::Attribute;
use super::storage::{AnalysisStore, NodeId};
use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graphmap::DiGraphMap;

pub fn edge_map(store: &AnalysisStore) -> DiGraphMap<NodeId, ()> {
    let mut graph = DiGraphMap::new();
    for (id, node) in store.iter() {
        graph.add_node(id);
        for (_, attr) in node.attributes() {
            if let Attribute::Node(child) = attr {
                graph.add_edge(id, *child, ());
            }
        }
    }
    graph
}

/// True when storing `child` as an attribute of `parent` would close a cycle.
pub fn would_cycle(store: &AnalysisStore, parent: NodeId, child: NodeId) -> bool {
    if parent == child {
        return true;
    }
    let graph = edge_map(store);
    graph.contains_node(child) && graph.contains_node(parent) && has_path_connecting(&graph, child, parent, None)
}

pub fn is_acyclic(store: &AnalysisStore) -> bool {
    !is_cyclic_directed(&edge_map(store))
}
