//! Per-node listener tables.
//!
//! Each node has a map from attribute name to the handler that runs when that
//! attribute changes, plus the list of source nodes it listens on. The table
//! is rebuilt from scratch whenever the node's type changes.
use crate::graph::NodeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Handler {
    TypeChanged,
    ParamsChanged,
    StatusChanged,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeBindings {
    handlers: BTreeMap<String, Handler>,
    sources: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Bindings {
    nodes: HashMap<NodeId, NodeBindings>,
    /// Reverse of `NodeBindings::sources`: source -> nodes listening on it.
    listeners: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl Bindings {
    pub fn bind(&mut self, id: NodeId, attribute: impl Into<String>, handler: Handler) {
        self.nodes.entry(id).or_default().handlers.insert(attribute.into(), handler);
    }

    /// Drops every handler and source listener of `id`.
    pub fn unbind_all(&mut self, id: NodeId) {
        if let Some(bindings) = self.nodes.remove(&id) {
            self.forget_listener(id, &bindings.sources);
        }
    }

    pub fn listen_to_sources(&mut self, id: NodeId, sources: Vec<NodeId>) {
        let entry = self.nodes.entry(id).or_default();
        let previous = std::mem::replace(&mut entry.sources, sources);
        self.forget_listener(id, &previous);
        for &source in &self.nodes[&id].sources {
            self.listeners.entry(source).or_default().insert(id);
        }
    }

    fn forget_listener(&mut self, id: NodeId, sources: &[NodeId]) {
        for source in sources {
            if let Some(set) = self.listeners.get_mut(source) {
                set.remove(&id);
                if set.is_empty() {
                    self.listeners.remove(source);
                }
            }
        }
    }

    /// Handlers triggered by a batch of changed attributes, deduplicated and
    /// ordered type, params, status.
    pub fn handlers_for<S: AsRef<str>>(&self, id: NodeId, changed: &[S]) -> Vec<Handler> {
        let Some(bindings) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut handlers: Vec<Handler> = changed
            .iter()
            .filter_map(|name| bindings.handlers.get(name.as_ref()).copied())
            .collect();
        handlers.sort();
        handlers.dedup();
        handlers
    }

    pub fn bound_attributes(&self, id: NodeId) -> Vec<&str> {
        self.nodes
            .get(&id)
            .map(|b| b.handlers.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn sources(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|b| b.sources.as_slice()).unwrap_or(&[])
    }

    /// Every node listening on `id` through source bindings, transitively,
    /// breadth-first.
    pub fn dependents_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([id]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(node) = queue.pop_front() {
            for &listener in self.listeners.get(&node).into_iter().flatten() {
                if visited.insert(listener) {
                    order.push(listener);
                    queue.push_back(listener);
                }
            }
        }
        order
    }
}
