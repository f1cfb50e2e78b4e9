//! storage.rs
//! Arena of analysis nodes plus the flat registry keyed by analysis id.

use super::node::AnalysisNode;
use std::collections::HashMap;

/// A stable handle to a node inside one `AnalysisStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisStore {
    nodes: Vec<AnalysisNode>,
    // Latest node bound to each analysis id. A re-typed id points at the newer node.
    by_id: HashMap<String, NodeId>,
}

impl AnalysisStore {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.nodes.len() }

    /// Appends `node` and binds its analysis id to the new slot.
    pub fn insert(&mut self, node: AnalysisNode) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.by_id.insert(node.id().to_string(), id);
        self.nodes.push(node);
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&AnalysisNode> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut AnalysisNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn lookup(&self, analysis_id: &str) -> Option<NodeId> {
        self.by_id.get(analysis_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AnalysisNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId::new(i), node))
    }

    /// Returns `stem` if no analysis uses it yet, else the first free `stem_N`.
    pub fn unique_id(&self, stem: &str) -> String {
        let mut candidate = stem.to_string();
        let mut counter = 1;
        while self.by_id.contains_key(&candidate) {
            candidate = format!("{}_{}", stem, counter);
            counter += 1;
        }
        candidate
    }
}
