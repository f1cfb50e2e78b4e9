//! Recomputation requests handed to the host's reload pathway.
//!
//! The core decides *when* a reload is needed; the pathway owns *how* it is
//! executed (network, batching, superseding stale requests). The pathway
//! reports back through `AnalysisService::resolve_reload`.

use crate::graph::NodeId;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReloadReason {
    /// A tracked parameter or source attribute changed.
    ParamsChanged,
    /// The analysis type changed and its bindings were rebuilt.
    TypeChanged,
    /// A node that other models depend on became ready.
    SourceReady,
    /// A filter attached to the node was changed or removed.
    FiltersChanged,
}

impl ReloadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadReason::ParamsChanged => "paramsChanged",
            ReloadReason::TypeChanged => "typeChanged",
            ReloadReason::SourceReady => "sourceReady",
            ReloadReason::FiltersChanged => "filtersChanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadRequest {
    /// Analysis id of the node that triggered the reload.
    pub source_id: String,
    pub reason: ReloadReason,
    /// Analyses listening on the source through nested bindings, nearest first.
    pub dependents: Vec<String>,
    /// Handle to pass back to `AnalysisService::resolve_reload`.
    #[serde(skip)]
    pub origin: NodeId,
}

pub trait ReloadPathway {
    fn reload(&mut self, request: ReloadRequest);
}

impl<F: FnMut(ReloadRequest)> ReloadPathway for F {
    fn reload(&mut self, request: ReloadRequest) {
        self(request)
    }
}

/// A pathway that only records requests. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPathway {
    requests: Rc<RefCell<Vec<ReloadRequest>>>,
}

impl RecordingPathway {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.requests.borrow().len() }
    pub fn is_empty(&self) -> bool { self.requests.borrow().is_empty() }

    pub fn requests(&self) -> Vec<ReloadRequest> {
        self.requests.borrow().clone()
    }

    pub fn last(&self) -> Option<ReloadRequest> {
        self.requests.borrow().last().cloned()
    }

    /// Drains the log.
    pub fn take(&self) -> Vec<ReloadRequest> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }

    pub fn clear(&self) {
        self.requests.borrow_mut().clear();
    }
}

impl ReloadPathway for RecordingPathway {
    fn reload(&mut self, request: ReloadRequest) {
        self.requests.borrow_mut().push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(reason: ReloadReason) -> ReloadRequest {
        ReloadRequest { source_id: "a0".into(), reason, dependents: vec!["a1".into()], origin: NodeId(0) }
    }

    #[test]
    fn test_recording_clones_share_the_log() {
        let log = RecordingPathway::new();
        let mut pathway = log.clone();
        pathway.reload(request(ReloadReason::ParamsChanged));
        pathway.reload(request(ReloadReason::FiltersChanged));

        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().reason, ReloadReason::FiltersChanged);
        assert_eq!(log.take().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_request_wire_form() {
        let wire = serde_json::to_value(request(ReloadReason::FiltersChanged)).unwrap();
        assert_eq!(wire, json!({"sourceId": "a0", "reason": "filtersChanged", "dependents": ["a1"]}));
    }

    #[test]
    fn test_closures_are_pathways() {
        let mut seen = Vec::new();
        {
            let mut pathway = |request: ReloadRequest| seen.push(request.source_id);
            pathway.reload(request(ReloadReason::SourceReady));
        }
        assert_eq!(seen, vec!["a0"]);
    }
}
