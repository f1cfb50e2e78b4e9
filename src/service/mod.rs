//! The analysis service: owns the node arena, the listener bindings and the
//! reload pathway, and is the only place where nodes are mutated.
//!
//! Every setter follows the same shape: validate, apply the raw change to the
//! node, then look up the bindings of the changed attribute names and run the
//! matching handlers. Handlers decide whether a `ReloadRequest` is emitted.

pub use self::builder::AnalysisDescription;
pub use self::config::ServiceConfig;

mod bindings;
mod builder;
mod config;

use self::bindings::{Bindings, Handler};
use crate::catalog::ReferenceCatalog;
use crate::display;
use crate::error::AnalysisError;
use crate::filters::{Filter, FilterId, RangeFilter};
use crate::graph::node::is_bookkeeping;
use crate::graph::{topology, AnalysisGraph, AnalysisNode, AnalysisStatus, AnalysisStore, Attribute, Credentials, NodeId, OwnerId};
use crate::reload::{ReloadPathway, ReloadReason, ReloadRequest};
use serde_json::Value;
use tracing::{debug, warn};

pub struct AnalysisService {
    store: AnalysisStore,
    catalog: Box<dyn ReferenceCatalog>,
    pathway: Box<dyn ReloadPathway>,
    bindings: Bindings,
    config: ServiceConfig,
    next_filter_seq: u32,
}

impl AnalysisService {
    pub fn new(catalog: impl ReferenceCatalog + 'static, pathway: impl ReloadPathway + 'static) -> Self {
        Self::with_config(catalog, pathway, ServiceConfig::default())
    }

    pub fn with_config(
        catalog: impl ReferenceCatalog + 'static,
        pathway: impl ReloadPathway + 'static,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store: AnalysisStore::new(),
            catalog: Box::new(catalog),
            pathway: Box::new(pathway),
            bindings: Bindings::default(),
            config,
            next_filter_seq: 0,
        }
    }

    // --- Accessors ---

    pub fn graph(&self) -> AnalysisGraph<'_> {
        AnalysisGraph::new(&self.store, self.catalog.as_ref())
    }

    pub fn store(&self) -> &AnalysisStore { &self.store }
    pub fn config(&self) -> &ServiceConfig { &self.config }
    pub fn catalog(&self) -> &dyn ReferenceCatalog { self.catalog.as_ref() }

    pub fn node(&self, id: NodeId) -> Option<&AnalysisNode> {
        self.store.get(id)
    }

    /// Flat registry lookup: the node currently bound to `analysis_id`.
    pub fn get_analysis_by_id(&self, analysis_id: &str) -> Option<NodeId> {
        self.store.lookup(analysis_id)
    }

    pub fn find_analysis_by_id(&self, root: NodeId, analysis_id: &str) -> Option<NodeId> {
        self.graph().find_analysis_by_id(root, analysis_id)
    }

    pub fn nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.graph().nodes(root)
    }

    pub fn to_json(&self, root: NodeId) -> Option<Value> {
        self.graph().to_json(root)
    }

    /// Indented audit trace of the source tree under `root`.
    pub fn trace(&self, root: NodeId) -> String {
        display::format_trace(&self.graph(), root)
    }

    /// Attribute names with a live binding on `id`, sorted.
    pub fn bound_attributes(&self, id: NodeId) -> Vec<&str> {
        self.bindings.bound_attributes(id)
    }

    /// Source nodes `id` currently listens on.
    pub fn listened_sources(&self, id: NodeId) -> &[NodeId] {
        self.bindings.sources(id)
    }

    fn node_ref(&self, id: NodeId) -> Result<&AnalysisNode, AnalysisError> {
        self.store.get(id).ok_or(AnalysisError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut AnalysisNode, AnalysisError> {
        self.store.get_mut(id).ok_or(AnalysisError::UnknownNode(id))
    }

    // --- Attributes ---

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<Attribute>,
    ) -> Result<(), AnalysisError> {
        self.set_attributes(id, [(name.into(), value.into())])
    }

    /// Applies a batch of attribute changes.
    ///
    /// The batch is validated as a whole before anything is written. Values
    /// equal to the stored ones are not changes. `url`, `apiKey` and
    /// `authToken` update the node's credentials and never trigger a reload.
    pub fn set_attributes<I, K>(&mut self, id: NodeId, changes: I) -> Result<(), AnalysisError>
    where
        I: IntoIterator<Item = (K, Attribute)>,
        K: Into<String>,
    {
        let changes: Vec<(String, Attribute)> =
            changes.into_iter().map(|(name, value)| (name.into(), value)).collect();
        self.validate_changes(id, &changes)?;

        let node = self.node_mut(id)?;
        let mut changed = Vec::new();
        for (name, value) in changes {
            if let Some(slot) = node.credentials_mut().slot_mut(&name) {
                *slot = value.as_value().and_then(Value::as_str).map(String::from);
                continue;
            }
            if node.put_attribute(name.clone(), value) {
                changed.push(name);
            }
        }
        self.notify(id, &changed[..]);
        Ok(())
    }

    /// Removes an attribute; removing a tracked one counts as a change.
    pub fn unset_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<Attribute>, AnalysisError> {
        Self::check_settable(name)?;
        let node = self.node_mut(id)?;
        if let Some(slot) = node.credentials_mut().slot_mut(name) {
            return Ok(slot.take().map(|v| Attribute::Value(Value::String(v))));
        }
        let removed = node.take_attribute(name);
        if removed.is_some() {
            self.notify(id, &[name]);
        }
        Ok(removed)
    }

    fn check_settable(name: &str) -> Result<(), AnalysisError> {
        match name {
            "id" | "type" | "status" | "error" => Err(AnalysisError::ReservedAttribute(name.to_string())),
            _ => Ok(()),
        }
    }

    fn validate_changes(&self, id: NodeId, changes: &[(String, Attribute)]) -> Result<(), AnalysisError> {
        let node = self.node_ref(id)?;
        for (name, value) in changes {
            Self::check_settable(name)?;
            match value {
                Attribute::Value(value) if is_bookkeeping(name) => {
                    if !(value.is_string() || value.is_null()) {
                        return Err(AnalysisError::InvalidAttribute {
                            name: name.clone(),
                            reason: "expected a string or null".into(),
                        });
                    }
                }
                Attribute::Node(_) if is_bookkeeping(name) => {
                    return Err(AnalysisError::InvalidAttribute {
                        name: name.clone(),
                        reason: "expected a string or null".into(),
                    });
                }
                Attribute::Node(child) => {
                    let child_node = self.node_ref(*child)?;
                    if topology::would_cycle(&self.store, id, *child) {
                        return Err(AnalysisError::CycleDetected {
                            node_id: node.id().to_string(),
                            source_id: child_node.id().to_string(),
                        });
                    }
                }
                Attribute::Value(_) => {}
            }
        }
        Ok(())
    }

    pub fn set_credentials(&mut self, id: NodeId, credentials: Credentials) -> Result<(), AnalysisError> {
        *self.node_mut(id)?.credentials_mut() = credentials;
        Ok(())
    }

    // --- Type ---

    /// Changes the analysis type, rebinding listeners for the new schema.
    pub fn set_type(&mut self, id: NodeId, analysis_type: impl Into<String>) -> Result<(), AnalysisError> {
        if self.node_mut(id)?.put_type(analysis_type.into()) {
            self.notify(id, &["type"]);
        }
        Ok(())
    }

    // --- Status ---

    /// Moves the analysis to `status`.
    ///
    /// A node is only `failed` together with an error message, so `failed` is
    /// rejected here unless one was already recorded; use `set_error`.
    pub fn set_status(&mut self, id: NodeId, status: AnalysisStatus) -> Result<(), AnalysisError> {
        let node = self.node_mut(id)?;
        if status == AnalysisStatus::Failed && node.error().is_none() {
            return Err(AnalysisError::InvalidStatus(
                "failed requires an error message, use set_error".into(),
            ));
        }
        if node.put_status(status) {
            self.notify(id, &["status"]);
        }
        Ok(())
    }

    /// Clears the error and marks the analysis ready.
    pub fn set_ok(&mut self, id: NodeId) -> Result<(), AnalysisError> {
        self.node_mut(id)?.put_error(None);
        self.set_status(id, AnalysisStatus::Ready)
    }

    /// Records `message` and marks the analysis failed.
    pub fn set_error(&mut self, id: NodeId, message: impl Into<String>) -> Result<(), AnalysisError> {
        self.node_mut(id)?.put_error(Some(message.into()));
        self.set_status(id, AnalysisStatus::Failed)
    }

    /// Callback for the reload pathway once the request for `origin` settled.
    ///
    /// Success needs no bookkeeping; a failure marks the origin as failed and
    /// leaves the rest of the graph untouched.
    pub fn resolve_reload(&mut self, origin: NodeId, outcome: Result<(), String>) -> Result<(), AnalysisError> {
        let analysis_id = self.node_ref(origin)?.id().to_string();
        match outcome {
            Ok(()) => {
                debug!(analysis = %analysis_id, "reload succeeded");
                Ok(())
            }
            Err(message) => {
                warn!(analysis = %analysis_id, error = %message, "reload failed");
                self.set_error(origin, message)
            }
        }
    }

    // --- Reference tracking ---

    /// Returns `false` when `owner` was already registered.
    pub fn mark_as_source_of(&mut self, id: NodeId, owner: impl Into<OwnerId>) -> Result<bool, AnalysisError> {
        Ok(self.node_mut(id)?.mark_as_source_of(owner.into()))
    }

    /// Returns `false` when `owner` was not registered.
    pub fn unmark_as_source_of(&mut self, id: NodeId, owner: &OwnerId) -> Result<bool, AnalysisError> {
        Ok(self.node_mut(id)?.unmark_as_source_of(owner))
    }

    pub fn is_source_of_any_model(&self, id: NodeId) -> bool {
        self.store.get(id).map_or(false, AnalysisNode::is_source_of_any_model)
    }

    // --- Filters ---

    /// Attaches `filter` to the analysis it was built for. Does not reload.
    pub fn add_filter(&mut self, id: NodeId, filter: impl Into<Filter>) -> Result<FilterId, AnalysisError> {
        let filter = filter.into();
        self.node_ref(id)?;
        if filter.analysis() != id {
            return Err(AnalysisError::FilterNotBound { expected: id, actual: filter.analysis() });
        }
        let seq = self.next_filter_seq;
        self.next_filter_seq = seq.checked_add(1).ok_or(AnalysisError::FilterIdsExhausted)?;
        let filter_id = FilterId { node: id, seq };
        self.node_mut(id)?.push_filter(filter_id, filter);
        Ok(filter_id)
    }

    pub fn create_range_filter(&mut self, id: NodeId, column: impl Into<String>) -> Result<FilterId, AnalysisError> {
        self.add_filter(id, RangeFilter::new(id, column))
    }

    pub fn filter(&self, filter_id: FilterId) -> Option<&Filter> {
        self.store.get(filter_id.node)?.filter(filter_id)
    }

    pub fn set_filter_range(&mut self, filter_id: FilterId, min: f64, max: f64) -> Result<(), AnalysisError> {
        let changed = self.range_filter_mut(filter_id)?.set_range(min, max)?;
        if changed {
            self.emit(filter_id.node, ReloadReason::FiltersChanged);
        }
        Ok(())
    }

    pub fn unset_filter_range(&mut self, filter_id: FilterId) -> Result<(), AnalysisError> {
        if self.range_filter_mut(filter_id)?.unset_range() {
            self.emit(filter_id.node, ReloadReason::FiltersChanged);
        }
        Ok(())
    }

    /// Detaches the filter from its analysis and returns it.
    pub fn remove_filter(&mut self, filter_id: FilterId) -> Result<Filter, AnalysisError> {
        let filter = self
            .store
            .get_mut(filter_id.node)
            .and_then(|node| node.take_filter(filter_id))
            .ok_or(AnalysisError::UnknownFilter(filter_id))?;
        self.emit(filter_id.node, ReloadReason::FiltersChanged);
        Ok(filter)
    }

    /// Wire form of the non-empty filters of `id`.
    pub fn filters_json(&self, id: NodeId) -> Option<Value> {
        let node = self.store.get(id)?;
        Some(Value::Array(
            node.filters().filter(|f| !f.is_empty()).map(Filter::to_json).collect(),
        ))
    }

    fn range_filter_mut(&mut self, filter_id: FilterId) -> Result<&mut RangeFilter, AnalysisError> {
        self.store
            .get_mut(filter_id.node)
            .and_then(|node| node.filter_mut(filter_id))
            .and_then(Filter::as_range_mut)
            .ok_or(AnalysisError::UnknownFilter(filter_id))
    }

    // --- Bindings & propagation ---

    /// Binds `type`, `status` and every schema attribute of the node's type,
    /// then listens on its current sources.
    fn init_binds(&mut self, id: NodeId) {
        let Some(node) = self.store.get(id) else {
            return;
        };
        let analysis_type = node.analysis_type().to_string();

        self.bindings.bind(id, "type", Handler::TypeChanged);
        self.bindings.bind(id, "status", Handler::StatusChanged);
        let schema_names = self
            .catalog
            .source_names(&analysis_type)
            .into_iter()
            .chain(self.catalog.param_names(&analysis_type));
        for name in schema_names {
            if !is_bookkeeping(&name) {
                self.bindings.bind(id, name, Handler::ParamsChanged);
            }
        }
        self.listen_to_sources(id);
    }

    fn listen_to_sources(&mut self, id: NodeId) {
        let sources = self.graph().sources_of(id).into_iter().map(|(_, child)| child).collect();
        self.bindings.listen_to_sources(id, sources);
    }

    fn notify<S: AsRef<str>>(&mut self, id: NodeId, changed: &[S]) {
        let handlers = self.bindings.handlers_for(id, changed);
        // A type change rebinds and reloads, which covers any params in the same batch.
        if handlers.contains(&Handler::TypeChanged) {
            self.on_type_changed(id);
        } else if handlers.contains(&Handler::ParamsChanged) {
            self.on_params_changed(id);
        }
        if handlers.contains(&Handler::StatusChanged) {
            self.on_status_changed(id);
        }
    }

    fn on_type_changed(&mut self, id: NodeId) {
        self.bindings.unbind_all(id);
        self.init_binds(id);
        debug!(node = id.index(), bound = ?self.bindings.bound_attributes(id), "rebound analysis after type change");
        self.emit(id, ReloadReason::TypeChanged);
    }

    fn on_params_changed(&mut self, id: NodeId) {
        self.listen_to_sources(id);
        self.emit(id, ReloadReason::ParamsChanged);
    }

    /// Only a node that others depend on, moving from a previous status into
    /// `ready`, asks for a reload.
    fn on_status_changed(&mut self, id: NodeId) {
        let Some(node) = self.store.get(id) else {
            return;
        };
        if node.is_source_of_any_model()
            && node.previous_status().is_some()
            && node.status() == Some(AnalysisStatus::Ready)
        {
            self.emit(id, ReloadReason::SourceReady);
        }
    }

    fn emit(&mut self, id: NodeId, reason: ReloadReason) {
        let Some(node) = self.store.get(id) else {
            return;
        };
        let dependents = self
            .bindings
            .dependents_of(id)
            .into_iter()
            .filter_map(|dependent| self.store.get(dependent))
            .map(|dependent| dependent.id().to_string())
            .collect();
        let request = ReloadRequest {
            source_id: node.id().to_string(),
            reason,
            dependents,
            origin: id,
        };
        debug!(source_id = %request.source_id, reason = request.reason.as_str(), "requesting reload");
        self.pathway.reload(request);
    }
}
