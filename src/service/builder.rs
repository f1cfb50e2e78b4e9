//! Builds analysis nodes from nested `{id, type, params}` descriptions.
use super::AnalysisService;
use crate::error::AnalysisError;
use crate::graph::{AnalysisNode, AnalysisStatus, Attribute, Credentials, NodeId, OwnerId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// One level of the wire description. `params` values that are themselves
/// descriptions are nested analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub analysis_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AnalysisStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub credentials: Credentials,
}

impl AnalysisDescription {
    pub fn from_value(value: &Value) -> Result<Self, AnalysisError> {
        serde_json::from_value(value.clone()).map_err(|e| AnalysisError::InvalidDescription(e.to_string()))
    }

    /// Whether a param value should be resolved into a nested analysis: an
    /// object with a string `type`, whose `params` (when present) is an object.
    pub fn is_description(value: &Value) -> bool {
        value.is_object()
            && value.get("type").map_or(false, Value::is_string)
            && value.get("params").map_or(true, Value::is_object)
    }

    /// A `failed` description must carry its error message.
    fn check_status(&self) -> Result<(), AnalysisError> {
        if self.status == Some(AnalysisStatus::Failed) && self.error.is_none() {
            return Err(AnalysisError::InvalidDescription(format!(
                "analysis of type '{}' is failed without an error",
                self.analysis_type
            )));
        }
        Ok(())
    }
}

impl AnalysisService {
    /// Resolves `description` (and every nested description in its params)
    /// into nodes, returning the root.
    ///
    /// Children are resolved before their parent. An id already registered
    /// with the same type resolves to the existing node, whose attributes are
    /// updated through the regular change propagation. When `owner` is given
    /// the root is marked as its source.
    pub fn create_analysis(&mut self, description: &Value, owner: Option<&OwnerId>) -> Result<NodeId, AnalysisError> {
        let root = self.resolve_description(description)?;
        if let Some(owner) = owner {
            self.mark_as_source_of(root, owner.clone())?;
        }
        Ok(root)
    }

    pub fn create_analysis_from_str(&mut self, text: &str, owner: Option<&OwnerId>) -> Result<NodeId, AnalysisError> {
        let description: Value =
            serde_json::from_str(text).map_err(|e| AnalysisError::InvalidDescription(e.to_string()))?;
        self.create_analysis(&description, owner)
    }

    fn resolve_description(&mut self, value: &Value) -> Result<NodeId, AnalysisError> {
        let description = AnalysisDescription::from_value(value)?;
        description.check_status()?;

        let mut attributes = Vec::with_capacity(description.params.len());
        for (name, param) in &description.params {
            let attribute = if AnalysisDescription::is_description(param) {
                Attribute::Node(self.resolve_description(param)?)
            } else {
                Attribute::Value(param.clone())
            };
            attributes.push((name.clone(), attribute));
        }

        let analysis_id = match &description.id {
            Some(id) => id.clone(),
            None => self.store.unique_id(&description.analysis_type),
        };
        self.check_required_sources(&analysis_id, &description.analysis_type, &attributes)?;

        match self.store.lookup(&analysis_id) {
            Some(existing) if self.node_ref(existing)?.analysis_type() == description.analysis_type => {
                self.update_existing(existing, description, attributes)?;
                Ok(existing)
            }
            _ => Ok(self.insert_new(analysis_id, description, attributes)),
        }
    }

    fn check_required_sources(
        &self,
        analysis_id: &str,
        analysis_type: &str,
        attributes: &[(String, Attribute)],
    ) -> Result<(), AnalysisError> {
        for source_name in self.catalog.source_names(analysis_type) {
            let value = attributes.iter().find(|(name, _)| *name == source_name).map(|(_, attr)| attr);
            match value {
                Some(Attribute::Node(_)) => {}
                None | Some(Attribute::Value(Value::Null))
                    if self.catalog.is_source_optional(analysis_type, &source_name) => {}
                None => {
                    return Err(AnalysisError::MissingSource {
                        node_id: analysis_id.to_string(),
                        analysis_type: analysis_type.to_string(),
                        source_name,
                    });
                }
                Some(Attribute::Value(_)) => {
                    return Err(AnalysisError::SourceNotAnalysis {
                        node_id: analysis_id.to_string(),
                        source_name,
                    });
                }
            }
        }
        Ok(())
    }

    fn insert_new(
        &mut self,
        analysis_id: String,
        description: AnalysisDescription,
        attributes: Vec<(String, Attribute)>,
    ) -> NodeId {
        let mut node = AnalysisNode::new(analysis_id, description.analysis_type);
        for (name, attribute) in attributes {
            node.put_attribute(name, attribute);
        }
        *node.credentials_mut() = description.credentials.or(&self.config.credentials);

        // The initial status is an assignment, not a change: nothing is bound yet.
        let initial_status = self.config.initial_status.filter(|status| *status != AnalysisStatus::Failed);
        if let Some(status) = description.status.or(initial_status) {
            if status == AnalysisStatus::Failed {
                node.put_error(description.error);
            }
            node.put_status(status);
        }

        let superseded = self.store.lookup(node.id());
        let id = self.store.insert(node);
        if let Some(previous) = superseded {
            self.bindings.unbind_all(previous);
        }
        self.init_binds(id);
        debug!(node = id.index(), analysis = ?self.store.get(id).map(AnalysisNode::id), "created analysis");
        id
    }

    fn update_existing(
        &mut self,
        id: NodeId,
        description: AnalysisDescription,
        attributes: Vec<(String, Attribute)>,
    ) -> Result<(), AnalysisError> {
        self.set_attributes(id, attributes)?;

        let node = self.node_mut(id)?;
        let credentials = description.credentials.or(node.credentials());
        *node.credentials_mut() = credentials;

        match (description.status, description.error) {
            (Some(AnalysisStatus::Failed), Some(error)) => self.set_error(id, error)?,
            (Some(status), _) => self.set_status(id, status)?,
            (None, _) => {}
        }
        debug!(node = id.index(), "re-resolved existing analysis");
        Ok(())
    }
}
