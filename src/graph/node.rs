//! Defines the `AnalysisNode` and its associated types, representing a single
//! transformation step in the analysis graph.

use super::storage::NodeId;
use crate::error::AnalysisError;
use crate::filters::{Filter, FilterId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Attribute names that are bookkeeping only and never trigger a reload.
pub const BOOKKEEPING_ATTRIBUTES: [&str; 6] = ["id", "status", "error", "url", "apiKey", "authToken"];

pub fn is_bookkeeping(name: &str) -> bool {
    BOOKKEEPING_ATTRIBUTES.contains(&name)
}

/// Execution status of an analysis as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Waiting,
    Running,
    Ready,
    Failed,
}

impl AnalysisStatus {
    pub const ALL: [AnalysisStatus; 5] = [
        AnalysisStatus::Pending,
        AnalysisStatus::Waiting,
        AnalysisStatus::Running,
        AnalysisStatus::Ready,
        AnalysisStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Waiting => "waiting",
            AnalysisStatus::Running => "running",
            AnalysisStatus::Ready => "ready",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// An analysis is done once the remote service settled it either way.
    pub fn is_done(&self) -> bool {
        matches!(self, AnalysisStatus::Ready | AnalysisStatus::Failed)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AnalysisError::InvalidStatus(s.to_string()))
    }
}

/// The value of one analysis attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// A nested analysis (a source, or a node-valued parameter).
    Node(NodeId),
    /// An opaque parameter value, kept exactly as it came off the wire.
    Value(Value),
}

impl Attribute {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Attribute::Node(id) => Some(*id),
            Attribute::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attribute::Value(value) => Some(value),
            Attribute::Node(_) => None,
        }
    }
}

impl From<NodeId> for Attribute {
    fn from(id: NodeId) -> Self { Attribute::Node(id) }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self { Attribute::Value(value) }
}

/// Opaque handle of a model that consumes an analysis as its data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self { Self(id.to_string()) }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self { Self(id) }
}

/// Node-level endpoint and credentials, used only to build the request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
}

impl Credentials {
    /// Fills every unset field from `defaults`.
    pub fn or(self, defaults: &Credentials) -> Credentials {
        Credentials {
            url: self.url.or_else(|| defaults.url.clone()),
            api_key: self.api_key.or_else(|| defaults.api_key.clone()),
            auth_token: self.auth_token.or_else(|| defaults.auth_token.clone()),
        }
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "url" => Some(&mut self.url),
            "apiKey" => Some(&mut self.api_key),
            "authToken" => Some(&mut self.auth_token),
            _ => None,
        }
    }
}

/// One vertex of the analysis graph.
///
/// Nodes are plain data: every mutation goes through `AnalysisService`, which
/// keeps the listener bindings and reload signalling consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisNode {
    id: String,
    analysis_type: String,
    attributes: SmallVec<[(String, Attribute); 8]>,
    status: Option<AnalysisStatus>,
    previous_status: Option<AnalysisStatus>,
    error: Option<String>,
    source_owners: BTreeSet<OwnerId>,
    filters: Vec<(FilterId, Filter)>,
    credentials: Credentials,
}

impl AnalysisNode {
    pub fn new(id: impl Into<String>, analysis_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            analysis_type: analysis_type.into(),
            attributes: SmallVec::new(),
            status: None,
            previous_status: None,
            error: None,
            source_owners: BTreeSet::new(),
            filters: Vec::new(),
            credentials: Credentials::default(),
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn analysis_type(&self) -> &str { &self.analysis_type }
    pub fn status(&self) -> Option<AnalysisStatus> { self.status }
    pub fn previous_status(&self) -> Option<AnalysisStatus> { self.previous_status }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn credentials(&self) -> &Credentials { &self.credentials }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, attr)| attr)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    pub fn is_done(&self) -> bool {
        self.status.map_or(false, |status| status.is_done())
    }

    /// The request URL: the base url plus exactly one auth parameter,
    /// `api_key` taking precedence over `auth_token`.
    pub fn url(&self) -> Option<String> {
        let base = self.credentials.url.as_deref()?;
        let param = match (&self.credentials.api_key, &self.credentials.auth_token) {
            (Some(api_key), _) => format!("api_key={}", api_key),
            (None, Some(auth_token)) => format!("auth_token={}", auth_token),
            (None, None) => return Some(base.to_string()),
        };
        let separator = if base.contains('?') { '&' } else { '?' };
        Some(format!("{}{}{}", base, separator, param))
    }

    // --- Reference tracking ---

    pub fn is_source_of_any_model(&self) -> bool { !self.source_owners.is_empty() }
    pub fn is_source_of(&self, owner: &OwnerId) -> bool { self.source_owners.contains(owner) }
    pub fn source_owners(&self) -> impl Iterator<Item = &OwnerId> { self.source_owners.iter() }

    pub fn mark_as_source_of(&mut self, owner: OwnerId) -> bool {
        self.source_owners.insert(owner)
    }

    pub fn unmark_as_source_of(&mut self, owner: &OwnerId) -> bool {
        self.source_owners.remove(owner)
    }

    // --- Filters ---

    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().map(|(_, filter)| filter)
    }

    pub fn filter_ids(&self) -> impl Iterator<Item = FilterId> + '_ {
        self.filters.iter().map(|(id, _)| *id)
    }

    pub fn filter_count(&self) -> usize { self.filters.len() }

    pub fn filter(&self, id: FilterId) -> Option<&Filter> {
        self.filters.iter().find(|(fid, _)| *fid == id).map(|(_, filter)| filter)
    }

    // --- Raw mutation, driven by the service ---

    /// Stores `value` under `name`; returns whether the stored value changed.
    pub(crate) fn put_attribute(&mut self, name: String, value: Attribute) -> bool {
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, current)) if *current == value => false,
            Some((_, current)) => {
                *current = value;
                true
            }
            None => {
                self.attributes.push((name, value));
                true
            }
        }
    }

    pub(crate) fn take_attribute(&mut self, name: &str) -> Option<Attribute> {
        let pos = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(pos).1)
    }

    pub(crate) fn put_type(&mut self, analysis_type: String) -> bool {
        if self.analysis_type == analysis_type {
            return false;
        }
        self.analysis_type = analysis_type;
        true
    }

    /// Records a status change; `error` only survives while the node is failed.
    pub(crate) fn put_status(&mut self, status: AnalysisStatus) -> bool {
        if status != AnalysisStatus::Failed {
            self.error = None;
        }
        if self.status == Some(status) {
            return false;
        }
        self.previous_status = self.status;
        self.status = Some(status);
        true
    }

    pub(crate) fn put_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub(crate) fn credentials_mut(&mut self) -> &mut Credentials { &mut self.credentials }

    pub(crate) fn push_filter(&mut self, id: FilterId, filter: Filter) {
        self.filters.push((id, filter));
    }

    pub(crate) fn filter_mut(&mut self, id: FilterId) -> Option<&mut Filter> {
        self.filters.iter_mut().find(|(fid, _)| *fid == id).map(|(_, filter)| filter)
    }

    pub(crate) fn take_filter(&mut self, id: FilterId) -> Option<Filter> {
        let pos = self.filters.iter().position(|(fid, _)| *fid == id)?;
        Some(self.filters.remove(pos).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn node_with_credentials(url: Option<&str>, api_key: Option<&str>, auth_token: Option<&str>) -> AnalysisNode {
        let mut node = AnalysisNode::new("a0", "source");
        *node.credentials_mut() = Credentials {
            url: url.map(String::from),
            api_key: api_key.map(String::from),
            auth_token: auth_token.map(String::from),
        };
        node
    }

    #[rstest]
    #[case(Some("THE_API_KEY"), Some("THE_AUTH_TOKEN"), "http://example.com?api_key=THE_API_KEY")]
    #[case(None, Some("THE_AUTH_TOKEN"), "http://example.com?auth_token=THE_AUTH_TOKEN")]
    #[case(Some("K"), None, "http://example.com?api_key=K")]
    #[case(None, None, "http://example.com")]
    fn test_url_appends_one_auth_param(
        #[case] api_key: Option<&str>,
        #[case] auth_token: Option<&str>,
        #[case] expected: &str,
    ) {
        let node = node_with_credentials(Some("http://example.com"), api_key, auth_token);
        assert_eq!(node.url().as_deref(), Some(expected));
    }

    #[test]
    fn test_url_extends_existing_query() {
        let node = node_with_credentials(Some("http://x/api?v=1"), None, Some("T"));
        assert_eq!(node.url().as_deref(), Some("http://x/api?v=1&auth_token=T"));
    }

    #[test]
    fn test_url_requires_base() {
        let node = node_with_credentials(None, Some("K"), None);
        assert_eq!(node.url(), None);
    }

    #[rstest]
    #[case(AnalysisStatus::Pending, false)]
    #[case(AnalysisStatus::Waiting, false)]
    #[case(AnalysisStatus::Running, false)]
    #[case(AnalysisStatus::Ready, true)]
    #[case(AnalysisStatus::Failed, true)]
    fn test_is_done(#[case] status: AnalysisStatus, #[case] done: bool) {
        let mut node = AnalysisNode::new("a0", "source");
        assert!(!node.is_done());
        node.put_status(status);
        assert_eq!(node.is_done(), done);
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in AnalysisStatus::ALL {
            assert_eq!(status.as_str().parse::<AnalysisStatus>(), Ok(status));
        }
        assert_eq!(
            "foo".parse::<AnalysisStatus>(),
            Err(AnalysisError::InvalidStatus("foo".into()))
        );
    }

    #[test]
    fn test_leaving_failed_clears_error() {
        let mut node = AnalysisNode::new("a0", "source");
        node.put_error(Some("boom".into()));
        node.put_status(AnalysisStatus::Failed);
        assert_eq!(node.error(), Some("boom"));

        node.put_status(AnalysisStatus::Ready);
        assert_eq!(node.error(), None);
        assert_eq!(node.previous_status(), Some(AnalysisStatus::Failed));
    }

    #[test]
    fn test_put_attribute_reports_changes_only() {
        let mut node = AnalysisNode::new("a0", "sampling");
        assert!(node.put_attribute("seed".into(), json!(20).into()));
        assert!(!node.put_attribute("seed".into(), json!(20).into()));
        assert!(node.put_attribute("seed".into(), json!(25).into()));
        assert_eq!(node.attribute("seed"), Some(&Attribute::Value(json!(25))));
        assert_eq!(node.attributes().count(), 1);
    }

    #[test]
    fn test_source_owners_are_a_set() {
        let mut node = AnalysisNode::new("a0", "source");
        let owner = OwnerId::from("layer-1");
        assert!(node.mark_as_source_of(owner.clone()));
        assert!(!node.mark_as_source_of(owner.clone()));
        assert!(node.is_source_of_any_model());
        assert!(node.unmark_as_source_of(&owner));
        assert!(!node.unmark_as_source_of(&owner));
        assert!(!node.is_source_of_any_model());
    }
}
