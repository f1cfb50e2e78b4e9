//! Defines the error type shared by the graph, the builder and the filters.
use crate::filters::FilterId;
use crate::graph::NodeId;
use thiserror::Error;

/// Contract violations raised synchronously by the analysis graph.
///
/// Remote computation failures are not represented here: they are recorded
/// on the node itself (`status = failed`, `error = message`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid analysis description: {0}")]
    InvalidDescription(String),
    #[error("Analysis '{node_id}' of type '{analysis_type}' is missing required source '{source_name}'")]
    MissingSource { node_id: String, analysis_type: String, source_name: String },
    #[error("Source '{source_name}' of analysis '{node_id}' is not an analysis")]
    SourceNotAnalysis { node_id: String, source_name: String },
    #[error("Unknown analysis node {0:?}")]
    UnknownNode(NodeId),
    #[error("Filter belongs to analysis {actual:?}, not {expected:?}")]
    FilterNotBound { expected: NodeId, actual: NodeId },
    #[error("Unknown filter {0:?}")]
    UnknownFilter(FilterId),
    #[error("Invalid range [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },
    #[error("Attribute '{0}' cannot be set directly")]
    ReservedAttribute(String),
    #[error("Invalid value for attribute '{name}': {reason}")]
    InvalidAttribute { name: String, reason: String },
    #[error("Wiring '{source_id}' under '{node_id}' would create a cycle")]
    CycleDetected { node_id: String, source_id: String },
    #[error("Invalid analysis status '{0}'")]
    InvalidStatus(String),
    #[error("No filter ids left to assign")]
    FilterIdsExhausted,
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid reference catalog: {0}")]
    Catalog(String),
}
