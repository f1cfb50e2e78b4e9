//! Core of the map analysis graph: a DAG of analysis nodes whose parameter,
//! type, status and filter changes are turned into reload requests for the
//! remote analysis service.
//!
//! All mutation goes through [`AnalysisService`]; read-only traversal goes
//! through [`AnalysisGraph`].

pub mod catalog;
pub mod display;
pub mod error;
pub mod filters;
pub mod graph;
pub mod reload;
pub mod service;

pub use catalog::{AnalysisSchema, ReferenceCatalog, StaticCatalog};
pub use error::AnalysisError;
pub use filters::{Filter, FilterId, RangeFilter};
pub use graph::{AnalysisGraph, AnalysisNode, AnalysisStatus, Attribute, Credentials, NodeId, OwnerId};
pub use reload::{RecordingPathway, ReloadPathway, ReloadReason, ReloadRequest};
pub use service::{AnalysisDescription, AnalysisService, ServiceConfig};
