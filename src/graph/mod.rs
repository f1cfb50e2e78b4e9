//! Defines the core data structures of the analysis graph.
pub mod dag;
pub mod node;
pub mod storage;
pub mod topology;

// Re-export key types for convenient access
pub use dag::AnalysisGraph;
pub use node::{is_bookkeeping, AnalysisNode, AnalysisStatus, Attribute, Credentials, OwnerId};
pub use storage::{AnalysisStore, NodeId};
