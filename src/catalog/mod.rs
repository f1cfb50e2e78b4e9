//! Schema lookups for analysis types.
//!
//! The graph never hard-codes which attributes of an analysis are nested
//! sources: it asks a `ReferenceCatalog` every time it needs to know, so a
//! type change re-classifies attributes deterministically.

pub use self::reference::{AnalysisSchema, StaticCatalog};

mod reference;

pub trait ReferenceCatalog {
    /// Ordered names of the attributes that hold nested source analyses.
    fn source_names(&self, analysis_type: &str) -> Vec<String>;

    /// Names of the plain (non-source) parameters.
    fn param_names(&self, analysis_type: &str) -> Vec<String>;

    fn is_source_optional(&self, analysis_type: &str, source_name: &str) -> bool;
}

impl<C: ReferenceCatalog + ?Sized> ReferenceCatalog for Box<C> {
    fn source_names(&self, analysis_type: &str) -> Vec<String> {
        (**self).source_names(analysis_type)
    }

    fn param_names(&self, analysis_type: &str) -> Vec<String> {
        (**self).param_names(analysis_type)
    }

    fn is_source_optional(&self, analysis_type: &str, source_name: &str) -> bool {
        (**self).is_source_optional(analysis_type, source_name)
    }
}
