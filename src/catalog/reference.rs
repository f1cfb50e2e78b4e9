//! An in-memory catalog, built by hand or loaded from a reference document.
use super::ReferenceCatalog;
use crate::error::AnalysisError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Parameter type that marks a nested source analysis in a reference document.
const NODE_PARAM_TYPE: &str = "node";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSchema {
    pub sources: Vec<String>,
    pub params: Vec<String>,
    pub optional_sources: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    schemas: HashMap<String, AnalysisSchema>,
}

#[derive(Deserialize)]
struct ReferenceDocument {
    analyses: Map<String, Value>,
}

#[derive(Deserialize)]
struct AnalysisEntry {
    #[serde(default)]
    params: Map<String, Value>,
}

#[derive(Deserialize)]
struct ParamEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    optional: bool,
}

impl StaticCatalog {
    pub fn new() -> Self { Self::default() }

    /// Registers (or replaces) the schema of `analysis_type`.
    pub fn with_analysis(mut self, analysis_type: &str, sources: &[&str], params: &[&str]) -> Self {
        self.schemas.insert(
            analysis_type.to_string(),
            AnalysisSchema {
                sources: sources.iter().map(|s| s.to_string()).collect(),
                params: params.iter().map(|s| s.to_string()).collect(),
                optional_sources: BTreeSet::new(),
            },
        );
        self
    }

    pub fn with_optional_source(mut self, analysis_type: &str, source_name: &str) -> Self {
        self.schemas
            .entry(analysis_type.to_string())
            .or_default()
            .optional_sources
            .insert(source_name.to_string());
        self
    }

    pub fn schema(&self, analysis_type: &str) -> Option<&AnalysisSchema> {
        self.schemas.get(analysis_type)
    }

    pub fn analysis_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Loads a reference document of the shape
    /// `{"analyses": {"<type>": {"params": {"<name>": {"type": "node", "optional": true}}}}}`.
    ///
    /// Params typed `node` become sources, in document order.
    pub fn from_reference_json(text: &str) -> Result<Self, AnalysisError> {
        let document: ReferenceDocument =
            serde_json::from_str(text).map_err(|e| AnalysisError::Catalog(e.to_string()))?;

        let mut catalog = StaticCatalog::new();
        for (analysis_type, entry) in document.analyses {
            let entry: AnalysisEntry = serde_json::from_value(entry)
                .map_err(|e| AnalysisError::Catalog(format!("analysis '{}': {}", analysis_type, e)))?;

            let mut schema = AnalysisSchema::default();
            for (name, param) in entry.params {
                let param: ParamEntry = serde_json::from_value(param).map_err(|e| {
                    AnalysisError::Catalog(format!("param '{}' of '{}': {}", name, analysis_type, e))
                })?;
                if param.kind == NODE_PARAM_TYPE {
                    if param.optional {
                        schema.optional_sources.insert(name.clone());
                    }
                    schema.sources.push(name);
                } else {
                    schema.params.push(name);
                }
            }
            catalog.schemas.insert(analysis_type, schema);
        }
        Ok(catalog)
    }
}

impl ReferenceCatalog for StaticCatalog {
    fn source_names(&self, analysis_type: &str) -> Vec<String> {
        self.schema(analysis_type).map(|s| s.sources.clone()).unwrap_or_default()
    }

    fn param_names(&self, analysis_type: &str) -> Vec<String> {
        self.schema(analysis_type).map(|s| s.params.clone()).unwrap_or_default()
    }

    fn is_source_optional(&self, analysis_type: &str, source_name: &str) -> bool {
        self.schema(analysis_type)
            .map_or(false, |s| s.optional_sources.contains(source_name))
    }
}
