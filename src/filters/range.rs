use crate::error::AnalysisError;
use crate::graph::NodeId;
use serde_json::{Map, Value};

/// Keeps rows whose `column` lies within `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    analysis: NodeId,
    column: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeFilter {
    pub fn new(analysis: NodeId, column: impl Into<String>) -> Self {
        Self { analysis, column: column.into(), min: None, max: None }
    }

    pub fn analysis(&self) -> NodeId { self.analysis }
    pub fn column(&self) -> &str { &self.column }
    pub fn min(&self) -> Option<f64> { self.min }
    pub fn max(&self) -> Option<f64> { self.max }

    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.min?, self.max?))
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Sets both bounds; returns whether anything changed.
    ///
    /// Bounds must be finite with `min <= max`; on error the filter is untouched.
    pub fn set_range(&mut self, min: f64, max: f64) -> Result<bool, AnalysisError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(AnalysisError::InvalidRange { min, max });
        }
        if self.range() == Some((min, max)) {
            return Ok(false);
        }
        self.min = Some(min);
        self.max = Some(max);
        Ok(true)
    }

    pub fn unset_range(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.min = None;
        self.max = None;
        true
    }

    pub fn to_json(&self) -> Value {
        let mut params = Map::new();
        if let Some(min) = self.min {
            params.insert("min".into(), Value::from(min));
        }
        if let Some(max) = self.max {
            params.insert("max".into(), Value::from(max));
        }
        Value::Object(params)
    }
}
