//! Filters owned by an analysis node.
//!
//! A filter narrows what its analysis returns without changing the analysis
//! definition itself. Mutating or removing an attached filter asks the host
//! to reload with `ReloadReason::FiltersChanged`.

pub use self::range::RangeFilter;

mod range;

use crate::graph::NodeId;
use serde_json::{json, Value};

/// Handle of a filter attached to an analysis node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId {
    pub(crate) node: NodeId,
    pub(crate) seq: u32,
}

impl FilterId {
    /// The analysis the filter is attached to.
    pub fn analysis(&self) -> NodeId { self.node }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Range(RangeFilter),
}

impl Filter {
    pub fn analysis(&self) -> NodeId {
        match self {
            Filter::Range(range) => range.analysis(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Range(range) => range.column(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Filter::Range(_) => "range",
        }
    }

    /// A filter without constraints does not narrow anything.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Range(range) => range.is_empty(),
        }
    }

    pub fn as_range(&self) -> Option<&RangeFilter> {
        match self {
            Filter::Range(range) => Some(range),
        }
    }

    pub(crate) fn as_range_mut(&mut self) -> Option<&mut RangeFilter> {
        match self {
            Filter::Range(range) => Some(range),
        }
    }

    pub fn to_json(&self) -> Value {
        let params = match self {
            Filter::Range(range) => range.to_json(),
        };
        json!({
            "type": self.kind(),
            "column": self.column(),
            "params": params,
        })
    }
}

impl From<RangeFilter> for Filter {
    fn from(range: RangeFilter) -> Self { Filter::Range(range) }
}
