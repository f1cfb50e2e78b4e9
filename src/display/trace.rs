use crate::graph::{AnalysisGraph, AnalysisNode, NodeId};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the source tree under `target` as an indented audit trace.
///
/// ```text
/// AUDIT TRACE for analysis 'a2':
/// --------------------------------------------------
/// [L1] a2 <filter-range> [ready] filters=1
/// `--source: [L2] a1 <buffer> [running]
///    `--source: [L3] a0 <source> [ready]
/// ```
///
/// A node reached a second time is printed as a back reference to the level
/// where it first appeared.
pub fn format_trace(graph: &AnalysisGraph<'_>, target: NodeId) -> String {
    let mut tracer = Tracer {
        graph,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    if let Some(node) = graph.node(target) {
        let _ = writeln!(tracer.output, "AUDIT TRACE for analysis '{}':", node.id());
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Invalid Node ID {:?}", target);
    }
    tracer.output
}

struct Tracer<'g, 'a> {
    graph: &'g AnalysisGraph<'a>,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'g, 'a> Tracer<'g, 'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let Some(node) = self.graph.node(node_id) else {
            let _ = writeln!(self.output, "{}[L{}] <missing {:?}>", prefix, level, node_id);
            return;
        };
        let _ = writeln!(self.output, "{}[L{}] {}", prefix, level, Self::describe(node));

        let sources = self.graph.sources_of(node_id);
        let stem = Self::child_stem(prefix);
        for (i, (name, child)) in sources.iter().enumerate() {
            let connector = if i == sources.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}{}: ", stem, connector, name);
            self.trace_node(*child, level + 1, &full_prefix);
        }
    }

    fn describe(node: &AnalysisNode) -> String {
        let mut line = format!("{} <{}>", node.id(), node.analysis_type());
        match node.status() {
            Some(status) => {
                let _ = write!(line, " [{}]", status);
            }
            None => line.push_str(" [?]"),
        }
        if let Some(error) = node.error() {
            let _ = write!(line, " (Err: {})", error);
        }
        if node.filter_count() > 0 {
            let _ = write!(line, " filters={}", node.filter_count());
        }
        line
    }

    /// Turns the parent's connector into the indentation of its children.
    fn child_stem(prefix: &str) -> String {
        let structural = match (prefix.rfind("`--"), prefix.rfind("|--")) {
            (Some(a), Some(b)) => a.max(b) + 3,
            (Some(a), None) | (None, Some(a)) => a + 3,
            (None, None) => return String::new(),
        };
        prefix[..structural].replace("`--", "   ").replace("|--", "|  ")
    }
}
