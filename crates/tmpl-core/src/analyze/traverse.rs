use std::sync::Arc;

use super::{AnalysisHelper, Analyzer};
use crate::model::Value;
use crate::template::NodeRef;

/// Depth-first walk: every analyzer enters a node, its children are walked, then
/// every analyzer visits it.
pub(super) fn walk(
    helper: &mut AnalysisHelper<'_>,
    analyzers: &[Arc<dyn Analyzer>],
    value: &Value,
    node: NodeRef<'_>,
) {
    for analyzer in analyzers {
        analyzer.enter(helper, value, node);
    }
    for child in node.children() {
        walk(helper, analyzers, value, child);
    }
    for analyzer in analyzers {
        analyzer.visit(helper, value, node);
    }
}
