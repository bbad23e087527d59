//! Static analysis
//!
//! An [`Analyzer`] is handed every node of the entry tree, depth first: `enter`
//! before the node's children, `visit` after them. All analyzers share one
//! [`AnalysisHelper`], which holds the schema, the parse forest and the report
//! being accumulated. Errors never stop the traversal.
//!
//! The helper's visited set lets an analyzer that validated a node from an
//! enclosing construct suppress the generic check of that node later on.

mod traverse;
mod typecheck;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub use typecheck::StaticTyping;

use crate::config::Options;
use crate::config::consts::OUTLET;
use crate::error::CompileError;
use crate::forest::ParseForest;
use crate::model::{Model, Value};
use crate::schema::{SchemaNode, SchemaTree};
use crate::template::{FuncMap, Function, NodeId, NodeRef, Pos, Tree, is_builtin};

/// A pluggable check over the entry tree.
pub trait Analyzer: Send + Sync {
    /// Called before the node's children are traversed.
    fn enter(&self, _helper: &mut AnalysisHelper<'_>, _value: &Value, _node: NodeRef<'_>) {}

    /// Called after the node's children are traversed.
    fn visit(&self, helper: &mut AnalysisHelper<'_>, value: &Value, node: NodeRef<'_>);

    /// Called once after the traversal.
    fn finish(&self, _helper: &mut AnalysisHelper<'_>) {}
}

impl<F> Analyzer for F
where
    F: Fn(&mut AnalysisHelper<'_>, &Value, NodeRef<'_>) + Send + Sync,
{
    fn visit(&self, helper: &mut AnalysisHelper<'_>, value: &Value, node: NodeRef<'_>) {
        self(helper, value, node)
    }
}

/// Outcome of one analysis pass.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Functions registered by analyzers; they are available when rendering.
    pub funcs: FuncMap,
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Shared state of one analysis pass.
pub struct AnalysisHelper<'a> {
    forest: &'a ParseForest,
    schema: &'a SchemaTree,
    funcs: &'a FuncMap,
    type_name: &'a str,
    tree: Arc<Tree>,
    visited: HashSet<NodeId>,
    checked: HashSet<String>,
    reported: HashSet<String>,
    report: AnalysisReport,
}

impl<'a> AnalysisHelper<'a> {
    pub(crate) fn new(
        forest: &'a ParseForest,
        schema: &'a SchemaTree,
        funcs: &'a FuncMap,
        type_name: &'a str,
        tree: Arc<Tree>,
    ) -> Self {
        Self {
            forest,
            schema,
            funcs,
            type_name,
            tree,
            visited: HashSet::new(),
            checked: HashSet::new(),
            reported: HashSet::new(),
            report: AnalysisReport::default(),
        }
    }

    pub fn forest(&self) -> &'a ParseForest {
        self.forest
    }

    pub fn schema(&self) -> &'a SchemaTree {
        self.schema
    }

    /// Name of the root type.
    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    /// Tree the positions of reported nodes refer to.
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Switches the tree positions are reported against, returning the previous.
    pub fn set_tree(&mut self, tree: Arc<Tree>) -> Arc<Tree> {
        std::mem::replace(&mut self.tree, tree)
    }

    /// Records an error at `pos` of the current tree. A tree reached through
    /// several members of one type is checked once per member, so an identical
    /// positioned message is only kept the first time.
    pub fn add_error(&mut self, pos: Pos, message: impl fmt::Display) {
        if let Some(entry) = self.positioned(pos, message) {
            self.report.errors.push(entry);
        }
    }

    pub fn add_warning(&mut self, pos: Pos, message: impl fmt::Display) {
        if let Some(entry) = self.positioned(pos, message) {
            self.report.warnings.push(entry);
        }
    }

    fn positioned(&mut self, pos: Pos, message: impl fmt::Display) -> Option<String> {
        let entry = format!("{}: {}", self.tree.position(pos), message);
        self.reported.insert(entry.clone()).then_some(entry)
    }

    /// Makes `func` callable by name from the compiled templates.
    pub fn add_func(&mut self, name: impl Into<String>, func: Function) {
        self.report.funcs.insert(name.into(), func);
    }

    pub fn is_visited(&self, id: NodeId) -> bool {
        self.visited.contains(&id)
    }

    pub fn mark_visited(&mut self, id: NodeId) {
        self.visited.insert(id);
    }

    /// Records `key`; true the first time it is seen in this pass.
    pub fn mark_checked(&mut self, key: impl Into<String>) -> bool {
        self.checked.insert(key.into())
    }

    /// Whether a `template` invocation of `name` can be resolved. The outlet is
    /// always defined.
    pub fn is_defined_template(&self, name: &str) -> bool {
        name == OUTLET || self.forest.contains(name)
    }

    /// Schema node at a dotted path from the root.
    pub fn defined_field(&self, path: &str) -> Option<SchemaNode<'a>> {
        self.schema.find(path)
    }

    /// Functions registered so far in this pass.
    pub fn func_map(&self) -> &FuncMap {
        &self.report.funcs
    }

    /// Whether `name` resolves to a builtin, a configured or a registered function.
    pub fn is_function(&self, name: &str) -> bool {
        is_builtin(name) || self.funcs.contains_key(name) || self.report.funcs.contains_key(name)
    }

    pub fn report(&self) -> &AnalysisReport {
        &self.report
    }

    pub(crate) fn into_report(self) -> AnalysisReport {
        self.report
    }
}

/// Runs `analyzers` over the entry tree of `forest`.
pub(crate) fn run(
    forest: &ParseForest,
    schema: &SchemaTree,
    options: &Options,
    value: &Value,
    analyzers: &[Arc<dyn Analyzer>],
) -> AnalysisReport {
    let Some(entry) = forest.entry_tree() else {
        return AnalysisReport::default();
    };
    let mut helper = AnalysisHelper::new(
        forest,
        schema,
        &options.funcs,
        schema.root().type_name(),
        Arc::clone(entry),
    );
    traverse::walk(&mut helper, analyzers, value, NodeRef::List(&entry.root));
    for analyzer in analyzers {
        analyzer.finish(&mut helper);
    }
    helper.into_report()
}

/// Runs the analysis stages of a compilation without building a program, so that
/// warnings can be inspected on their own.
pub fn analyze<T: Model>(
    root: &T,
    options: &Options,
    analyzers: &[Arc<dyn Analyzer>],
) -> Result<AnalysisReport, CompileError> {
    let checked = crate::compile::check(root, options, analyzers)?;
    Ok(checked.report)
}

#[cfg(test)]
mod tests;
