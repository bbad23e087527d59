//! Compiled program
//!
//! The render-ready artifact published by a successful compilation. Trees are
//! shared behind `Arc`, so cloning a program for one render is cheap and never
//! aliases state a later recompilation could change.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::consts::OUTLET;
use crate::model::Value;
use crate::template::{EscapeMode, Executor, FuncMap, RenderError, Tree};

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    entry: String,
    trees: BTreeMap<String, Arc<Tree>>,
    funcs: FuncMap,
    escape: EscapeMode,
}

impl CompiledProgram {
    pub(crate) fn new(
        entry: String,
        trees: BTreeMap<String, Arc<Tree>>,
        funcs: FuncMap,
        escape: EscapeMode,
    ) -> Self {
        Self {
            entry,
            trees,
            funcs,
            escape,
        }
    }

    /// Name of the tree rendered when no target is given.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    pub fn escape(&self) -> EscapeMode {
        self.escape
    }

    /// Registers the entry tree under `name` as well, replacing any tree of that
    /// name. With [`OUTLET`] this lets a leaf fragment be rendered inside a layout
    /// that invokes `{{template "outlet" .}}`.
    pub fn alias(&mut self, name: &str) {
        if let Some(entry) = self.trees.get(&self.entry) {
            let renamed = Arc::new(entry.renamed(name));
            self.trees.insert(name.to_string(), renamed);
        }
    }

    /// Shorthand for aliasing the entry tree as the outlet.
    pub fn alias_outlet(&mut self) {
        self.alias(OUTLET);
    }

    /// Adds functions for this copy of the program only.
    pub fn extend_funcs(&mut self, funcs: FuncMap) {
        self.funcs.extend(funcs);
    }

    /// Executes `name` (the entry tree when `None`) against `data`, appending the
    /// output to `out`.
    pub fn execute(&self, name: Option<&str>, data: &Value, out: &mut String) -> Result<(), RenderError> {
        let name = name.unwrap_or(&self.entry);
        Executor::new(&self.trees, &self.funcs, self.escape).execute(name, data, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse;

    fn program(trees: &[(&str, &str)]) -> CompiledProgram {
        let mut map = BTreeMap::new();
        let mut next_id = 0;
        for (name, text) in trees {
            let parsed = parse(name, text, "{{", "}}", next_id).unwrap();
            next_id = parsed.next_id;
            for tree in parsed.trees {
                map.insert(tree.name.clone(), Arc::new(tree));
            }
        }
        CompiledProgram::new(trees[0].0.to_string(), map, FuncMap::new(), EscapeMode::None)
    }

    #[test]
    fn test_execute_entry_by_default() {
        let program = program(&[("Page", "page {{.}}")]);
        let mut out = String::new();
        program.execute(None, &Value::from(1i64), &mut out).unwrap();
        assert_eq!(out, "page 1");
    }

    #[test]
    fn test_outlet_alias_composes_layout() {
        let mut program = program(&[
            ("Leaf", "<p>{{.}}</p>"),
            ("Layout", "<main>{{template \"outlet\" .}}</main>"),
        ]);
        program.alias_outlet();
        assert!(program.contains(OUTLET));

        let mut out = String::new();
        program
            .execute(Some("Layout"), &Value::from("hi"), &mut out)
            .unwrap();
        assert_eq!(out, "<main><p>hi</p></main>");
    }

    #[test]
    fn test_alias_does_not_touch_the_original() {
        let original = program(&[("Leaf", "x")]);
        let mut copy = original.clone();
        copy.alias("other");
        assert!(copy.contains("other"));
        assert!(!original.contains("other"));
    }

    #[test]
    fn test_unknown_target() {
        let program = program(&[("Page", "x")]);
        let mut out = String::new();
        let err = program
            .execute(Some("nope"), &Value::Nil, &mut out)
            .unwrap_err();
        assert!(matches!(err, RenderError::UndefinedTemplate { name } if name == "nope"));
    }
}
