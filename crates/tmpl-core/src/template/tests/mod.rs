//! Tests for the template engine, split by stage.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::*;
use crate::model::Value;

mod exec;

/// Parses `text` as the template "t" with the default delimiters.
pub(super) fn parse_ok(text: &str) -> Vec<Tree> {
    match parse("t", text, "{{", "}}", 0) {
        Ok(parsed) => parsed.trees,
        Err(err) => panic!("parse failed: {}", err),
    }
}

pub(super) fn parse_err(text: &str) -> SyntaxError {
    match parse("t", text, "{{", "}}", 0) {
        Ok(_) => panic!("expected {:?} to fail", text),
        Err(err) => err,
    }
}

pub(super) fn forest(text: &str) -> BTreeMap<String, Arc<Tree>> {
    parse_ok(text)
        .into_iter()
        .map(|tree| (tree.name.clone(), Arc::new(tree)))
        .collect()
}

pub(super) fn run_with(
    text: &str,
    data: &Value,
    escape: EscapeMode,
    funcs: &FuncMap,
) -> Result<String, RenderError> {
    let trees = forest(text);
    let mut out = String::new();
    Executor::new(&trees, funcs, escape).execute("t", data, &mut out)?;
    Ok(out)
}

/// Executes `text` without escaping.
pub(super) fn run(text: &str, data: &Value) -> Result<String, RenderError> {
    run_with(text, data, EscapeMode::None, &FuncMap::new())
}

pub(super) fn json(value: serde_json::Value) -> Value {
    Value::from_json(value)
}
