//! Tree execution

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use super::error::RenderError;
use super::funcs::{self, FuncMap};
use super::node::*;
use crate::model::Value;

/// Nested `template` invocations allowed before execution gives up.
pub const MAX_TEMPLATE_DEPTH: usize = 1000;

/// How action output is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeMode {
    /// Action output is HTML-escaped; literal text is written as-is.
    #[default]
    Html,
    None,
}

enum Flow {
    Normal,
    Break,
    Continue,
}

type ExecResult<T> = Result<T, RenderError>;

const NO_ARGS: &[Arg] = &[];

/// Runs named trees against data.
pub struct Executor<'p> {
    trees: &'p BTreeMap<String, Arc<Tree>>,
    funcs: &'p FuncMap,
    escape: EscapeMode,
}

impl<'p> Executor<'p> {
    pub fn new(
        trees: &'p BTreeMap<String, Arc<Tree>>,
        funcs: &'p FuncMap,
        escape: EscapeMode,
    ) -> Self {
        Self {
            trees,
            funcs,
            escape,
        }
    }

    /// Executes the tree `name` with `data` as both `.` and `$`, appending to `out`.
    pub fn execute(&self, name: &str, data: &Value, out: &mut String) -> ExecResult<()> {
        let tree: &'p Tree = self
            .trees
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| RenderError::UndefinedTemplate {
                name: name.to_string(),
            })?;
        let mut state = State {
            exec: self,
            tree,
            vars: vec![("$".to_string(), data.clone())],
            depth: 0,
            out,
        };
        state.walk(data, &tree.root)?;
        Ok(())
    }
}

struct State<'e, 'p, 'o> {
    exec: &'e Executor<'p>,
    tree: &'p Tree,
    vars: Vec<(String, Value)>,
    depth: usize,
    out: &'o mut String,
}

impl<'p> State<'_, 'p, '_> {
    fn error(&self, pos: Pos, message: impl Into<String>) -> RenderError {
        let (line, col) = self.tree.location(pos);
        RenderError::Exec {
            name: self.tree.name.clone(),
            line,
            col,
            message: message.into(),
        }
    }

    fn walk(&mut self, dot: &Value, list: &'p ListNode) -> ExecResult<Flow> {
        for node in &list.nodes {
            let flow = match node {
                Node::Text(text) => {
                    self.out.push_str(&text.text);
                    Flow::Normal
                }
                Node::Comment(_) => Flow::Normal,
                Node::Action(action) => {
                    let value = self.eval_pipeline(dot, &action.pipe)?;
                    if action.pipe.decl.is_empty() {
                        self.print(&value);
                    }
                    Flow::Normal
                }
                Node::If(branch) => self.walk_if_or_with(false, dot, branch)?,
                Node::With(branch) => self.walk_if_or_with(true, dot, branch)?,
                Node::Range(branch) => self.walk_range(dot, branch)?,
                Node::Template(template) => {
                    self.walk_template(dot, template)?;
                    Flow::Normal
                }
                Node::Break(_) => Flow::Break,
                Node::Continue(_) => Flow::Continue,
            };
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn walk_if_or_with(
        &mut self,
        is_with: bool,
        dot: &Value,
        branch: &'p BranchNode,
    ) -> ExecResult<Flow> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        let flow = if value.is_true() {
            let dot = if is_with { &value } else { dot };
            self.walk(dot, &branch.list)
        } else if let Some(else_list) = &branch.else_list {
            self.walk(dot, else_list)
        } else {
            Ok(Flow::Normal)
        };
        self.vars.truncate(mark);
        flow
    }

    fn walk_range(&mut self, dot: &Value, branch: &'p BranchNode) -> ExecResult<Flow> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(dot, &branch.pipe)?;

        let items: Vec<(Value, Value)> = match &value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::Int(i as i64), item.clone()))
                .collect(),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Value::Int(_) | Value::Uint(_) if branch.pipe.decl.len() > 1 => {
                return Err(self.error(
                    branch.pos,
                    format!("can't use {} to iterate over more than one variable", value),
                ));
            }
            Value::Int(n) => (0..(*n).max(0)).map(|i| (Value::Int(i), Value::Int(i))).collect(),
            Value::Uint(n) => (0..*n).map(|i| (Value::Uint(i), Value::Uint(i))).collect(),
            Value::Nil => Vec::new(),
            other => {
                return Err(self.error(branch.pos, format!("range can't iterate over {}", other)));
            }
        };

        if items.is_empty() {
            let flow = match &branch.else_list {
                Some(else_list) => self.walk(dot, else_list)?,
                None => Flow::Normal,
            };
            self.vars.truncate(mark);
            return Ok(flow);
        }

        for (index, elem) in items {
            match branch.pipe.decl.as_slice() {
                [] => {}
                [only] => self.set_var(only, elem.clone())?,
                [key, item, ..] => {
                    self.set_var(key, index)?;
                    self.set_var(item, elem.clone())?;
                }
            }
            let inner = self.vars.len();
            let flow = self.walk(&elem, &branch.list)?;
            self.vars.truncate(inner);
            if matches!(flow, Flow::Break) {
                break;
            }
        }
        self.vars.truncate(mark);
        Ok(Flow::Normal)
    }

    fn walk_template(&mut self, dot: &Value, template: &'p TemplateNode) -> ExecResult<()> {
        let trees = self.exec.trees;
        let tree: &'p Tree = trees.get(&template.name).map(Arc::as_ref).ok_or_else(|| {
            self.error(template.pos, format!("no such template {:?}", template.name))
        })?;
        if self.depth >= MAX_TEMPLATE_DEPTH {
            return Err(self.error(
                template.pos,
                format!("exceeded maximum template depth ({})", MAX_TEMPLATE_DEPTH),
            ));
        }

        let data = match &template.pipe {
            Some(pipe) => self.eval_pipeline(dot, pipe)?,
            None => Value::Nil,
        };

        let saved_tree = std::mem::replace(&mut self.tree, tree);
        let saved_vars = std::mem::replace(&mut self.vars, vec![("$".to_string(), data.clone())]);
        self.depth += 1;
        let result = self.walk(&data, &tree.root);
        self.depth -= 1;
        self.vars = saved_vars;
        self.tree = saved_tree;
        result.map(|_| ())
    }

    fn print(&mut self, value: &Value) {
        match (value, self.exec.escape) {
            (Value::Nil, EscapeMode::Html) => {}
            (Value::Nil, EscapeMode::None) => self.out.push_str("<no value>"),
            (value, EscapeMode::Html) => self.out.push_str(&funcs::html_escape(&value.to_string())),
            (value, EscapeMode::None) => self.out.push_str(&value.to_string()),
        }
    }

    fn var(&self, name: &str, pos: Pos) -> ExecResult<Value> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| self.error(pos, format!("undefined variable: {}", name)))
    }

    fn set_var(&mut self, variable: &VariableNode, value: Value) -> ExecResult<()> {
        let name = variable.name();
        match self.vars.iter_mut().rev().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(self.error(variable.pos, format!("undefined variable: {}", name))),
        }
    }

    fn eval_pipeline(&mut self, dot: &Value, pipe: &'p PipeNode) -> ExecResult<Value> {
        let mut value: Option<Value> = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(dot, cmd, value.take())?);
        }
        let value = value.unwrap_or_default();

        for variable in &pipe.decl {
            if pipe.is_assign {
                self.set_var(variable, value.clone())?;
            } else {
                self.vars.push((variable.name().to_string(), value.clone()));
            }
        }
        Ok(value)
    }

    fn no_arguments(&self, cmd: &CommandNode, fin: &Option<Value>) -> ExecResult<()> {
        if cmd.args.len() > 1 || fin.is_some() {
            return Err(self.error(
                cmd.pos,
                format!("can't give argument to non-function {}", cmd.args[0]),
            ));
        }
        Ok(())
    }

    fn eval_command(
        &mut self,
        dot: &Value,
        cmd: &'p CommandNode,
        fin: Option<Value>,
    ) -> ExecResult<Value> {
        let first = &cmd.args[0];
        if let Arg::Identifier(ident) = first {
            return self.eval_function(dot, ident, &cmd.args[1..], fin);
        }
        self.no_arguments(cmd, &fin)?;
        match first {
            Arg::Nil(leaf) => Err(self.error(leaf.pos, "nil is not a command")),
            other => self.eval_arg(dot, other),
        }
    }

    fn eval_function(
        &mut self,
        dot: &Value,
        ident: &'p IdentifierNode,
        args: &'p [Arg],
        fin: Option<Value>,
    ) -> ExecResult<Value> {
        let name = ident.name.as_str();

        if (name == "and" || name == "or") && !self.exec.funcs.contains_key(name) {
            if args.is_empty() && fin.is_none() {
                return Err(self.error(
                    ident.pos,
                    format!("wrong number of args for {}: want at least 1 got 0", name),
                ));
            }
            let stop_on = name == "or";
            let mut last = Value::Nil;
            for arg in args {
                last = self.eval_arg(dot, arg)?;
                if last.is_true() == stop_on {
                    return Ok(last);
                }
            }
            return Ok(fin.unwrap_or(last));
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        for arg in args {
            values.push(self.eval_arg(dot, arg)?);
        }
        values.extend(fin);

        let result = if let Some(function) = self.exec.funcs.get(name) {
            function.call(&values)
        } else if let Some(builtin) = funcs::builtin(name) {
            builtin(&values)
        } else {
            return Err(self.error(ident.pos, format!("function {:?} not defined", name)));
        };
        result.map_err(|message| self.error(ident.pos, format!("error calling {}: {}", name, message)))
    }

    fn eval_arg(&mut self, dot: &Value, arg: &'p Arg) -> ExecResult<Value> {
        match arg {
            Arg::Dot(_) => Ok(dot.clone()),
            Arg::Nil(_) => Ok(Value::Nil),
            Arg::Bool(b) => Ok(Value::Bool(b.value)),
            Arg::String(s) => Ok(Value::String(s.text.clone())),
            Arg::Number(n) => Ok(match n.value {
                Number::Int(i) => Value::Int(i),
                Number::Uint(u) => Value::Uint(u),
                Number::Float(f) => Value::Float(f),
                Number::Complex(re, im) => Value::Complex(re, im),
            }),
            Arg::Field(field) => self.eval_fields(dot.clone(), &field.ident, field.pos),
            Arg::Variable(variable) => {
                let value = self.var(variable.name(), variable.pos)?;
                self.eval_fields(value, variable.fields(), variable.pos)
            }
            Arg::Identifier(ident) => self.eval_function(dot, ident, NO_ARGS, None),
            Arg::Pipe(pipe) => {
                let mark = self.vars.len();
                let value = self.eval_pipeline(dot, pipe);
                self.vars.truncate(mark);
                value
            }
            Arg::Chain(chain) => {
                let receiver = self.eval_arg(dot, &chain.node)?;
                self.eval_fields(receiver, &chain.field, chain.pos)
            }
        }
    }

    fn eval_fields(&self, mut receiver: Value, names: &[String], pos: Pos) -> ExecResult<Value> {
        for name in names {
            receiver = match &receiver {
                Value::Object(object) => object.lookup(name).ok_or_else(|| {
                    self.error(
                        pos,
                        format!("can't evaluate field {} in type {}", name, object.type_name()),
                    )
                })?,
                Value::Map(entries) => entries.get(name).cloned().unwrap_or_default(),
                Value::Nil => {
                    return Err(self.error(pos, format!("nil pointer evaluating .{}", name)));
                }
                other => {
                    return Err(self.error(
                        pos,
                        format!("can't evaluate field {} in type {}", name, other.type_name()),
                    ));
                }
            };
        }
        Ok(receiver)
    }
}
