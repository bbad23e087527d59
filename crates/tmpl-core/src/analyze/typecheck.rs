//! Built-in static type checker
//!
//! Field references are resolved against the schema tree relative to a scope: the
//! path of `.` and the path of `$`. At the top of the entry tree both are the root.
//! `range` and `with` move `.` to the header field for their body (the element
//! node for maps), and a `template` invocation checks the invoked tree once per
//! distinct pipeline target.
//!
//! Constructs that change the scope are checked from [`Analyzer::enter`] together
//! with their whole body, marking every node they validate; the post-order
//! `visit` checks whatever is left at the root scope.

use std::fmt;

use super::{AnalysisHelper, Analyzer};
use crate::model::{Kind, Value};
use crate::schema::{MAP_ELEMENT, SchemaNode, join_path};
use crate::template::{
    Arg, BranchNode, CommandNode, FieldNode, IdentifierNode, ListNode, Node, NodeRef, Number,
    PipeNode, Pos, TemplateNode, VariableNode,
};

/// Resolves field references, condition and comparison kinds, `range`/`with`
/// scoping and `template` targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTyping;

/// Schema paths of `.` and `$`; `None` when not statically known.
#[derive(Debug, Clone)]
struct Scope {
    dot: Option<String>,
    root: Option<String>,
}

impl Scope {
    fn top() -> Self {
        Self {
            dot: Some(String::new()),
            root: Some(String::new()),
        }
    }

    fn with_dot(&self, dot: Option<String>) -> Self {
        Self {
            dot,
            root: self.root.clone(),
        }
    }
}

enum Resolved<'a> {
    Found(SchemaNode<'a>, String),
    Missing,
    Unknown,
}

/// Comparison operand classes. Signed and unsigned integers compare with each
/// other; integers never compare with floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Integer,
    Float,
    Complex,
    String,
    Bool,
    Other(Kind),
}

impl Class {
    fn of(kind: Kind) -> Option<Class> {
        Some(match kind {
            Kind::Int | Kind::Uint => Class::Integer,
            Kind::Float => Class::Float,
            Kind::Complex => Class::Complex,
            Kind::String => Class::String,
            Kind::Bool => Class::Bool,
            // present optionals execute as their pointee
            Kind::Optional | Kind::Dynamic => return None,
            other => Class::Other(other),
        })
    }

    fn is_ordered(self) -> bool {
        matches!(
            self,
            Class::Integer | Class::Float | Class::String
        )
    }

    fn compatible(self, other: Class) -> bool {
        self == other
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Integer => f.write_str("int"),
            Class::Float => f.write_str("float"),
            Class::Complex => f.write_str("complex"),
            Class::String => f.write_str("string"),
            Class::Bool => f.write_str("bool"),
            Class::Other(kind) => write!(f, "{}", kind),
        }
    }
}

const COMPARISONS: &[&str] = &["eq", "ne", "lt", "le", "gt", "ge"];

impl Analyzer for StaticTyping {
    fn enter(&self, helper: &mut AnalysisHelper<'_>, _value: &Value, node: NodeRef<'_>) {
        match node {
            NodeRef::Range(branch) if !helper.is_visited(branch.id) => {
                check_branch(helper, &Scope::top(), branch, true)
            }
            NodeRef::With(branch) if !helper.is_visited(branch.id) => {
                check_branch(helper, &Scope::top(), branch, false)
            }
            _ => {}
        }
    }

    fn visit(&self, helper: &mut AnalysisHelper<'_>, _value: &Value, node: NodeRef<'_>) {
        if helper.is_visited(node.id()) {
            return;
        }
        let scope = Scope::top();
        match node {
            NodeRef::If(branch) => {
                helper.mark_visited(branch.id);
                check_condition(helper, &scope, &branch.pipe);
            }
            NodeRef::Template(template) => {
                helper.mark_visited(template.id);
                check_template(helper, &scope, template);
            }
            NodeRef::Field(field) => check_field(helper, &scope, field),
            NodeRef::Variable(variable) => check_variable(helper, &scope, variable),
            NodeRef::Identifier(ident) => check_identifier(helper, ident),
            _ => {}
        }
    }
}

fn check_list(helper: &mut AnalysisHelper<'_>, scope: &Scope, list: &ListNode) {
    for node in &list.nodes {
        match node {
            Node::Action(action) => check_pipe(helper, scope, &action.pipe),
            Node::If(branch) => {
                helper.mark_visited(branch.id);
                check_pipe(helper, scope, &branch.pipe);
                check_condition(helper, scope, &branch.pipe);
                check_list(helper, scope, &branch.list);
                if let Some(else_list) = &branch.else_list {
                    check_list(helper, scope, else_list);
                }
            }
            Node::Range(branch) => check_branch(helper, scope, branch, true),
            Node::With(branch) => check_branch(helper, scope, branch, false),
            Node::Template(template) => {
                helper.mark_visited(template.id);
                if let Some(pipe) = &template.pipe {
                    check_pipe(helper, scope, pipe);
                }
                check_template(helper, scope, template);
            }
            Node::Text(_) | Node::Comment(_) | Node::Break(_) | Node::Continue(_) => {}
        }
    }
}

fn check_pipe(helper: &mut AnalysisHelper<'_>, scope: &Scope, pipe: &PipeNode) {
    helper.mark_visited(pipe.id);
    for cmd in &pipe.cmds {
        helper.mark_visited(cmd.id);
        for arg in &cmd.args {
            check_arg(helper, scope, arg);
        }
    }
    for variable in &pipe.decl {
        helper.mark_visited(variable.id);
    }
}

fn check_arg(helper: &mut AnalysisHelper<'_>, scope: &Scope, arg: &Arg) {
    match arg {
        Arg::Field(field) => check_field(helper, scope, field),
        Arg::Variable(variable) => check_variable(helper, scope, variable),
        Arg::Identifier(ident) => check_identifier(helper, ident),
        Arg::Chain(chain) => {
            helper.mark_visited(chain.id);
            check_arg(helper, scope, &chain.node);
        }
        Arg::Pipe(pipe) => check_pipe(helper, scope, pipe),
        Arg::Dot(_) | Arg::Nil(_) | Arg::String(_) | Arg::Number(_) | Arg::Bool(_) => {}
    }
}

fn check_field(helper: &mut AnalysisHelper<'_>, scope: &Scope, field: &FieldNode) {
    helper.mark_visited(field.id);
    check_reference(helper, scope.dot.as_deref(), &field.ident, field.pos);
}

fn check_variable(helper: &mut AnalysisHelper<'_>, scope: &Scope, variable: &VariableNode) {
    helper.mark_visited(variable.id);
    if variable.name() == "$" && !variable.fields().is_empty() {
        check_reference(helper, scope.root.as_deref(), variable.fields(), variable.pos);
    }
}

fn check_identifier(helper: &mut AnalysisHelper<'_>, ident: &IdentifierNode) {
    helper.mark_visited(ident.id);
    if !helper.is_function(&ident.name) {
        helper.add_warning(ident.pos, format!("function {:?} is not defined", ident.name));
    }
}

fn check_reference(helper: &mut AnalysisHelper<'_>, base: Option<&str>, segments: &[String], pos: Pos) {
    if let (Resolved::Missing, Some(base)) = (resolve(helper, base, segments), base) {
        let type_name = scope_type(helper, base);
        helper.add_error(
            pos,
            format!("field {:?} not defined in type {}", segments.join("."), type_name),
        );
    }
}

fn resolve<'a>(helper: &AnalysisHelper<'a>, base: Option<&str>, segments: &[String]) -> Resolved<'a> {
    let Some(base) = base else {
        return Resolved::Unknown;
    };
    let path = join_path(base, &segments.join("."));
    match helper.defined_field(&path) {
        Some(node) => Resolved::Found(node, path),
        None => Resolved::Missing,
    }
}

fn scope_type(helper: &AnalysisHelper<'_>, base: &str) -> String {
    match helper.defined_field(base) {
        Some(node) if !base.is_empty() => node.type_name().to_string(),
        _ => helper.type_name().to_string(),
    }
}

/// Base path and segments a single-operand pipeline refers to: `.`, `.A.B` or
/// `$.A.B`.
fn target<'p>(scope: &Scope, pipe: &'p PipeNode) -> Option<(Option<String>, &'p [String])> {
    let [cmd] = pipe.cmds.as_slice() else {
        return None;
    };
    match cmd.args.as_slice() {
        [Arg::Dot(_)] => Some((scope.dot.clone(), &[])),
        [Arg::Field(field)] => Some((scope.dot.clone(), &field.ident)),
        [Arg::Variable(variable)] if variable.name() == "$" => {
            Some((scope.root.clone(), variable.fields()))
        }
        _ => None,
    }
}

fn operand_path<'p>(scope: &Scope, arg: &'p Arg) -> Option<(Option<String>, &'p [String])> {
    match arg {
        Arg::Field(field) => Some((scope.dot.clone(), &field.ident)),
        Arg::Variable(variable) if variable.name() == "$" && !variable.fields().is_empty() => {
            Some((scope.root.clone(), variable.fields()))
        }
        _ => None,
    }
}

fn check_branch(helper: &mut AnalysisHelper<'_>, scope: &Scope, branch: &BranchNode, is_range: bool) {
    helper.mark_visited(branch.id);
    check_pipe(helper, scope, &branch.pipe);

    let body = match target(scope, &branch.pipe) {
        Some((base, segments)) => match resolve(helper, base.as_deref(), segments) {
            Resolved::Found(node, path) => {
                let kind = node.effective_kind();
                if is_range
                    && !matches!(
                        kind,
                        None | Some(Kind::Sequence | Kind::Map | Kind::Int | Kind::Uint)
                    )
                {
                    let shown = if segments.is_empty() {
                        ".".to_string()
                    } else {
                        segments.join(".")
                    };
                    helper.add_error(
                        branch.pos,
                        format!(
                            "cannot range over {:?} (type {})",
                            shown,
                            kind.map(Kind::as_str).unwrap_or("unknown")
                        ),
                    );
                }
                if is_range && node.kind() == Kind::Map {
                    scope.with_dot(Some(join_path(&path, MAP_ELEMENT)))
                } else {
                    scope.with_dot(Some(path))
                }
            }
            Resolved::Missing | Resolved::Unknown => scope.with_dot(None),
        },
        None => scope.with_dot(None),
    };

    check_list(helper, &body, &branch.list);
    if let Some(else_list) = &branch.else_list {
        check_list(helper, scope, else_list);
    }
}

fn check_condition(helper: &mut AnalysisHelper<'_>, scope: &Scope, pipe: &PipeNode) {
    if let [cmd] = pipe.cmds.as_slice() {
        check_condition_command(helper, scope, cmd);
    }
}

fn check_condition_command(helper: &mut AnalysisHelper<'_>, scope: &Scope, cmd: &CommandNode) {
    match cmd.args.as_slice() {
        [single] => check_bool_operand(helper, scope, single),
        [Arg::Identifier(func), operands @ ..] => {
            let name = func.name.as_str();
            if COMPARISONS.contains(&name) && !helper.funcs.contains_key(name) {
                check_comparison(helper, scope, cmd, name, operands);
            } else if matches!(name, "not" | "and" | "or") && !helper.funcs.contains_key(name) {
                for operand in operands {
                    check_bool_operand(helper, scope, operand);
                }
            }
        }
        _ => {}
    }
}

fn check_bool_operand(helper: &mut AnalysisHelper<'_>, scope: &Scope, arg: &Arg) {
    if let Arg::Pipe(pipe) = arg {
        check_condition(helper, scope, pipe);
        return;
    }
    let Some((base, segments)) = operand_path(scope, arg) else {
        return;
    };
    let Resolved::Found(node, _) = resolve(helper, base.as_deref(), segments) else {
        return;
    };
    let shown = segments.join(".");
    match node.effective_kind() {
        Some(Kind::Bool) => {}
        Some(kind) => {
            helper.add_error(
                arg.pos(),
                format!("field {:?} is not type bool: got {}", shown, kind),
            );
        }
        None => {
            helper.add_warning(
                arg.pos(),
                format!("field {:?} has a dynamic type that may not be bool", shown),
            );
        }
    }
}

fn operand_class(helper: &AnalysisHelper<'_>, scope: &Scope, arg: &Arg) -> Option<Class> {
    match arg {
        Arg::String(_) => Some(Class::String),
        Arg::Bool(_) => Some(Class::Bool),
        Arg::Number(number) => Some(match number.value {
            Number::Int(_) | Number::Uint(_) => Class::Integer,
            // all float literals are approximated to one float kind
            Number::Float(_) => Class::Float,
            Number::Complex(..) => Class::Complex,
        }),
        _ => {
            let (base, segments) = operand_path(scope, arg)?;
            match resolve(helper, base.as_deref(), segments) {
                Resolved::Found(node, _) => node.effective_kind().and_then(Class::of),
                Resolved::Missing | Resolved::Unknown => None,
            }
        }
    }
}

fn check_comparison(
    helper: &mut AnalysisHelper<'_>,
    scope: &Scope,
    cmd: &CommandNode,
    name: &str,
    operands: &[Arg],
) {
    let count = operands.len();
    if name == "eq" {
        if count < 2 {
            helper.add_error(
                cmd.pos,
                format!("eq requires at least 2 operands, got {}", count),
            );
            return;
        }
    } else if count != 2 {
        helper.add_error(
            cmd.pos,
            format!("{} requires exactly 2 operands, got {}", name, count),
        );
        return;
    }

    let classes: Vec<(Class, &Arg)> = operands
        .iter()
        .filter_map(|op| operand_class(helper, scope, op).map(|class| (class, op)))
        .collect();

    if name != "eq" && name != "ne" {
        if let Some((class, op)) = classes.iter().find(|(class, _)| !class.is_ordered()) {
            helper.add_error(
                op.pos(),
                format!("invalid type for comparison: {} is {}", op, class),
            );
            return;
        }
    }

    if let Some(((first, first_op), rest)) = classes.split_first().map(|(f, r)| (*f, r)) {
        if let Some((other, other_op)) = rest.iter().find(|(c, _)| !first.compatible(*c)) {
            helper.add_error(
                cmd.pos,
                format!(
                    "incompatible types for comparison: {} ({}) and {} ({})",
                    first_op, first, other_op, other
                ),
            );
        }
    }
}

fn check_template(helper: &mut AnalysisHelper<'_>, scope: &Scope, template: &TemplateNode) {
    if !helper.is_defined_template(&template.name) {
        let type_name = helper.type_name();
        helper.add_error(
            template.pos,
            format!(
                "template {:?} is not provided by type {} or any of its nested members",
                template.name, type_name
            ),
        );
        return;
    }
    let Some(pipe) = &template.pipe else {
        helper.add_error(
            template.pos,
            format!("template {:?} is not invoked with a pipeline", template.name),
        );
        return;
    };
    let Some(tree) = helper.forest().tree(&template.name).cloned() else {
        return;
    };

    let (prefix, key) = match target(scope, pipe) {
        Some((base, segments)) => match resolve(helper, base.as_deref(), segments) {
            Resolved::Found(node, path) => {
                let key = format!("{}#{:?}", template.name, node.id());
                (Some(path), key)
            }
            // already reported by the field check
            Resolved::Missing => return,
            Resolved::Unknown => (None, format!("{}#?", template.name)),
        },
        None => (None, format!("{}#?", template.name)),
    };
    if !helper.mark_checked(key) {
        return;
    }

    let previous = helper.set_tree(tree.clone());
    let inner = Scope {
        dot: prefix.clone(),
        root: prefix,
    };
    check_list(helper, &inner, &tree.root);
    helper.set_tree(previous);
}
