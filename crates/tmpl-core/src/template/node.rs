//! Parse tree
//!
//! Statements ([`Node`]) and operands ([`Arg`]) are separate owned enums; analyzers
//! and traversal see both through the single borrowed [`NodeRef`] view, which is
//! the canonical node-kind enumeration.

use std::fmt;
use std::sync::Arc;

/// Byte offset into the source text of the tree that owns the node.
pub type Pos = usize;

/// Identity of a node, unique across every tree of one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// One named template.
#[derive(Debug, Clone)]
pub struct Tree {
    pub name: String,
    pub root: ListNode,
    /// Source of the fragment the tree was parsed from; shared by every tree
    /// defined in that fragment.
    pub text: Arc<str>,
}

impl Tree {
    /// 1-based line and column of `pos`.
    pub fn location(&self, pos: Pos) -> (usize, usize) {
        let upto = &self.text[..pos.min(self.text.len())];
        let line = upto.matches('\n').count() + 1;
        let col = match upto.rfind('\n') {
            Some(nl) => upto[nl + 1..].chars().count() + 1,
            None => upto.chars().count() + 1,
        };
        (line, col)
    }

    /// `name:line:col` of `pos`.
    pub fn position(&self, pos: Pos) -> String {
        let (line, col) = self.location(pos);
        format!("{}:{}:{}", self.name, line, col)
    }

    /// True when the tree holds only whitespace text and comments.
    pub fn is_empty(&self) -> bool {
        self.root.nodes.iter().all(|node| match node {
            Node::Text(text) => text.text.trim().is_empty(),
            Node::Comment(_) => true,
            _ => false,
        })
    }

    /// Same tree under another name.
    pub fn renamed(&self, name: &str) -> Tree {
        Tree {
            name: name.to_string(),
            root: self.root.clone(),
            text: Arc::clone(&self.text),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Text(TextNode),
    Comment(CommentNode),
    Action(ActionNode),
    If(BranchNode),
    Range(BranchNode),
    With(BranchNode),
    Template(TemplateNode),
    Break(LoopControlNode),
    Continue(LoopControlNode),
}

#[derive(Debug, Clone)]
pub struct ListNode {
    pub id: NodeId,
    pub pos: Pos,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct TextNode {
    pub id: NodeId,
    pub pos: Pos,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CommentNode {
    pub id: NodeId,
    pub pos: Pos,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ActionNode {
    pub id: NodeId,
    pub pos: Pos,
    pub pipe: PipeNode,
}

/// Shared shape of `if`, `range` and `with`.
#[derive(Debug, Clone)]
pub struct BranchNode {
    pub id: NodeId,
    pub pos: Pos,
    pub pipe: PipeNode,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
}

#[derive(Debug, Clone)]
pub struct TemplateNode {
    pub id: NodeId,
    pub pos: Pos,
    pub name: String,
    pub pipe: Option<PipeNode>,
}

#[derive(Debug, Clone)]
pub struct LoopControlNode {
    pub id: NodeId,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct PipeNode {
    pub id: NodeId,
    pub pos: Pos,
    /// `$x = ...` rather than `$x := ...`.
    pub is_assign: bool,
    pub decl: Vec<VariableNode>,
    pub cmds: Vec<CommandNode>,
}

#[derive(Debug, Clone)]
pub struct CommandNode {
    pub id: NodeId,
    pub pos: Pos,
    pub args: Vec<Arg>,
}

/// Operand of a command.
#[derive(Debug, Clone)]
pub enum Arg {
    Field(FieldNode),
    Variable(VariableNode),
    Dot(LeafNode),
    Nil(LeafNode),
    Identifier(IdentifierNode),
    String(StringNode),
    Number(NumberNode),
    Bool(BoolNode),
    Chain(ChainNode),
    Pipe(PipeNode),
}

/// `.A.B`
#[derive(Debug, Clone)]
pub struct FieldNode {
    pub id: NodeId,
    pub pos: Pos,
    pub ident: Vec<String>,
}

impl FieldNode {
    /// Dotted path without the leading dot.
    pub fn path(&self) -> String {
        self.ident.join(".")
    }
}

/// `$x.A.B`; `ident[0]` is the variable name including `$`.
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub id: NodeId,
    pub pos: Pos,
    pub ident: Vec<String>,
}

impl VariableNode {
    pub fn name(&self) -> &str {
        self.ident.first().map(String::as_str).unwrap_or("$")
    }

    /// Field path after the variable name.
    pub fn fields(&self) -> &[String] {
        self.ident.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct LeafNode {
    pub id: NodeId,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct IdentifierNode {
    pub id: NodeId,
    pub pos: Pos,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StringNode {
    pub id: NodeId,
    pub pos: Pos,
    pub quoted: String,
    pub text: String,
}

/// Numeric literal class, mirroring the literal's syntax.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    /// Integer literal too large for `i64`.
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
}

#[derive(Debug, Clone)]
pub struct NumberNode {
    pub id: NodeId,
    pub pos: Pos,
    pub text: String,
    pub value: Number,
}

#[derive(Debug, Clone)]
pub struct BoolNode {
    pub id: NodeId,
    pub pos: Pos,
    pub value: bool,
}

/// `(pipeline).A.B`
#[derive(Debug, Clone)]
pub struct ChainNode {
    pub id: NodeId,
    pub pos: Pos,
    pub node: Box<Arg>,
    pub field: Vec<String>,
}

/// Borrowed view over every node kind.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'t> {
    List(&'t ListNode),
    Text(&'t TextNode),
    Comment(&'t CommentNode),
    Action(&'t ActionNode),
    If(&'t BranchNode),
    Range(&'t BranchNode),
    With(&'t BranchNode),
    Template(&'t TemplateNode),
    Break(&'t LoopControlNode),
    Continue(&'t LoopControlNode),
    Pipe(&'t PipeNode),
    Command(&'t CommandNode),
    Field(&'t FieldNode),
    Variable(&'t VariableNode),
    Dot(&'t LeafNode),
    Nil(&'t LeafNode),
    Identifier(&'t IdentifierNode),
    String(&'t StringNode),
    Number(&'t NumberNode),
    Bool(&'t BoolNode),
    Chain(&'t ChainNode),
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        match self {
            NodeRef::List(n) => n.id,
            NodeRef::Text(n) => n.id,
            NodeRef::Comment(n) => n.id,
            NodeRef::Action(n) => n.id,
            NodeRef::If(n) | NodeRef::Range(n) | NodeRef::With(n) => n.id,
            NodeRef::Template(n) => n.id,
            NodeRef::Break(n) | NodeRef::Continue(n) => n.id,
            NodeRef::Pipe(n) => n.id,
            NodeRef::Command(n) => n.id,
            NodeRef::Field(n) => n.id,
            NodeRef::Variable(n) => n.id,
            NodeRef::Dot(n) | NodeRef::Nil(n) => n.id,
            NodeRef::Identifier(n) => n.id,
            NodeRef::String(n) => n.id,
            NodeRef::Number(n) => n.id,
            NodeRef::Bool(n) => n.id,
            NodeRef::Chain(n) => n.id,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            NodeRef::List(n) => n.pos,
            NodeRef::Text(n) => n.pos,
            NodeRef::Comment(n) => n.pos,
            NodeRef::Action(n) => n.pos,
            NodeRef::If(n) | NodeRef::Range(n) | NodeRef::With(n) => n.pos,
            NodeRef::Template(n) => n.pos,
            NodeRef::Break(n) | NodeRef::Continue(n) => n.pos,
            NodeRef::Pipe(n) => n.pos,
            NodeRef::Command(n) => n.pos,
            NodeRef::Field(n) => n.pos,
            NodeRef::Variable(n) => n.pos,
            NodeRef::Dot(n) | NodeRef::Nil(n) => n.pos,
            NodeRef::Identifier(n) => n.pos,
            NodeRef::String(n) => n.pos,
            NodeRef::Number(n) => n.pos,
            NodeRef::Bool(n) => n.pos,
            NodeRef::Chain(n) => n.pos,
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<NodeRef<'t>> {
        match *self {
            NodeRef::List(list) => list.nodes.iter().map(NodeRef::from).collect(),
            NodeRef::Action(action) => vec![NodeRef::Pipe(&action.pipe)],
            NodeRef::If(branch) | NodeRef::Range(branch) | NodeRef::With(branch) => {
                let mut children = vec![NodeRef::Pipe(&branch.pipe), NodeRef::List(&branch.list)];
                if let Some(else_list) = &branch.else_list {
                    children.push(NodeRef::List(else_list));
                }
                children
            }
            NodeRef::Template(template) => template.pipe.iter().map(NodeRef::Pipe).collect(),
            NodeRef::Pipe(pipe) => pipe
                .cmds
                .iter()
                .map(NodeRef::Command)
                .chain(pipe.decl.iter().map(NodeRef::Variable))
                .collect(),
            NodeRef::Command(cmd) => cmd.args.iter().map(NodeRef::from).collect(),
            NodeRef::Chain(chain) => vec![NodeRef::from(chain.node.as_ref())],
            _ => Vec::new(),
        }
    }
}

impl<'t> From<&'t Node> for NodeRef<'t> {
    fn from(node: &'t Node) -> Self {
        match node {
            Node::Text(n) => NodeRef::Text(n),
            Node::Comment(n) => NodeRef::Comment(n),
            Node::Action(n) => NodeRef::Action(n),
            Node::If(n) => NodeRef::If(n),
            Node::Range(n) => NodeRef::Range(n),
            Node::With(n) => NodeRef::With(n),
            Node::Template(n) => NodeRef::Template(n),
            Node::Break(n) => NodeRef::Break(n),
            Node::Continue(n) => NodeRef::Continue(n),
        }
    }
}

impl<'t> From<&'t Arg> for NodeRef<'t> {
    fn from(arg: &'t Arg) -> Self {
        match arg {
            Arg::Field(n) => NodeRef::Field(n),
            Arg::Variable(n) => NodeRef::Variable(n),
            Arg::Dot(n) => NodeRef::Dot(n),
            Arg::Nil(n) => NodeRef::Nil(n),
            Arg::Identifier(n) => NodeRef::Identifier(n),
            Arg::String(n) => NodeRef::String(n),
            Arg::Number(n) => NodeRef::Number(n),
            Arg::Bool(n) => NodeRef::Bool(n),
            Arg::Chain(n) => NodeRef::Chain(n),
            Arg::Pipe(n) => NodeRef::Pipe(n),
        }
    }
}

impl Arg {
    pub fn pos(&self) -> Pos {
        NodeRef::from(self).pos()
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Field(n) => write!(f, ".{}", n.ident.join(".")),
            Arg::Variable(n) => f.write_str(&n.ident.join(".")),
            Arg::Dot(_) => f.write_str("."),
            Arg::Nil(_) => f.write_str("nil"),
            Arg::Identifier(n) => f.write_str(&n.name),
            Arg::String(n) => f.write_str(&n.quoted),
            Arg::Number(n) => f.write_str(&n.text),
            Arg::Bool(n) => write!(f, "{}", n.value),
            Arg::Chain(n) => write!(f, "{}.{}", n.node, n.field.join(".")),
            Arg::Pipe(n) => write!(f, "({})", n),
        }
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

impl fmt::Display for PipeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            let names: Vec<String> = self.decl.iter().map(|v| v.ident.join(".")).collect();
            let op = if self.is_assign { "=" } else { ":=" };
            write!(f, "{} {} ", names.join(", "), op)?;
        }
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}
