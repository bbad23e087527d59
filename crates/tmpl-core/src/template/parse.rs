//! Recursive-descent parser
//!
//! Turns lexed items into named [`Tree`]s: the fragment's own tree plus one per
//! `define`/`block`. Node ids continue from `first_id` so that ids stay unique
//! across every fragment of a compilation.

use std::sync::Arc;

use super::error::SyntaxError;
use super::lex::{Item, ItemKind, Keyword, Lexer};
use super::node::*;

/// Trees parsed from one fragment, top-level tree first.
#[derive(Debug)]
pub struct Parsed {
    pub trees: Vec<Tree>,
    /// First id not used by this parse.
    pub next_id: u32,
}

/// Parses `text` as the template `name`.
pub fn parse(
    name: &str,
    text: &str,
    left: &str,
    right: &str,
    first_id: u32,
) -> Result<Parsed, SyntaxError> {
    let shared: Arc<str> = Arc::from(text);
    let to_syntax_error = |pos: usize, message: String| {
        let (line, col) = location(text, pos);
        SyntaxError {
            name: name.to_string(),
            line,
            col,
            message,
        }
    };

    let items = Lexer::new(text, left, right)
        .run()
        .map_err(|e| to_syntax_error(e.pos, e.message))?;

    let mut parser = Parser {
        name: name.to_string(),
        text: Arc::clone(&shared),
        items,
        cursor: 0,
        next_id: first_id,
        vars: vec!["$".to_string()],
        range_depth: 0,
        trees: Vec::new(),
    };
    parser
        .parse_top()
        .map_err(|e| to_syntax_error(e.pos, e.message))?;

    Ok(Parsed {
        trees: parser.trees,
        next_id: parser.next_id,
    })
}

fn location(text: &str, pos: usize) -> (usize, usize) {
    let upto = &text[..pos.min(text.len())];
    let line = upto.matches('\n').count() + 1;
    let col = match upto.rfind('\n') {
        Some(nl) => upto[nl + 1..].chars().count() + 1,
        None => upto.chars().count() + 1,
    };
    (line, col)
}

struct ParseError {
    pos: Pos,
    message: String,
}

type PResult<T> = Result<T, ParseError>;

enum Terminator {
    End,
    /// `else`, with the `if`/`with` keyword left pending for `else if`/`else with`.
    Else { pos: Pos, chain: Option<Keyword> },
}

enum Step {
    Node(Node),
    Stop(Terminator),
}

struct Parser<'a> {
    name: String,
    text: Arc<str>,
    items: Vec<Item<'a>>,
    cursor: usize,
    next_id: u32,
    vars: Vec<String>,
    range_depth: usize,
    trees: Vec<Tree>,
}

impl<'a> Parser<'a> {
    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn next(&mut self) -> Item<'a> {
        let item = self.items[self.cursor];
        if item.kind != ItemKind::Eof {
            self.cursor += 1;
        }
        item
    }

    fn backup(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn peek(&self) -> Item<'a> {
        self.items[self.cursor]
    }

    fn next_non_space(&mut self) -> Item<'a> {
        loop {
            let item = self.next();
            if item.kind != ItemKind::Space {
                return item;
            }
        }
    }

    /// Skips spaces and returns the next item without consuming it.
    fn peek_non_space(&mut self) -> Item<'a> {
        while self.peek().kind == ItemKind::Space {
            self.cursor += 1;
        }
        self.peek()
    }

    fn error<T>(&self, pos: Pos, message: impl Into<String>) -> PResult<T> {
        Err(ParseError {
            pos,
            message: message.into(),
        })
    }

    fn unexpected<T>(&self, item: Item<'_>, context: &str) -> PResult<T> {
        let found = match item.kind {
            ItemKind::Eof => "EOF".to_string(),
            ItemKind::LeftParen => "'('".to_string(),
            ItemKind::RightParen => "')'".to_string(),
            _ => format!("{:?}", item.text),
        };
        self.error(item.pos, format!("unexpected {} in {}", found, context))
    }

    fn expect(&mut self, kind: ItemKind, context: &str) -> PResult<Item<'a>> {
        let item = self.next_non_space();
        if item.kind != kind {
            return self.unexpected(item, context);
        }
        Ok(item)
    }

    fn parse_top(&mut self) -> PResult<()> {
        let id = self.id();
        let mut nodes = Vec::new();

        loop {
            let item = self.peek();
            if item.kind == ItemKind::Eof {
                break;
            }
            if item.kind == ItemKind::LeftDelim {
                let mark = self.cursor;
                self.next();
                if self.next_non_space().kind == ItemKind::Keyword(Keyword::Define) {
                    self.parse_definition()?;
                    continue;
                }
                self.cursor = mark;
            }
            match self.text_or_action()? {
                Step::Node(node) => nodes.push(node),
                Step::Stop(Terminator::End) => return self.error(item.pos, "unexpected {{end}}"),
                Step::Stop(Terminator::Else { pos, .. }) => {
                    return self.error(pos, "unexpected {{else}}");
                }
            }
        }

        let name = self.name.clone();
        self.add_tree(
            &name,
            ListNode {
                id,
                pos: 0,
                nodes,
            },
            0,
        )?;
        // The fragment's own tree leads.
        if let Some(index) = self.trees.iter().position(|t| t.name == name) {
            let top = self.trees.remove(index);
            self.trees.insert(0, top);
        }
        Ok(())
    }

    fn add_tree(&mut self, name: &str, root: ListNode, pos: Pos) -> PResult<()> {
        let tree = Tree {
            name: name.to_string(),
            root,
            text: Arc::clone(&self.text),
        };
        match self.trees.iter().position(|t| t.name == name) {
            None => self.trees.push(tree),
            Some(index) => {
                if tree.is_empty() {
                    return Ok(());
                }
                if !self.trees[index].is_empty() {
                    return self.error(pos, format!("multiple definition of template {:?}", name));
                }
                self.trees[index] = tree;
            }
        }
        Ok(())
    }

    /// `{{define "name"}} ... {{end}}`, entered after the keyword.
    fn parse_definition(&mut self) -> PResult<()> {
        let token = self.next_non_space();
        let name = self.template_name(token, "define clause")?;
        self.expect(ItemKind::RightDelim, "define clause")?;

        let (list, end) = self.isolated_list()?;
        if let Terminator::Else { pos, .. } = end {
            return self.error(pos, "unexpected {{else}} in define clause");
        }
        self.add_tree(&name, list, token.pos)
    }

    /// A list parsed with a fresh variable scope, as template bodies are.
    fn isolated_list(&mut self) -> PResult<(ListNode, Terminator)> {
        let vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let depth = std::mem::replace(&mut self.range_depth, 0);
        let result = self.item_list();
        self.vars = vars;
        self.range_depth = depth;
        result
    }

    fn item_list(&mut self) -> PResult<(ListNode, Terminator)> {
        let id = self.id();
        let pos = self.peek().pos;
        let mut nodes = Vec::new();

        loop {
            let item = self.peek();
            if item.kind == ItemKind::Eof {
                return self.error(item.pos, "unexpected EOF");
            }
            match self.text_or_action()? {
                Step::Node(node) => nodes.push(node),
                Step::Stop(terminator) => return Ok((ListNode { id, pos, nodes }, terminator)),
            }
        }
    }

    fn text_or_action(&mut self) -> PResult<Step> {
        let item = self.next();
        match item.kind {
            ItemKind::Text => Ok(Step::Node(Node::Text(TextNode {
                id: self.id(),
                pos: item.pos,
                text: item.text.to_string(),
            }))),
            ItemKind::Comment => Ok(Step::Node(Node::Comment(CommentNode {
                id: self.id(),
                pos: item.pos,
                text: item.text.to_string(),
            }))),
            ItemKind::LeftDelim => self.action(),
            _ => self.unexpected(item, "input"),
        }
    }

    fn action(&mut self) -> PResult<Step> {
        let mark = self.cursor;
        let token = self.next_non_space();
        let pos = token.pos;

        let node = match token.kind {
            ItemKind::Keyword(Keyword::Block) => self.block_control(pos)?,
            ItemKind::Keyword(Keyword::Break) => {
                Node::Break(self.loop_control(pos, "break")?)
            }
            ItemKind::Keyword(Keyword::Continue) => {
                Node::Continue(self.loop_control(pos, "continue")?)
            }
            ItemKind::Keyword(Keyword::Else) => return self.else_control(pos),
            ItemKind::Keyword(Keyword::End) => {
                self.expect(ItemKind::RightDelim, "end")?;
                return Ok(Step::Stop(Terminator::End));
            }
            ItemKind::Keyword(Keyword::If) => Node::If(self.parse_control("if", pos)?),
            ItemKind::Keyword(Keyword::Range) => Node::Range(self.parse_control("range", pos)?),
            ItemKind::Keyword(Keyword::With) => Node::With(self.parse_control("with", pos)?),
            ItemKind::Keyword(Keyword::Template) => self.template_control(pos)?,
            ItemKind::Keyword(Keyword::Define) => {
                return self.error(pos, "{{define}} is only allowed at the top level");
            }
            _ => {
                self.cursor = mark;
                let id = self.id();
                let pipe = self.pipeline("command", ItemKind::RightDelim)?;
                Node::Action(ActionNode { id, pos, pipe })
            }
        };
        Ok(Step::Node(node))
    }

    fn loop_control(&mut self, pos: Pos, keyword: &str) -> PResult<LoopControlNode> {
        if self.range_depth == 0 {
            return self.error(pos, format!("{{{{{}}}}} outside {{{{range}}}}", keyword));
        }
        self.expect(ItemKind::RightDelim, keyword)?;
        Ok(LoopControlNode { id: self.id(), pos })
    }

    fn else_control(&mut self, pos: Pos) -> PResult<Step> {
        let peek = self.peek_non_space();
        if let ItemKind::Keyword(keyword @ (Keyword::If | Keyword::With)) = peek.kind {
            return Ok(Step::Stop(Terminator::Else {
                pos,
                chain: Some(keyword),
            }));
        }
        self.expect(ItemKind::RightDelim, "else")?;
        Ok(Step::Stop(Terminator::Else { pos, chain: None }))
    }

    fn parse_control(&mut self, context: &str, pos: Pos) -> PResult<BranchNode> {
        let id = self.id();
        let vars = self.vars.len();
        let pipe = self.pipeline(context, ItemKind::RightDelim)?;

        let is_range = context == "range";
        if is_range {
            self.range_depth += 1;
        }
        let list = self.item_list();
        if is_range {
            self.range_depth -= 1;
        }
        let (list, next) = list?;

        let else_list = match next {
            Terminator::End => None,
            Terminator::Else {
                pos: else_pos,
                chain: Some(keyword),
            } => {
                let nested_context = match (context, keyword) {
                    ("if", Keyword::If) => "if",
                    ("with", Keyword::With) => "with",
                    _ => {
                        return self.error(else_pos, format!("unexpected chained else in {}", context));
                    }
                };
                self.next_non_space();
                // The chained branch consumes the shared {{end}}.
                let nested = self.parse_control(nested_context, else_pos)?;
                let node = if keyword == Keyword::If {
                    Node::If(nested)
                } else {
                    Node::With(nested)
                };
                Some(ListNode {
                    id: self.id(),
                    pos: else_pos,
                    nodes: vec![node],
                })
            }
            Terminator::Else { pos: else_pos, chain: None } => {
                let (else_list, next) = self.item_list()?;
                if !matches!(next, Terminator::End) {
                    return self.error(else_pos, format!("expected end; found {{{{else}}}} in {}", context));
                }
                Some(else_list)
            }
        };

        self.vars.truncate(vars);
        Ok(BranchNode {
            id,
            pos,
            pipe,
            list,
            else_list,
        })
    }

    fn template_name(&self, token: Item<'_>, context: &str) -> PResult<String> {
        match token.kind {
            ItemKind::String | ItemKind::RawString => {
                unquote(token.text).or_else(|message| self.error(token.pos, message))
            }
            _ => self.unexpected(token, context),
        }
    }

    fn template_control(&mut self, pos: Pos) -> PResult<Node> {
        let token = self.next_non_space();
        let name = self.template_name(token, "template clause")?;
        let id = self.id();

        let pipe = if self.peek_non_space().kind == ItemKind::RightDelim {
            self.next();
            None
        } else {
            Some(self.pipeline("template clause", ItemKind::RightDelim)?)
        };
        Ok(Node::Template(TemplateNode {
            id,
            pos,
            name,
            pipe,
        }))
    }

    /// `{{block "name" pipeline}} body {{end}}` defines `name` and invokes it.
    fn block_control(&mut self, pos: Pos) -> PResult<Node> {
        let token = self.next_non_space();
        let name = self.template_name(token, "block clause")?;
        let id = self.id();
        let pipe = self.pipeline("block clause", ItemKind::RightDelim)?;

        let (list, end) = self.isolated_list()?;
        if let Terminator::Else { pos, .. } = end {
            return self.error(pos, "unexpected {{else}} in block clause");
        }
        self.add_tree(&name, list, token.pos)?;

        Ok(Node::Template(TemplateNode {
            id,
            pos,
            name,
            pipe: Some(pipe),
        }))
    }

    fn pipeline(&mut self, context: &str, end: ItemKind) -> PResult<PipeNode> {
        let id = self.id();
        let pos = self.peek_non_space().pos;
        let mut pipe = PipeNode {
            id,
            pos,
            is_assign: false,
            decl: Vec::new(),
            cmds: Vec::new(),
        };

        self.declarations(&mut pipe, context)?;

        loop {
            let token = self.next_non_space();
            if token.kind == end {
                self.check_pipeline(&pipe, context, token.pos)?;
                return Ok(pipe);
            }
            match token.kind {
                ItemKind::Bool
                | ItemKind::Char
                | ItemKind::Dot
                | ItemKind::Field
                | ItemKind::Identifier
                | ItemKind::Number
                | ItemKind::Nil
                | ItemKind::RawString
                | ItemKind::String
                | ItemKind::Variable
                | ItemKind::LeftParen => {
                    self.backup();
                    let cmd = self.command()?;
                    pipe.cmds.push(cmd);
                }
                _ => return self.unexpected(token, context),
            }
        }
    }

    /// `$x :=`, `$x =` and `$i, $e :=` (range only) at the head of a pipeline.
    fn declarations(&mut self, pipe: &mut PipeNode, context: &str) -> PResult<()> {
        let mark = self.cursor;
        let first = self.peek_non_space();
        if first.kind != ItemKind::Variable {
            return Ok(());
        }
        self.next();
        let next = self.peek_non_space();

        match next.kind {
            ItemKind::Assign | ItemKind::Declare => {
                self.next();
                pipe.is_assign = next.kind == ItemKind::Assign;
                pipe.decl.push(self.declare(first));
            }
            ItemKind::Comma => {
                self.next();
                pipe.decl.push(self.declare(first));
                if context != "range" {
                    return self.error(next.pos, format!("too many declarations in {}", context));
                }
                let second = self.next_non_space();
                let op = self.next_non_space();
                if second.kind != ItemKind::Variable
                    || !matches!(op.kind, ItemKind::Assign | ItemKind::Declare)
                {
                    return self.error(second.pos, "range can only initialize variables");
                }
                pipe.is_assign = op.kind == ItemKind::Assign;
                pipe.decl.push(self.declare(second));
            }
            _ => self.cursor = mark,
        }
        Ok(())
    }

    fn declare(&mut self, item: Item<'_>) -> VariableNode {
        self.vars.push(item.text.to_string());
        VariableNode {
            id: self.id(),
            pos: item.pos,
            ident: vec![item.text.to_string()],
        }
    }

    fn check_pipeline(&self, pipe: &PipeNode, context: &str, pos: Pos) -> PResult<()> {
        if pipe.cmds.is_empty() {
            return self.error(pos, format!("missing value for {}", context));
        }
        for (i, cmd) in pipe.cmds.iter().enumerate().skip(1) {
            if let Some(
                Arg::Bool(_) | Arg::Dot(_) | Arg::Nil(_) | Arg::Number(_) | Arg::String(_),
            ) = cmd.args.first()
            {
                return self.error(
                    cmd.pos,
                    format!("non executable command in pipeline stage {}", i + 1),
                );
            }
        }
        Ok(())
    }

    fn command(&mut self) -> PResult<CommandNode> {
        let id = self.id();
        let pos = self.peek_non_space().pos;
        let mut args = Vec::new();

        loop {
            self.peek_non_space();
            if let Some(operand) = self.operand()? {
                args.push(operand);
            }
            let token = self.next();
            match token.kind {
                ItemKind::Space => continue,
                ItemKind::RightDelim | ItemKind::RightParen => self.backup(),
                ItemKind::Pipe => {}
                _ => return self.unexpected(token, "operand"),
            }
            break;
        }

        if args.is_empty() {
            return self.error(pos, "empty command");
        }
        Ok(CommandNode { id, pos, args })
    }

    fn operand(&mut self) -> PResult<Option<Arg>> {
        let Some(term) = self.term()? else {
            return Ok(None);
        };
        if self.peek().kind != ItemKind::Field {
            return Ok(Some(term));
        }

        let mut fields = Vec::new();
        while self.peek().kind == ItemKind::Field {
            let item = self.next();
            fields.push(item.text[1..].to_string());
        }

        let chained = match term {
            Arg::Field(mut field) => {
                field.ident.extend(fields);
                Arg::Field(field)
            }
            Arg::Variable(mut variable) => {
                variable.ident.extend(fields);
                Arg::Variable(variable)
            }
            Arg::Bool(_) | Arg::String(_) | Arg::Number(_) | Arg::Nil(_) | Arg::Dot(_) => {
                return self.error(term.pos(), format!("unexpected . after term {}", term));
            }
            other => {
                let pos = other.pos();
                Arg::Chain(ChainNode {
                    id: self.id(),
                    pos,
                    node: Box::new(other),
                    field: fields,
                })
            }
        };
        Ok(Some(chained))
    }

    fn term(&mut self) -> PResult<Option<Arg>> {
        let token = self.next_non_space();
        let pos = token.pos;

        let arg = match token.kind {
            ItemKind::Identifier => Arg::Identifier(IdentifierNode {
                id: self.id(),
                pos,
                name: token.text.to_string(),
            }),
            ItemKind::Dot => Arg::Dot(LeafNode { id: self.id(), pos }),
            ItemKind::Nil => Arg::Nil(LeafNode { id: self.id(), pos }),
            ItemKind::Variable => {
                if !self.vars.iter().any(|v| v == token.text) {
                    return self.error(pos, format!("undefined variable {:?}", token.text));
                }
                Arg::Variable(VariableNode {
                    id: self.id(),
                    pos,
                    ident: vec![token.text.to_string()],
                })
            }
            ItemKind::Field => Arg::Field(FieldNode {
                id: self.id(),
                pos,
                ident: vec![token.text[1..].to_string()],
            }),
            ItemKind::Bool => Arg::Bool(BoolNode {
                id: self.id(),
                pos,
                value: token.text == "true",
            }),
            ItemKind::Char | ItemKind::Number => {
                let value = parse_number(token)
                    .or_else(|message| self.error(pos, message))?;
                Arg::Number(NumberNode {
                    id: self.id(),
                    pos,
                    text: token.text.to_string(),
                    value,
                })
            }
            ItemKind::LeftParen => {
                Arg::Pipe(self.pipeline("parenthesized pipeline", ItemKind::RightParen)?)
            }
            ItemKind::String | ItemKind::RawString => {
                let text = unquote(token.text).or_else(|message| self.error(pos, message))?;
                Arg::String(StringNode {
                    id: self.id(),
                    pos,
                    quoted: token.text.to_string(),
                    text,
                })
            }
            ItemKind::Eof => return Ok(None),
            _ => {
                self.backup();
                return Ok(None);
            }
        };
        Ok(Some(arg))
    }
}

/// Classifies and evaluates a numeric or character literal.
pub(crate) fn parse_number(item: Item<'_>) -> Result<Number, String> {
    let text = item.text;
    let bad = || format!("illegal number syntax: {:?}", text);

    if item.kind == ItemKind::Char {
        let decoded = unquote(text)?;
        let mut chars = decoded.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Number::Int(c as i64)),
            _ => Err(format!("malformed character constant: {}", text)),
        };
    }

    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(imaginary) = cleaned.strip_suffix('i') {
        let im = imaginary.parse::<f64>().map_err(|_| bad())?;
        return Ok(Number::Complex(0.0, im));
    }

    let (negative, body) = match cleaned.as_bytes().first() {
        Some(b'-') => (true, &cleaned[1..]),
        Some(b'+') => (false, &cleaned[1..]),
        _ => (false, cleaned.as_str()),
    };
    let lower = body.to_ascii_lowercase();
    let is_hex = lower.starts_with("0x");
    let is_float = lower.contains('.') || (!is_hex && lower.contains('e')) || lower.contains('p');

    if is_float {
        if is_hex {
            return Err(format!("hexadecimal float literals are not supported: {:?}", text));
        }
        let value = cleaned.parse::<f64>().map_err(|_| bad())?;
        return Ok(Number::Float(value));
    }

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };
    let magnitude = u64::from_str_radix(digits, radix).map_err(|_| bad())?;

    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(format!("integer overflow: {:?}", text));
        }
        Ok(Number::Int((magnitude as i64).wrapping_neg()))
    } else if magnitude <= i64::MAX as u64 {
        Ok(Number::Int(magnitude as i64))
    } else {
        Ok(Number::Uint(magnitude))
    }
}

/// Decodes a quoted (`"..."`, `'.'`) or raw (`` `...` ``) literal.
pub(crate) fn unquote(quoted: &str) -> Result<String, String> {
    let bad = || format!("invalid quoted string: {}", quoted);
    if quoted.len() < 2 {
        return Err(bad());
    }
    let (first, body) = (quoted.as_bytes()[0], &quoted[1..quoted.len() - 1]);
    if first == b'`' {
        return Ok(body.to_string());
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = chars.next().ok_or_else(bad)?;
        let decoded = match escaped {
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{0B}',
            '\\' | '\'' | '"' => escaped,
            'x' | 'u' | 'U' => {
                let width = match escaped {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.by_ref().take(width).collect();
                if hex.len() != width {
                    return Err(bad());
                }
                let code = u32::from_str_radix(&hex, 16).map_err(|_| bad())?;
                char::from_u32(code).ok_or_else(bad)?
            }
            '0'..='7' => {
                let rest: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&format!("{}{}", escaped, rest), 8)
                    .map_err(|_| bad())?;
                char::from_u32(code).ok_or_else(bad)?
            }
            _ => return Err(bad()),
        };
        out.push(decoded);
    }
    Ok(out)
}
