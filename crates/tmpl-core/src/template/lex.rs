//! Lexer for template source
//!
//! Forward-only state machine: text runs are copied out until the left delimiter,
//! actions are split into items until the right delimiter. Trim markers (`{{- `,
//! ` -}}`) strip the whitespace of the adjacent text.

/// Item classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    Text,
    Comment,
    LeftDelim,
    RightDelim,
    Space,
    Identifier,
    /// `.Name`, one segment per item
    Field,
    /// `$` or `$name`
    Variable,
    Dot,
    String,
    RawString,
    Char,
    Number,
    Bool,
    Nil,
    Pipe,
    LeftParen,
    RightParen,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
    Keyword(Keyword),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    Block,
    Break,
    Continue,
    Define,
    Else,
    End,
    If,
    Range,
    Template,
    With,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        Some(match word {
            "block" => Keyword::Block,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "define" => Keyword::Define,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "if" => Keyword::If,
            "range" => Keyword::Range,
            "template" => Keyword::Template,
            "with" => Keyword::With,
            _ => return None,
        })
    }
}

/// A single lexed item with its byte position
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Item<'a> {
    pub kind: ItemKind,
    pub pos: usize,
    pub text: &'a str,
}

/// Lexing failure at a byte position
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LexError {
    pub pos: usize,
    pub message: String,
}

/// Lexer state (explicit for testability)
///
/// ```text
/// Text ──left delim──> LeftDelim ──/*──> (comment) ──> Text
///                          │
///                          └────────> InsideAction ──right delim──> Text
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexState {
    Text,
    LeftDelim,
    InsideAction { paren_depth: usize },
    Done,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    left: &'a str,
    right: &'a str,
    pos: usize,
    state: LexState,
    items: Vec<Item<'a>>,
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// `- ` right after a left delimiter.
fn has_left_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('-') && chars.next().is_some_and(is_space)
}

/// ` -` right before a right delimiter.
fn has_right_trim_marker(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_space) && chars.next() == Some('-')
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, left: &'a str, right: &'a str) -> Self {
        Self {
            input,
            left,
            right,
            pos: 0,
            state: LexState::Text,
            items: Vec::new(),
        }
    }

    /// Lexes the whole input. The last item is always `Eof`.
    pub fn run(mut self) -> Result<Vec<Item<'a>>, LexError> {
        loop {
            match self.state {
                LexState::Text => self.lex_text(),
                LexState::LeftDelim => self.lex_left_delim()?,
                LexState::InsideAction { paren_depth } => self.lex_inside_action(paren_depth)?,
                LexState::Done => break,
            }
        }
        self.items.push(Item {
            kind: ItemKind::Eof,
            pos: self.input.len(),
            text: "",
        });
        Ok(self.items)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn emit(&mut self, kind: ItemKind, start: usize) {
        self.items.push(Item {
            kind,
            pos: start,
            text: &self.input[start..self.pos],
        });
    }

    fn error<T>(&self, pos: usize, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError {
            pos,
            message: message.into(),
        })
    }

    fn skip_spaces(&mut self) {
        let skipped = self.rest().len() - self.rest().trim_start_matches(is_space).len();
        self.pos += skipped;
    }

    fn accept_run(&mut self, valid: impl Fn(char) -> bool) -> usize {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !valid(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.pos - start
    }

    fn accept(&mut self, valid: &str) -> bool {
        match self.peek() {
            Some(c) if valid.contains(c) => {
                self.pos += c.len_utf8();
                true
            }
            _ => false,
        }
    }

    fn lex_text(&mut self) {
        let start = self.pos;
        match self.rest().find(self.left) {
            Some(offset) => {
                let delim = start + offset;
                let after = &self.input[delim + self.left.len()..];
                let end = if has_left_trim_marker(after) {
                    start + self.input[start..delim].trim_end_matches(is_space).len()
                } else {
                    delim
                };
                if end > start {
                    self.items.push(Item {
                        kind: ItemKind::Text,
                        pos: start,
                        text: &self.input[start..end],
                    });
                }
                self.pos = delim;
                self.state = LexState::LeftDelim;
            }
            None => {
                self.pos = self.input.len();
                if self.pos > start {
                    self.emit(ItemKind::Text, start);
                }
                self.state = LexState::Done;
            }
        }
    }

    /// Position just past the right delimiter, and whether it was trim-marked, if
    /// the input at the cursor closes the action.
    fn at_right_delim(&self) -> Option<(usize, bool)> {
        let rest = self.rest();
        if has_right_trim_marker(rest) && rest[2..].starts_with(self.right) {
            return Some((2, true));
        }
        if rest.starts_with(self.right) {
            return Some((0, false));
        }
        None
    }

    fn lex_left_delim(&mut self) -> Result<(), LexError> {
        let delim_start = self.pos;
        self.pos += self.left.len();
        if has_left_trim_marker(self.rest()) {
            self.pos += 2;
        }

        if self.rest().starts_with("/*") {
            return self.lex_comment(delim_start);
        }

        self.items.push(Item {
            kind: ItemKind::LeftDelim,
            pos: delim_start,
            text: &self.input[delim_start..delim_start + self.left.len()],
        });
        self.state = LexState::InsideAction { paren_depth: 0 };
        Ok(())
    }

    fn lex_comment(&mut self, delim_start: usize) -> Result<(), LexError> {
        let start = self.pos;
        let Some(close) = self.rest()[2..].find("*/") else {
            return self.error(delim_start, "unclosed comment");
        };
        self.pos += 2 + close + 2;
        let text = &self.input[start..self.pos];

        let Some((marker, trim)) = self.at_right_delim() else {
            return self.error(delim_start, "comment ends before closing delimiter");
        };
        self.items.push(Item {
            kind: ItemKind::Comment,
            pos: delim_start,
            text,
        });
        self.pos += marker + self.right.len();
        if trim {
            self.skip_spaces();
        }
        self.state = LexState::Text;
        Ok(())
    }

    fn lex_inside_action(&mut self, paren_depth: usize) -> Result<(), LexError> {
        if let Some((marker, trim)) = self.at_right_delim() {
            if paren_depth > 0 {
                return self.error(self.pos, "unclosed left paren");
            }
            self.pos += marker;
            let start = self.pos;
            self.pos += self.right.len();
            self.emit(ItemKind::RightDelim, start);
            if trim {
                self.skip_spaces();
            }
            self.state = LexState::Text;
            return Ok(());
        }

        let start = self.pos;
        let Some(c) = self.peek() else {
            return self.error(start, "unclosed action");
        };

        match c {
            c if is_space(c) => self.lex_space(),
            '=' => {
                self.pos += 1;
                self.emit(ItemKind::Assign, start);
            }
            ':' => {
                self.pos += 1;
                if !self.accept("=") {
                    return self.error(start, "expected :=");
                }
                self.emit(ItemKind::Declare, start);
            }
            '|' => {
                self.pos += 1;
                self.emit(ItemKind::Pipe, start);
            }
            ',' => {
                self.pos += 1;
                self.emit(ItemKind::Comma, start);
            }
            '"' => self.lex_quote(start, '"', ItemKind::String, "unterminated quoted string")?,
            '\'' => self.lex_quote(start, '\'', ItemKind::Char, "unterminated character constant")?,
            '`' => {
                self.pos += 1;
                match self.rest().find('`') {
                    Some(end) => self.pos += end + 1,
                    None => return self.error(start, "unterminated raw quoted string"),
                }
                self.emit(ItemKind::RawString, start);
            }
            '$' => {
                self.pos += 1;
                self.accept_run(is_alphanumeric);
                self.emit(ItemKind::Variable, start);
                self.check_terminator(start)?;
            }
            '.' => {
                let next = self.rest()[1..].chars().next();
                match next {
                    Some(d) if d.is_ascii_digit() => self.lex_number(start)?,
                    Some(a) if is_alphanumeric(a) => {
                        self.pos += 1;
                        self.accept_run(is_alphanumeric);
                        self.emit(ItemKind::Field, start);
                        self.check_terminator(start)?;
                    }
                    _ => {
                        self.pos += 1;
                        self.emit(ItemKind::Dot, start);
                    }
                }
            }
            '+' | '-' | '0'..='9' => self.lex_number(start)?,
            '(' => {
                self.pos += 1;
                self.emit(ItemKind::LeftParen, start);
                self.state = LexState::InsideAction {
                    paren_depth: paren_depth + 1,
                };
            }
            ')' => {
                if paren_depth == 0 {
                    return self.error(start, "unexpected right paren");
                }
                self.pos += 1;
                self.emit(ItemKind::RightParen, start);
                self.state = LexState::InsideAction {
                    paren_depth: paren_depth - 1,
                };
            }
            c if is_alphanumeric(c) => {
                self.accept_run(is_alphanumeric);
                let word = &self.input[start..self.pos];
                let kind = match word {
                    "true" | "false" => ItemKind::Bool,
                    "nil" => ItemKind::Nil,
                    _ => Keyword::lookup(word)
                        .map(ItemKind::Keyword)
                        .unwrap_or(ItemKind::Identifier),
                };
                self.emit(kind, start);
                self.check_terminator(start)?;
            }
            other => {
                return self.error(start, format!("unrecognized character in action: {:?}", other));
            }
        }
        Ok(())
    }

    /// A space run, leaving the space of a trim-marked right delimiter in place.
    fn lex_space(&mut self) {
        let start = self.pos;
        let mut last = start;
        while let Some(c) = self.peek() {
            if !is_space(c) {
                break;
            }
            last = self.pos;
            self.pos += c.len_utf8();
        }
        let tail = &self.input[last..];
        if has_right_trim_marker(tail) && tail[2..].starts_with(self.right) {
            self.pos = last;
        }
        if self.pos > start {
            self.emit(ItemKind::Space, start);
        }
    }

    fn lex_quote(
        &mut self,
        start: usize,
        quote: char,
        kind: ItemKind,
        unterminated: &str,
    ) -> Result<(), LexError> {
        self.pos += 1;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) if c != '\n' => self.pos += c.len_utf8(),
                        _ => return self.error(start, unterminated),
                    }
                }
                Some('\n') | None => return self.error(start, unterminated),
                Some(c) => {
                    self.pos += c.len_utf8();
                    if c == quote {
                        break;
                    }
                }
            }
        }
        self.emit(kind, start);
        Ok(())
    }

    fn lex_number(&mut self, start: usize) -> Result<(), LexError> {
        self.accept("+-");
        let mut digits: &str = "0123456789_";
        let mut hex = false;
        if self.accept("0") {
            if self.accept("xX") {
                digits = "0123456789abcdefABCDEF_";
                hex = true;
            } else if self.accept("oO") {
                digits = "01234567_";
            } else if self.accept("bB") {
                digits = "01_";
            }
        }
        self.accept_run(|c| digits.contains(c));
        if self.accept(".") {
            self.accept_run(|c| digits.contains(c));
        }
        if digits.len() == 11 && self.accept("eE") {
            self.accept("+-");
            self.accept_run(|c| c.is_ascii_digit() || c == '_');
        }
        if hex && self.accept("pP") {
            self.accept("+-");
            self.accept_run(|c| c.is_ascii_digit() || c == '_');
        }
        self.accept("i");

        let has_digit = self.input[start..self.pos].contains(|c: char| c.is_ascii_digit());
        if !has_digit || self.peek().is_some_and(is_alphanumeric) {
            self.accept_run(is_alphanumeric);
            return self.error(
                start,
                format!("bad number syntax: {:?}", &self.input[start..self.pos]),
            );
        }
        self.emit(ItemKind::Number, start);
        Ok(())
    }

    /// Words must be followed by a space, punctuation or the right delimiter.
    fn check_terminator(&self, start: usize) -> Result<(), LexError> {
        let rest = self.rest();
        let ok = match rest.chars().next() {
            None => true,
            Some(c) if is_space(c) => true,
            Some('.' | ',' | '|' | ':' | ')' | '(' | '=') => true,
            Some(_) => rest.starts_with(self.right),
        };
        if ok {
            Ok(())
        } else {
            let bad = rest.chars().next().unwrap_or_default();
            self.error(start, format!("bad character {:?}", bad))
        }
    }
}

#[cfg(test)]
pub(crate) fn kinds(input: &str) -> Vec<ItemKind> {
    Lexer::new(input, "{{", "}}")
        .run()
        .map(|items| items.iter().map(|i| i.kind).collect())
        .unwrap_or_default()
}
