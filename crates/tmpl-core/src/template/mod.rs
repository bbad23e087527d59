//! Template engine
//!
//! A `text/template`-style action language: lexing, parsing into named trees, and
//! execution against [`Value`](crate::model::Value)s.
//!
//! ## Syntax
//!
//! - Actions: `{{ .Field }}`, `{{ $x := .A }}`, `{{ .A | printf "%d" }}`
//! - Control: `if`/`else if`/`else`, `range`, `with`, `break`, `continue`
//! - Composition: `define`, `template`, `block`
//! - Whitespace trimming with `{{-` and `-}}`; comments with `{{/* ... */}}`

mod error;
mod exec;
mod funcs;
mod lex;
mod node;
mod parse;

pub use error::{RenderError, SyntaxError};
pub use exec::{EscapeMode, Executor, MAX_TEMPLATE_DEPTH};
pub use funcs::{BUILTINS, FuncMap, Function, html_escape, is_builtin};
pub use node::*;
pub use parse::{Parsed, parse};

#[cfg(test)]
mod tests;
