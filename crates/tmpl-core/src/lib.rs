//! Statically checked text templates bound to Rust data models.
//!
//! A root type derives [`Model`] and names its template source. Compilation walks
//! the model's shape and live values, parses every discovered fragment into one
//! forest, type-checks the actions against the model and publishes a program that
//! [`Template`] renders.

// Lets `#[derive(Model)]` expand to `::tmpl_core::...` inside this crate too.
extern crate self as tmpl_core;

pub mod analyze;
pub mod compile;
pub mod config;
pub mod discover;
pub mod error;
pub mod forest;
pub mod model;
pub mod program;
pub mod render;
pub mod schema;
pub mod template;
pub mod watch;

pub use analyze::{AnalysisHelper, AnalysisReport, Analyzer, StaticTyping, analyze};
pub use compile::Compiler;
pub use config::Options;
pub use error::{AnalysisErrors, CompileError, ConfigError, Result};
pub use model::{
    FieldRef, Kind, MemberInfo, Model, Object, Source, TemplateProvider, TypeInfo, Value,
};
pub use program::CompiledProgram;
pub use render::{RenderOption, Template};
pub use template::{EscapeMode, FuncMap, Function, RenderError};
pub use tmpl_macros::Model;
pub use watch::{Listener, Signal, Watch};
