use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::template::SyntaxError;

/// Everything that can stop a compilation pass.
///
/// `Schema`, `MissingSource`, `Source`, `Syntax` and `Duplicate` abort the pass as
/// soon as they occur. `Analysis` is only returned after the full traversal, with
/// every accumulated diagnostic.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("SCHEMA_ERROR: cannot introspect type '{type_name}': {reason}")]
    Schema { type_name: String, reason: String },

    #[error("MISSING_SOURCE: type '{type_name}' provides neither template text nor a template file")]
    MissingSource { type_name: String },

    #[error("SOURCE_READ_FAILED: failed to read template file '{}': {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("DUPLICATE_TEMPLATE: template '{name}' is defined more than once")]
    Duplicate { name: String },

    #[error("failed to compile template: {0}")]
    Analysis(AnalysisErrors),

    #[error("CONFIG_INVALID: {0}")]
    Config(String),
}

impl CompileError {
    /// Diagnostics of a failed analysis pass, empty for every other variant.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            CompileError::Analysis(errors) => errors.messages(),
            _ => &[],
        }
    }
}

/// Joined analysis errors, one positioned message per offending node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisErrors(Vec<String>);

impl AnalysisErrors {
    pub fn new(messages: Vec<String>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AnalysisErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("\n"))
    }
}

/// Errors raised while loading [`Options`](crate::config::Options).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG_READ_ERROR: failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG_PARSE_ERROR: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<ConfigError> for CompileError {
    fn from(err: ConfigError) -> Self {
        CompileError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
