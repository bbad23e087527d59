//! Compiler options
//!
//! Loadable from TOML:
//!
//! ```toml
//! [delimiters]
//! left = "{{"
//! right = "}}"
//!
//! [analysis]
//! deny_warnings = false
//!
//! [render]
//! escape = "html"
//! ```
//!
//! Custom functions are code, not data, and are only set programmatically.

pub mod consts;
mod model;

use std::path::Path;

use serde::Deserialize;

pub use model::{AnalysisOptions, Delimiters, RenderOptions};

use crate::error::ConfigError;
use crate::template::{EscapeMode, FuncMap, Function};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    pub delimiters: Delimiters,
    pub analysis: AnalysisOptions,
    pub render: RenderOptions,
    #[serde(skip)]
    pub funcs: FuncMap,
}

impl Options {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_delimiters(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.delimiters = Delimiters {
            left: left.into(),
            right: right.into(),
        };
        self
    }

    /// Adds a function available to every render of the compiled program.
    pub fn with_func(mut self, name: impl Into<String>, func: Function) -> Self {
        self.funcs.insert(name.into(), func);
        self
    }

    pub fn with_funcs(mut self, funcs: FuncMap) -> Self {
        self.funcs.extend(funcs);
        self
    }

    pub fn with_escape(mut self, escape: EscapeMode) -> Self {
        self.render.escape = escape;
        self
    }

    pub fn deny_warnings(mut self, deny: bool) -> Self {
        self.analysis.deny_warnings = deny;
        self
    }
}
