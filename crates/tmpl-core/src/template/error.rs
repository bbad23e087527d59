//! Template error types

use std::fmt;

/// Malformed fragment source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Name of the template being parsed
    pub name: String,
    /// 1-based line of the offending token
    pub line: usize,
    /// 1-based column of the offending token
    pub col: usize,
    /// Error message
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "template: {}:{}:{}: {}",
            self.name, self.line, self.col, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Template execution errors
#[derive(Debug)]
pub enum RenderError {
    /// Failure while evaluating a node
    Exec {
        /// Tree being executed
        name: String,
        /// Line of the failing node
        line: usize,
        /// Column of the failing node
        col: usize,
        /// Error message
        message: String,
    },

    /// Render target that is not in the program
    UndefinedTemplate {
        /// The requested name
        name: String,
    },

    /// Writing the output failed
    Io(std::io::Error),

    /// The receiving end of a render channel was dropped
    ChannelClosed,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Exec {
                name,
                line,
                col,
                message,
            } => {
                write!(f, "template: {}:{}:{}: {}", name, line, col, message)
            }
            RenderError::UndefinedTemplate { name } => {
                write!(f, "template: no such template \"{}\"", name)
            }
            RenderError::Io(err) => write!(f, "template: write failed: {}", err),
            RenderError::ChannelClosed => {
                write!(f, "template: render channel receiver was dropped")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}
