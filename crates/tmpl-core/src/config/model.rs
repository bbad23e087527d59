use serde::Deserialize;

use super::consts::delimiters;
use crate::template::EscapeMode;

/// `[delimiters]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            left: delimiters::LEFT.to_string(),
            right: delimiters::RIGHT.to_string(),
        }
    }
}

impl Delimiters {
    /// Left delimiter; empty falls back to `{{`.
    pub fn left(&self) -> &str {
        if self.left.is_empty() {
            delimiters::LEFT
        } else {
            &self.left
        }
    }

    /// Right delimiter; empty falls back to `}}`.
    pub fn right(&self) -> &str {
        if self.right.is_empty() {
            delimiters::RIGHT
        } else {
            &self.right
        }
    }
}

/// `[analysis]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Fail compilation on warnings as well as errors.
    pub deny_warnings: bool,
}

/// `[render]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub escape: EscapeMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_delimiters_fall_back() {
        let delims = Delimiters {
            left: String::new(),
            right: "%>".to_string(),
        };
        assert_eq!(delims.left(), "{{");
        assert_eq!(delims.right(), "%>");
    }

    #[test]
    fn test_escape_mode_names() {
        let render: RenderOptions = toml::from_str(r#"escape = "none""#).unwrap();
        assert_eq!(render.escape, EscapeMode::None);
        let render: RenderOptions = toml::from_str("").unwrap();
        assert_eq!(render.escape, EscapeMode::Html);
    }
}
