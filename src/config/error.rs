//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
///
/// Any of these aborts the run before a single page is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("{message}, line {line}")]
    Syntax { line: usize, message: String },

    #[error("invalid glob pattern `{0}`")]
    Glob(String, #[source] glob::PatternError),

    #[error("pattern `{0}` is declared by more than one rule")]
    DuplicatePattern(String),

    #[error("rule `{pattern}` uses unknown processor `{name}`")]
    UnknownProcessor { pattern: String, name: String },

    #[error("template `{0}` does not exist")]
    Template(PathBuf),
}

impl ConfigError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("site.conf"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("site.conf"));

        let syntax = ConfigError::syntax(7, "indentation without an open rule");
        assert_eq!(syntax.to_string(), "indentation without an open rule, line 7");

        let unknown = ConfigError::UnknownProcessor {
            pattern: "*.md".into(),
            name: "markdwn".into(),
        };
        assert!(unknown.to_string().contains("markdwn"));
    }
}
