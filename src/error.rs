//! Error types for the template front end.
//!
//! Inference itself never fails; every error here comes from loading or
//! parsing a template before inference starts.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to resolve a logical template name to source text.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Template '{name}' not found")]
    NotFound { name: String },

    #[error("Failed to read template '{name}' from {}", path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Syntax error reported by [`crate::parser::Parser`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Expected {expected}, got {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Expected {expected}, got end of template")]
    UnexpectedEof { expected: String },

    #[error("Unknown tag '{0}'")]
    UnknownTag(String),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Unterminated comment")]
    UnterminatedComment,
}

/// Error returned by [`crate::loader::Environment`] when producing a syntax tree.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Syntax error in template '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },
}
