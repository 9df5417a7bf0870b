//! Crate error type
//!
//! Module errors compose into [`CausticsError`]. Numeric errors raised during
//! a forward call pass through unwrapped.

use crate::forward::ForwardError;
use crate::io::IoError;
use crate::models::NumericError;
use crate::registry::{kind_label, KindCategory, RegistryError};
use crate::schema::ValidationError;
use crate::sims::{SignatureMismatch, StateError};
use std::fmt;
use thiserror::Error;

/// Malformed YAML
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// File path, or `<string>` for in-memory text
    pub origin: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl ParseError {
    pub fn from_yaml(origin: impl Into<String>, err: &serde_yaml::Error) -> Self {
        let location = err.location();
        Self {
            origin: origin.into(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(
                f,
                "Failed to parse {} at line {line}, column {column}: {}",
                self.origin, self.message
            ),
            _ => write!(f, "Failed to parse {}: {}", self.origin, self.message),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Error)]
pub enum CausticsError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Unknown {} '{kind}' at {path}; registered: [{}]", kind_label(.category), .known.join(", "))]
    UnknownKind {
        kind: String,
        category: Option<KindCategory>,
        path: String,
        known: Vec<String>,
    },

    #[error("{category} kind '{kind}' is already registered")]
    RegistryConflict { kind: String, category: KindCategory },

    #[error("Failed to build '{name}' at {path}: {source}")]
    Build {
        name: String,
        path: String,
        #[source]
        source: Box<CausticsError>,
    },

    #[error(transparent)]
    SignatureMismatch(#[from] SignatureMismatch),

    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error("Forward routine failed: {0}")]
    Forward(ForwardError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Io(#[from] IoError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CausticsError {
    /// Attach the configuration path a registry lookup was made for.
    pub fn from_registry(err: RegistryError, path: impl fmt::Display) -> Self {
        match err {
            RegistryError::UnknownKind {
                kind,
                category,
                known,
            } => CausticsError::UnknownKind {
                kind,
                category,
                path: path.to_string(),
                known,
            },
            RegistryError::Conflict { kind, category } => {
                CausticsError::RegistryConflict { kind, category }
            }
        }
    }

    /// Validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            CausticsError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<RegistryError> for CausticsError {
    fn from(err: RegistryError) -> Self {
        CausticsError::from_registry(err, "<registry>")
    }
}

impl From<ForwardError> for CausticsError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Numeric(e) => CausticsError::Numeric(e),
            other => CausticsError::Forward(other),
        }
    }
}

impl From<Vec<ValidationError>> for CausticsError {
    fn from(errors: Vec<ValidationError>) -> Self {
        CausticsError::Validation(errors)
    }
}
