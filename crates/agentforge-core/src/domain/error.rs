//! Domain-level error taxonomy for agentforge.
//!
//! Validation findings are *not* errors in this sense: they travel as
//! [`ValidationIssue`](super::issue::ValidationIssue) values so that one run
//! can surface every problem. `CoreError` covers the failures that stop an
//! operation outright (unreadable project root, non-canonicalisable values).

/// Errors produced by principal / access string parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed principal '{value}': expected user:<id>, group:<name> or service-account:<name>")]
    MalformedPrincipal { value: String },

    #[error("unknown access level '{value}': expected read or write")]
    UnknownAccess { value: String },

    #[error("unknown role '{value}': expected execute or read")]
    UnknownRole { value: String },
}

/// agentforge core errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("project root is not a directory: {0}")]
    ProjectRoot(std::path::PathBuf),

    #[error("value cannot be canonicalised: {0}")]
    Canonical(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
