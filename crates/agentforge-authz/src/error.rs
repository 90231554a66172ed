//! Error types for dispatch.

use crate::decision::Check;

/// Errors produced when dispatching a tool call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("denied ({check} check): {reason}")]
    Denied { check: Check, reason: String },

    #[error("call depth {depth} exceeds the limit of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("agent '{agent}' is already on the call chain {chain}")]
    Recursion { agent: String, chain: String },

    #[error("call chain cancelled")]
    Cancelled,

    #[error("call chain deadline exceeded")]
    DeadlineExceeded,

    #[error("tool '{tool}' failed: {reason}")]
    Invocation { tool: String, reason: String },

    #[error("invalid dispatch configuration: {0}")]
    Config(String),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
