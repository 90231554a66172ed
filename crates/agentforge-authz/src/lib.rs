//! agentforge authorization
//!
//! Decides whether a principal may use a tool through an agent, invoke an
//! agent, or trigger a loop, using nothing but a loaded manifest and a
//! group directory. The dispatcher layers execution on top: write tools
//! are simulated unless overridden, every call is audited, and nested
//! agent calls share one deadline and cancellation tree.
//!
//! # Modules
//!
//! - [`decision`]: `Decision` and the `Check` that failed
//! - [`groups`]: `GroupDirectory`, `StaticGroupDirectory`
//! - [`model`]: `AuthorizationModel`
//! - [`config`]: `DispatchConfig`, `ExecutionMode`
//! - [`context`]: `CallContext`
//! - [`audit`]: `AuditSink`, `AuditRecord`
//! - [`dispatch`]: `Dispatcher`, `ToolInvoker`

pub mod audit;
pub mod config;
pub mod context;
pub mod decision;
pub mod dispatch;
pub mod error;
pub mod groups;
pub mod model;

pub use audit::{AuditOutcome, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::{DispatchConfig, ExecutionMode, DEFAULT_MAX_CALL_DEPTH};
pub use context::CallContext;
pub use decision::{Check, Decision};
pub use dispatch::{DispatchOutcome, Dispatcher, ToolCall, ToolInvoker};
pub use error::{DispatchError, DispatchResult};
pub use groups::{GroupDirectory, NoGroups, StaticGroupDirectory};
pub use model::AuthorizationModel;
