//! Tool dispatch: authorize, pick the execution mode, invoke, audit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use agentforge_core::obs;
use agentforge_core::{Access, Principal, Role, ToolEntry};

use crate::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::config::{DispatchConfig, ExecutionMode};
use crate::context::CallContext;
use crate::decision::Decision;
use crate::error::{DispatchError, DispatchResult};
use crate::model::AuthorizationModel;

/// Performs a tool's real effect.
///
/// For an `agent:` tool, `ctx` is the callee's child context; nested
/// dispatches made while serving the call should use it so they inherit
/// the principal, deadline and cancellation.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        ctx: &CallContext,
        tool: &ToolEntry,
        args: Value,
    ) -> Result<Value, String>;
}

/// One requested tool use.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub tool: String,
    pub access: Access,
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, access: Access, args: Value) -> Self {
        Self {
            tool: tool.into(),
            access,
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub mode: ExecutionMode,
    pub output: Value,
}

pub struct Dispatcher {
    model: Arc<AuthorizationModel>,
    config: DispatchConfig,
    invoker: Arc<dyn ToolInvoker>,
    audit: Arc<dyn AuditSink>,
}

impl Dispatcher {
    pub fn new(
        model: Arc<AuthorizationModel>,
        config: DispatchConfig,
        invoker: Arc<dyn ToolInvoker>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            model,
            config,
            invoker,
            audit,
        }
    }

    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    /// Open a call chain for `principal` invoking `agent`, due within `timeout`.
    ///
    /// Requires `execute` on the agent.
    pub async fn start(
        &self,
        principal: Principal,
        agent: &str,
        timeout: Duration,
    ) -> DispatchResult<CallContext> {
        let decision = self.model.authorize_agent(&principal, agent, Role::Execute);
        let chain = vec![agent.to_string()];
        if let Decision::Deny { check, reason } = decision {
            self.audit
                .record(AuditRecord::new(
                    principal.to_string(),
                    chain,
                    AuditOutcome::Denied {
                        check,
                        reason: reason.clone(),
                    },
                ))
                .await;
            return Err(DispatchError::Denied { check, reason });
        }
        Ok(CallContext::root(
            principal,
            agent,
            timeout,
            self.config.max_call_depth,
        ))
    }

    /// Dispatch `call` on behalf of the agent acting in `ctx`.
    ///
    /// Every outcome is audited. Authorized write tools are simulated unless
    /// a live-write override covers them.
    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        call: ToolCall,
    ) -> DispatchResult<DispatchOutcome> {
        let record = AuditRecord::new(
            ctx.principal().to_string(),
            ctx.chain().to_vec(),
            AuditOutcome::Executed,
        )
        .with_tool(&call.tool, call.access)
        .with_args(call.args.clone());

        let entry = match self.authorize(ctx, &call) {
            Ok(entry) => entry,
            Err(e) => {
                let outcome = match &e {
                    DispatchError::Denied { check, reason } => AuditOutcome::Denied {
                        check: *check,
                        reason: reason.clone(),
                    },
                    other => AuditOutcome::Failed {
                        error: other.to_string(),
                    },
                };
                self.audit.record(AuditRecord { outcome, ..record }).await;
                return Err(e);
            }
        };

        let mode = self.config.mode_for(&call.tool, entry.access());
        if mode == ExecutionMode::Simulated {
            obs::emit_dispatch_simulated(ctx.agent(), &call.tool, &ctx.principal().to_string());
            self.audit
                .record(AuditRecord {
                    outcome: AuditOutcome::Simulated,
                    ..record
                })
                .await;
            return Ok(DispatchOutcome {
                mode,
                output: json!({
                    "simulated": true,
                    "tool": call.tool,
                    "recorded_args": call.args,
                }),
            });
        }

        let result = match &entry {
            ToolEntry::Agent { agent, .. } => match ctx.child(agent) {
                Ok(child) => {
                    let invocation = self.invoker.invoke(&child, &entry, call.args);
                    child.run(invocation).await
                }
                Err(e) => Err(e),
            },
            ToolEntry::Remote { .. } | ToolEntry::Local { .. } => {
                ctx.run(self.invoker.invoke(ctx, &entry, call.args)).await
            }
        };

        let (outcome, result) = match result {
            Ok(Ok(output)) => (AuditOutcome::Executed, Ok(DispatchOutcome { mode, output })),
            Ok(Err(reason)) => {
                let e = DispatchError::Invocation {
                    tool: call.tool.clone(),
                    reason,
                };
                (AuditOutcome::Failed { error: e.to_string() }, Err(e))
            }
            Err(e) => (AuditOutcome::Failed { error: e.to_string() }, Err(e)),
        };
        debug!(tool = %call.tool, outcome = outcome.name(), "dispatch settled");
        self.audit.record(AuditRecord { outcome, ..record }).await;
        result
    }

    /// Authorization plus chain checks; returns the declared entry to invoke.
    fn authorize(&self, ctx: &CallContext, call: &ToolCall) -> DispatchResult<ToolEntry> {
        if ctx.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        if ctx.is_expired() {
            return Err(DispatchError::DeadlineExceeded);
        }
        match self
            .model
            .authorize_tool(ctx.principal(), ctx.agent(), &call.tool, call.access)
        {
            Decision::Deny { check, reason } => Err(DispatchError::Denied { check, reason }),
            Decision::Allow => self
                .model
                .manifest()
                .agent(ctx.agent())
                .and_then(|agent| {
                    agent
                        .tools
                        .iter()
                        .filter(|t| t.reference() == call.tool)
                        .max_by_key(|t| t.access())
                })
                .cloned()
                .ok_or_else(|| DispatchError::Invocation {
                    tool: call.tool.clone(),
                    reason: "authorized tool missing from manifest".to_string(),
                }),
        }
    }
}
