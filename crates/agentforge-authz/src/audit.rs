//! Audit trail for dispatched calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use agentforge_core::Access;

use crate::decision::{Check, Decision};

/// How a call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    Denied { check: Check, reason: String },
    /// Authorized, with no call made.
    Allowed,
    /// Authorized write, recorded instead of executed.
    Simulated,
    Executed,
    Failed { error: String },
}

impl AuditOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            AuditOutcome::Denied { .. } => "denied",
            AuditOutcome::Allowed => "allowed",
            AuditOutcome::Simulated => "simulated",
            AuditOutcome::Executed => "executed",
            AuditOutcome::Failed { .. } => "failed",
        }
    }

    /// Outcome for a bare decision that is not followed by a call.
    pub fn decided(decision: &Decision) -> Self {
        match decision {
            Decision::Allow => AuditOutcome::Allowed,
            Decision::Deny { check, reason } => AuditOutcome::Denied {
                check: *check,
                reason: reason.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub principal: String,
    /// Agents on the call chain, outermost first.
    pub chain: Vec<String>,
    /// `None` for agent invocations.
    pub tool: Option<String>,
    pub access: Option<Access>,
    pub args: serde_json::Value,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    pub fn new(principal: String, chain: Vec<String>, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            principal,
            chain,
            tool: None,
            access: None,
            args: serde_json::Value::Null,
            outcome,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>, access: Access) -> Self {
        self.tool = Some(tool.into());
        self.access = Some(access);
        self
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) {
        self.records.lock().await.push(record);
    }
}

/// Writes each record as an `audit.recorded` tracing event.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) {
        info!(
            event = "audit.recorded",
            id = %record.id,
            principal = %record.principal,
            chain = %record.chain.join(" → "),
            tool = record.tool.as_deref().unwrap_or("-"),
            outcome = record.outcome.name(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditRecord::new("user:a".into(), vec!["x".into()], AuditOutcome::Executed))
            .await;
        sink.record(
            AuditRecord::new("user:a".into(), vec!["x".into()], AuditOutcome::Simulated)
                .with_tool("tools/a.js", Access::Write),
        )
        .await;
        let records = sink.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].outcome.name(), "simulated");
        assert_ne!(records[0].id, records[1].id);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_every_outcome() {
        let sink = TracingAuditSink;
        for outcome in [
            AuditOutcome::Allowed,
            AuditOutcome::Simulated,
            AuditOutcome::Failed { error: "boom".into() },
        ] {
            sink.record(
                AuditRecord::new("user:a".into(), vec!["x".into(), "y".into()], outcome)
                    .with_tool("agent:y", Access::Read),
            )
            .await;
        }
    }

    #[test]
    fn test_decided_maps_decisions() {
        assert_eq!(AuditOutcome::decided(&Decision::Allow), AuditOutcome::Allowed);
        let denied = AuditOutcome::decided(&Decision::Deny {
            check: Check::Role,
            reason: "no acl".into(),
        });
        assert_eq!(denied.name(), "denied");
    }

    #[test]
    fn test_outcome_serde_tag() {
        let json = serde_json::to_value(AuditOutcome::Denied {
            check: Check::Capability,
            reason: "x".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "denied");
        assert_eq!(json["check"], "capability");
    }
}
