//! Call-chain context: original principal, agent chain, deadline and
//! cancellation.
//!
//! A child context inherits the principal and the deadline of its parent
//! and observes its parent's cancellation signal as well as its own, so
//! cancelling any context stops every descendant.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use tokio::sync::watch;
use tokio::time::Instant;

use agentforge_core::Principal;

use crate::error::{DispatchError, DispatchResult};

#[derive(Debug, Clone)]
pub struct CallContext {
    principal: Principal,
    chain: Vec<String>,
    deadline: Instant,
    max_depth: usize,
    cancel: Arc<watch::Sender<bool>>,
    /// Own signal first, then each ancestor's.
    signals: Vec<watch::Receiver<bool>>,
}

impl CallContext {
    /// Context for an outer invocation of `agent`, due within `timeout`.
    pub fn root(
        principal: Principal,
        agent: impl Into<String>,
        timeout: Duration,
        max_depth: usize,
    ) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            principal,
            chain: vec![agent.into()],
            deadline: Instant::now() + timeout,
            max_depth: max_depth.max(1),
            cancel: Arc::new(tx),
            signals: vec![rx],
        }
    }

    /// Context for a nested call into `agent`.
    pub fn child(&self, agent: &str) -> DispatchResult<Self> {
        if self.chain.len() >= self.max_depth {
            return Err(DispatchError::DepthExceeded {
                depth: self.chain.len() + 1,
                max: self.max_depth,
            });
        }
        if self.chain.iter().any(|a| a == agent) {
            return Err(DispatchError::Recursion {
                agent: agent.to_string(),
                chain: self.chain_display(),
            });
        }
        let (tx, rx) = watch::channel(false);
        let mut signals = Vec::with_capacity(self.signals.len() + 1);
        signals.push(rx);
        signals.extend(self.signals.iter().cloned());
        let mut chain = self.chain.clone();
        chain.push(agent.to_string());
        Ok(Self {
            principal: self.principal.clone(),
            chain,
            deadline: self.deadline,
            max_depth: self.max_depth,
            cancel: Arc::new(tx),
            signals,
        })
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The agent currently acting.
    pub fn agent(&self) -> &str {
        self.chain.last().map(String::as_str).unwrap_or_default()
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn chain_display(&self) -> String {
        self.chain.join(" → ")
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|rx| *rx.borrow())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Resolves once this context or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let waits = self.signals.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                    // Sender gone without cancelling: never fires.
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    /// Run `fut` unless the deadline passes or the chain is cancelled first.
    pub async fn run<F: Future>(&self, fut: F) -> DispatchResult<F::Output> {
        if self.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        if self.is_expired() {
            return Err(DispatchError::DeadlineExceeded);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(DispatchError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(DispatchError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
