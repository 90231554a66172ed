//! Remote endpoint reachability probes.
//!
//! Probes run concurrently, bounded by a semaphore, and each one is raced
//! against the per-probe timeout so no endpoint can hang the build.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::Result;

/// Checks whether a remote tool server answers at all.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// `Ok` once any response arrives; `Err` with a reason otherwise.
    async fn probe(&self, url: &str) -> std::result::Result<(), String>;
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable(String),
    TimedOut(Duration),
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

/// HTTP probe. Any status code proves reachability.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("agentforge/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

/// WebSocket endpoints are probed over their HTTP counterpart.
fn http_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        url.to_string()
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn probe(&self, url: &str) -> std::result::Result<(), String> {
        match self.client.head(http_url(url)).send().await {
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "endpoint answered");
                Ok(())
            }
            Err(e) if e.is_timeout() => Err("request timed out".to_string()),
            Err(e) if e.is_connect() => Err(format!("connection failed: {e}")),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Probe every URL, at most `concurrency` at a time, each bounded by `timeout`.
///
/// Waits for every probe to settle. The result is keyed by URL.
pub async fn probe_endpoints(
    probe: Arc<dyn EndpointProbe>,
    urls: Vec<String>,
    concurrency: usize,
    timeout: Duration,
) -> BTreeMap<String, ProbeOutcome> {
    let sem = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(urls.len());

    for url in urls {
        let probe = Arc::clone(&probe);
        let sem = Arc::clone(&sem);
        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let outcome = match tokio::time::timeout(timeout, probe.probe(&url)).await {
                Ok(Ok(())) => ProbeOutcome::Reachable,
                Ok(Err(reason)) => ProbeOutcome::Unreachable(reason),
                Err(_) => ProbeOutcome::TimedOut(timeout),
            };
            (url, outcome)
        }));
    }

    let mut outcomes = BTreeMap::new();
    for joined in futures::future::join_all(tasks).await {
        match joined {
            Ok((url, outcome)) => {
                outcomes.insert(url, outcome);
            }
            Err(e) => debug!(error = %e, "probe task aborted"),
        }
    }
    outcomes
}
