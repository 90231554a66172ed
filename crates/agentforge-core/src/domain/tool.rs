//! Tool entries: the exhaustive allowlist an agent declares.

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use super::access::Access;
use super::principal::is_valid_name;

/// Schemes accepted for remote tool servers.
pub const REMOTE_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// Prefix marking an intra-project agent reference in a `server` field.
pub const AGENT_REF_PREFIX: &str = "agent:";

/// One entry of an agent's `tools` list.
///
/// Closed sum type: resolution, authorization and bundling all match on it
/// exhaustively, so a new form is a compile error everywhere it matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolEntry {
    /// A tool served over a protocol URL.
    Remote { server: String, access: Access },
    /// A tool implemented by a source file inside the project.
    Local { name: String, access: Access },
    /// Another agent of the same project, callable as a tool.
    Agent { agent: String, access: Access },
}

impl ToolEntry {
    /// Build an entry from the raw `server` / `name` fields of a spec.
    ///
    /// Exactly one of the two must be present.
    pub fn from_fields(
        server: Option<&str>,
        name: Option<&str>,
        access: Access,
    ) -> Result<Self, String> {
        match (server, name) {
            (Some(_), Some(_)) => {
                Err("tool entry must set exactly one of `server` or `name`, not both".to_string())
            }
            (None, None) => Err("tool entry must set one of `server` or `name`".to_string()),
            (Some(server), None) => {
                if let Some(agent) = server.strip_prefix(AGENT_REF_PREFIX) {
                    if !is_valid_name(agent) {
                        return Err(format!(
                            "agent tool reference '{server}' must name an agent (lowercase letters, digits, hyphens)"
                        ));
                    }
                    return Ok(ToolEntry::Agent {
                        agent: agent.to_string(),
                        access,
                    });
                }
                validate_remote_url(server)?;
                Ok(ToolEntry::Remote {
                    server: server.to_string(),
                    access,
                })
            }
            (None, Some(name)) => {
                validate_local_path(name)?;
                Ok(ToolEntry::Local {
                    name: name.to_string(),
                    access,
                })
            }
        }
    }

    pub fn access(&self) -> Access {
        match self {
            ToolEntry::Remote { access, .. }
            | ToolEntry::Local { access, .. }
            | ToolEntry::Agent { access, .. } => *access,
        }
    }

    /// The identity used by grants and capability checks.
    pub fn reference(&self) -> String {
        match self {
            ToolEntry::Remote { server, .. } => server.clone(),
            ToolEntry::Local { name, .. } => name.clone(),
            ToolEntry::Agent { agent, .. } => format!("{AGENT_REF_PREFIX}{agent}"),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ToolEntry::Remote { .. } => "remote",
            ToolEntry::Local { .. } => "local",
            ToolEntry::Agent { .. } => "agent",
        }
    }
}

impl fmt::Display for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.reference(), self.kind_name(), self.access())
    }
}

fn validate_remote_url(server: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(server)
        .map_err(|e| format!("server '{server}' is not a valid URL: {e}"))?;
    if !REMOTE_SCHEMES.contains(&url.scheme()) {
        return Err(format!(
            "server '{server}' uses unsupported scheme '{}'; expected one of {} or agent:<name>",
            url.scheme(),
            REMOTE_SCHEMES.join(", ")
        ));
    }
    Ok(())
}

fn validate_local_path(name: &str) -> Result<(), String> {
    let path = Path::new(name);
    if name.trim().is_empty() {
        return Err("local tool name must not be empty".to_string());
    }
    if path.is_absolute() {
        return Err(format!(
            "local tool '{name}' must be a path relative to the project root"
        ));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(format!("local tool '{name}' must not leave the project root"));
    }
    Ok(())
}
