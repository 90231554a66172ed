//! Authorization decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which check rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// Tool missing from the agent's allowlist, or declared below the requested access.
    Capability,
    /// Principal holds no grant (or too weak a grant) for the tool.
    Privilege,
    /// Principal lacks the required role in the agent's or loop's ACL.
    Role,
    /// Agent, loop or target agent is not in the manifest.
    UnknownResource,
}

impl Check {
    pub fn as_str(self) -> &'static str {
        match self {
            Check::Capability => "capability",
            Check::Privilege => "privilege",
            Check::Role => "role",
            Check::UnknownResource => "unknown_resource",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny { check: Check, reason: String },
}

impl Decision {
    pub(crate) fn deny(check: Check, reason: impl Into<String>) -> Self {
        Decision::Deny {
            check,
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// The failing check, if denied.
    pub fn check(&self) -> Option<Check> {
        match self {
            Decision::Allow => None,
            Decision::Deny { check, .. } => Some(*check),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allowed"),
            Decision::Deny { check, reason } => write!(f, "denied ({check} check): {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failing_check() {
        let d = Decision::deny(Check::Privilege, "no grant for user:bob");
        assert_eq!(d.to_string(), "denied (privilege check): no grant for user:bob");
        assert_eq!(Decision::Allow.to_string(), "allowed");
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_value(Decision::deny(Check::UnknownResource, "x")).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["check"], "unknown_resource");
        assert!(!Decision::deny(Check::Role, "x").is_allowed());
    }
}
