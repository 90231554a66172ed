//! Access levels for tools and roles for agents/loops.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ParseError;

/// Access level of a tool entry or grant.
///
/// Ordered: `Read < Write`. A write-level capability or grant satisfies a
/// read request; a read-level one never satisfies a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Whether holding `self` is enough for a request at `requested`.
    pub fn satisfies(self, requested: Access) -> bool {
        self >= requested
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Access {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Access::Read),
            "write" => Ok(Access::Write),
            other => Err(ParseError::UnknownAccess {
                value: other.to_string(),
            }),
        }
    }
}

/// Role held by a principal on an agent or loop.
///
/// `Execute` implies `Read`: whoever may run an agent may also see its
/// history and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Read,
    Execute,
}

impl Role {
    /// Whether holding `self` is enough for an operation requiring `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::Execute => "execute",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Role::Read),
            "execute" => Ok(Role::Execute),
            other => Err(ParseError::UnknownRole {
                value: other.to_string(),
            }),
        }
    }
}
