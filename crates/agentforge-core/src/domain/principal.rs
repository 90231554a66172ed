//! Principals: the identities authorization decisions are made about.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ParseError;

/// Pattern shared by agent, loop, service-account and group names.
pub const NAME_PATTERN: &str = "^[a-z0-9][a-z0-9-]*$";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern compiles"))
}

fn principal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:user:[^\s:]+|group:[a-z0-9][a-z0-9-]*|service-account:[a-z0-9][a-z0-9-]*)$")
            .expect("principal pattern compiles")
    })
}

/// Whether `name` is a valid lowercase-alphanumeric-hyphen name.
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

/// An identity that can be authorized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(String),
    Group(String),
    ServiceAccount(String),
}

impl Principal {
    /// Parse `kind:identifier`. Fails unless the string matches one of the
    /// three recognized principal patterns.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if !principal_regex().is_match(s) {
            return Err(ParseError::MalformedPrincipal {
                value: s.to_string(),
            });
        }
        let (kind, id) = s.split_once(':').ok_or_else(|| ParseError::MalformedPrincipal {
            value: s.to_string(),
        })?;
        let id = id.to_string();
        match kind {
            "user" => Ok(Principal::User(id)),
            "group" => Ok(Principal::Group(id)),
            "service-account" => Ok(Principal::ServiceAccount(id)),
            _ => Err(ParseError::MalformedPrincipal {
                value: s.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Principal::User(_) => "user",
            Principal::Group(_) => "group",
            Principal::ServiceAccount(_) => "service-account",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Principal::User(id) | Principal::Group(id) | Principal::ServiceAccount(id) => id,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

impl FromStr for Principal {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Principal::parse(s)
    }
}
