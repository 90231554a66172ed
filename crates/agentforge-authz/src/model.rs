//! The authorization model: pure lookups against an immutable manifest.
//!
//! Tool use needs two independent checks to pass:
//!
//! - **capability**: the acting agent declares the tool at an access level
//!   at least as high as the one requested;
//! - **privilege**: the calling principal holds a grant for the tool at a
//!   sufficient level, directly or through one of its groups. For an
//!   `agent:` tool the privilege is `execute` on the target agent instead.
//!
//! Agent and loop access is a single role check against the entity's ACL.
//! An entity without an ACL admits nobody.

use std::sync::Arc;

use agentforge_core::domain::tool::AGENT_REF_PREFIX;
use agentforge_core::obs;
use agentforge_core::{Access, AclEntry, BuildManifest, Principal, Role};

use crate::decision::{Check, Decision};
use crate::groups::GroupDirectory;

pub struct AuthorizationModel {
    manifest: Arc<BuildManifest>,
    groups: Arc<dyn GroupDirectory>,
}

impl AuthorizationModel {
    pub fn new(manifest: Arc<BuildManifest>, groups: Arc<dyn GroupDirectory>) -> Self {
        Self { manifest, groups }
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    /// May `principal` use `tool` at `access` through `agent`?
    ///
    /// Checks run in order: unknown resource, capability, privilege. The
    /// first failure is the decision.
    pub fn authorize_tool(
        &self,
        principal: &Principal,
        agent: &str,
        tool: &str,
        access: Access,
    ) -> Decision {
        let decision = self.decide_tool(principal, agent, tool, access);
        self.record(principal, &format!("{agent}/{tool}"), &decision);
        decision
    }

    /// May `principal` hold `role` on `agent` (execute to invoke, read for status)?
    pub fn authorize_agent(&self, principal: &Principal, agent: &str, role: Role) -> Decision {
        let decision = match self.manifest.agent(agent) {
            None => Decision::deny(
                Check::UnknownResource,
                format!("agent '{agent}' is not in manifest {}", short(&self.manifest.hash)),
            ),
            Some(resolved) => self.role_check(principal, "agent", agent, &resolved.acl, role),
        };
        self.record(principal, &format!("agent:{agent}"), &decision);
        decision
    }

    /// May `principal` hold `role` on loop `name` (execute to trigger, read for history)?
    pub fn authorize_loop(&self, principal: &Principal, name: &str, role: Role) -> Decision {
        let decision = match self.manifest.loop_spec(name) {
            None => Decision::deny(
                Check::UnknownResource,
                format!("loop '{name}' is not in manifest {}", short(&self.manifest.hash)),
            ),
            Some(resolved) => self.role_check(principal, "loop", name, &resolved.acl, role),
        };
        self.record(principal, &format!("loop:{name}"), &decision);
        decision
    }

    fn decide_tool(
        &self,
        principal: &Principal,
        agent: &str,
        tool: &str,
        access: Access,
    ) -> Decision {
        let Some(resolved) = self.manifest.agent(agent) else {
            return Decision::deny(
                Check::UnknownResource,
                format!("agent '{agent}' is not in manifest {}", short(&self.manifest.hash)),
            );
        };
        let target = tool.strip_prefix(AGENT_REF_PREFIX);
        if let Some(target) = target {
            if self.manifest.agent(target).is_none() {
                return Decision::deny(
                    Check::UnknownResource,
                    format!(
                        "target agent '{target}' is not in manifest {}",
                        short(&self.manifest.hash)
                    ),
                );
            }
        }

        match resolved.declared_access(tool) {
            None => {
                return Decision::deny(
                    Check::Capability,
                    format!("tool '{tool}' is not in agent '{agent}' allowlist"),
                )
            }
            Some(declared) if !declared.satisfies(access) => {
                return Decision::deny(
                    Check::Capability,
                    format!(
                        "agent '{agent}' declares '{tool}' with {declared} access; {access} requested"
                    ),
                )
            }
            Some(_) => {}
        }

        if let Some(target) = target {
            let held = self
                .manifest
                .agent(target)
                .and_then(|callee| self.role_of(principal, &callee.acl));
            return match held {
                Some(role) if role.satisfies(Role::Execute) => Decision::Allow,
                _ => Decision::deny(
                    Check::Privilege,
                    format!("{principal} lacks execute on agent '{target}'"),
                ),
            };
        }

        match self.grant_of(principal, tool) {
            None => Decision::deny(
                Check::Privilege,
                format!("{principal} has no grant for '{tool}'"),
            ),
            Some(granted) if !granted.satisfies(access) => Decision::deny(
                Check::Privilege,
                format!("{principal} is granted {granted} on '{tool}'; {access} requested"),
            ),
            Some(_) => Decision::Allow,
        }
    }

    fn role_check(
        &self,
        principal: &Principal,
        what: &str,
        name: &str,
        acl: &[AclEntry],
        required: Role,
    ) -> Decision {
        if acl.is_empty() {
            return Decision::deny(Check::Role, format!("{what} '{name}' has no acl"));
        }
        match self.role_of(principal, acl) {
            Some(held) if held.satisfies(required) => Decision::Allow,
            Some(held) => Decision::deny(
                Check::Role,
                format!("{principal} holds {held} on {what} '{name}'; {required} required"),
            ),
            None => Decision::deny(
                Check::Role,
                format!("{principal} is not in the acl of {what} '{name}'"),
            ),
        }
    }

    /// Every identity `principal` acts as: itself plus its groups.
    fn identities(&self, principal: &Principal) -> Vec<Principal> {
        let mut ids = vec![principal.clone()];
        ids.extend(self.groups.groups_of(principal).into_iter().map(Principal::Group));
        ids
    }

    fn matches(ids: &[Principal], entry: &str) -> bool {
        Principal::parse(entry).is_ok_and(|p| ids.contains(&p))
    }

    /// Highest role held through any matching ACL entry.
    fn role_of(&self, principal: &Principal, acl: &[AclEntry]) -> Option<Role> {
        let ids = self.identities(principal);
        acl.iter()
            .filter(|e| Self::matches(&ids, &e.principal))
            .map(|e| e.role)
            .max()
    }

    /// Highest access granted through any matching grant entry.
    fn grant_of(&self, principal: &Principal, tool: &str) -> Option<Access> {
        let ids = self.identities(principal);
        self.manifest
            .grants_for(tool)?
            .grants
            .iter()
            .filter(|g| Self::matches(&ids, &g.principal))
            .map(|g| g.access)
            .max()
    }

    fn record(&self, principal: &Principal, resource: &str, decision: &Decision) {
        obs::emit_authz_decided(
            &principal.to_string(),
            resource,
            decision.is_allowed(),
            decision.check().map(Check::as_str),
        );
    }
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
