//! Declarative operation → access policy table.
//!
//! Operations are identified by strings such as `"POST /api/courses"`. The
//! table is built once at startup and is read-only afterwards.

use std::collections::HashMap;

use crate::roles::Role;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// No token required; a token that is present is still not inspected.
    Public,
    /// Any valid session token.
    Authenticated,
    /// A valid session token whose account currently holds the role.
    RequiresRole(Role),
}

/// Immutable mapping of operations to policies.
///
/// Operations that were never registered fall back to
/// [`AccessPolicy::Authenticated`], so forgetting an entry never opens a route.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    entries: HashMap<String, AccessPolicy>,
}

impl PolicyTable {
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    pub fn policy_for(&self, operation: &str) -> AccessPolicy {
        self.entries
            .get(operation)
            .copied()
            .unwrap_or(AccessPolicy::Authenticated)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PolicyTableBuilder {
    entries: HashMap<String, AccessPolicy>,
}

impl PolicyTableBuilder {
    pub fn public(self, operation: &str) -> Self {
        self.with(operation, AccessPolicy::Public)
    }

    pub fn authenticated(self, operation: &str) -> Self {
        self.with(operation, AccessPolicy::Authenticated)
    }

    pub fn role(self, operation: &str, role: Role) -> Self {
        self.with(operation, AccessPolicy::RequiresRole(role))
    }

    pub fn with(mut self, operation: &str, policy: AccessPolicy) -> Self {
        self.entries.insert(operation.to_string(), policy);
        self
    }

    pub fn build(self) -> PolicyTable {
        PolicyTable {
            entries: self.entries,
        }
    }
}
