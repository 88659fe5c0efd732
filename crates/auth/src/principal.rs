use serde::Serialize;

use learnhub_core::AccountId;

use crate::roles::{Role, RoleSet};

/// Identity attached to an authorized request.
///
/// `roles` is the role set read from the account store while the request was
/// being authorized, never the set that was current when the token was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub roles: RoleSet,
}

impl Principal {
    pub fn new(account_id: AccountId, roles: RoleSet) -> Self {
        Self { account_id, roles }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}
