use learnhub_auth::Principal;
use learnhub_core::AccountId;

/// Authenticated caller of a request (identity + roles read at gate time).
///
/// Present on every route whose policy is not public.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn account_id(&self) -> AccountId {
        self.principal.account_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
