//! The authorization gate.
//!
//! Turns an operation id plus an optional bearer token into an allow/deny
//! decision. Roles are always read through a [`RoleSource`] at decision time,
//! so a role revoked after a token was issued takes effect on the very next
//! request.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use learnhub_core::AccountId;

use crate::policy::{AccessPolicy, PolicyTable};
use crate::principal::Principal;
use crate::roles::{Role, RoleSet};
use crate::token::{TokenError, TokenService};

/// Failure to read an account's roles (infrastructure, not a deny).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("role lookup failed: {0}")]
pub struct RoleLookupError(pub String);

/// Current role set of an account, read fresh on every call.
#[async_trait]
pub trait RoleSource: Send + Sync {
    /// `Ok(None)` when the account no longer exists.
    async fn roles_of(&self, account_id: AccountId) -> Result<Option<RoleSet>, RoleLookupError>;
}

#[async_trait]
impl<T: RoleSource + ?Sized> RoleSource for Arc<T> {
    async fn roles_of(&self, account_id: AccountId) -> Result<Option<RoleSet>, RoleLookupError> {
        (**self).roles_of(account_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingToken,
    Token(TokenError),
    UnknownAccount,
}

impl core::fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UnauthorizedReason::MissingToken => f.write_str("missing bearer token"),
            UnauthorizedReason::Token(e) => write!(f, "{e}"),
            UnauthorizedReason::UnknownAccount => f.write_str("account no longer exists"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthorized: {0}")]
    Unauthorized(UnauthorizedReason),

    #[error("forbidden: role '{required}' required")]
    Forbidden { required: Role },

    #[error(transparent)]
    RoleLookup(#[from] RoleLookupError),
}

/// Outcome of an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Public operation; no identity was established.
    Anonymous,
    Granted(Principal),
}

impl Access {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Access::Anonymous => None,
            Access::Granted(p) => Some(p),
        }
    }
}

pub struct AuthorizationGate<R> {
    tokens: Arc<TokenService>,
    policies: PolicyTable,
    roles: R,
}

impl<R: RoleSource> AuthorizationGate<R> {
    pub fn new(tokens: Arc<TokenService>, policies: PolicyTable, roles: R) -> Self {
        Self {
            tokens,
            policies,
            roles,
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub async fn authorize(&self, operation: &str, bearer: Option<&str>) -> Result<Access, AuthzError> {
        let policy = self.policies.policy_for(operation);
        if policy == AccessPolicy::Public {
            return Ok(Access::Anonymous);
        }

        let token = bearer.ok_or(AuthzError::Unauthorized(UnauthorizedReason::MissingToken))?;
        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(operation, error = %e, "token rejected");
            AuthzError::Unauthorized(UnauthorizedReason::Token(e))
        })?;

        let roles = self
            .roles
            .roles_of(claims.account_id)
            .await?
            .ok_or(AuthzError::Unauthorized(UnauthorizedReason::UnknownAccount))?;

        if let AccessPolicy::RequiresRole(required) = policy {
            if !roles.contains(required) {
                tracing::warn!(
                    operation,
                    account_id = %claims.account_id,
                    required = %required,
                    "forbidden: missing role"
                );
                return Err(AuthzError::Forbidden { required });
            }
        }

        Ok(Access::Granted(Principal::new(claims.account_id, roles)))
    }
}
