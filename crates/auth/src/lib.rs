//! `learnhub-auth`: identity, session tokens and access decisions.
//!
//! No HTTP and no SQL in here; storage is reached only through the
//! [`RoleSource`] seam.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod password;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod token;

pub use account::{Account, AccountDraft, AccountView, normalize_email, validate_registration};
pub use authorize::{Access, AuthorizationGate, AuthzError, RoleLookupError, RoleSource, UnauthorizedReason};
pub use claims::{DisplayClaims, SessionClaims, TokenValidationError, VerifiedClaims, validate_claims};
pub use password::{PasswordError, PasswordHash, PasswordHasher};
pub use policy::{AccessPolicy, PolicyTable, PolicyTableBuilder};
pub use principal::Principal;
pub use roles::{Role, RoleSet, UnknownRole};
pub use token::{DEFAULT_TTL, IssuedToken, TokenError, TokenService};
