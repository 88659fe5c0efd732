//! Account model for identity management.
//!
//! An account is a credential holder: a unique (normalized) email, a display
//! username, a bcrypt password hash and a non-empty role set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_core::{AccountId, DomainError, DomainResult, FieldErrors};

use crate::password::PasswordHash;
use crate::roles::RoleSet;

pub const USERNAME_MIN: usize = 5;
pub const USERNAME_MAX: usize = 50;
pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 16;

/// A persisted account.
///
/// # Invariants
/// - `email` is normalized (see [`normalize_email`]) and unique across accounts.
/// - `roles` is never empty.
/// - The plain-text password is never held here, only its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
}

/// Upsert payload for the credential store.
///
/// `id: None` inserts a new row and lets the store assign the identifier;
/// `Some(id)` replaces the existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDraft {
    pub id: Option<AccountId>,
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub roles: RoleSet,
}

impl AccountDraft {
    pub fn new(username: &str, email: &str, password_hash: PasswordHash, roles: RoleSet) -> Self {
        Self {
            id: None,
            username: username.trim().to_string(),
            email: normalize_email(email),
            password_hash,
            roles,
        }
    }

    pub fn ensure_roles(&self) -> DomainResult<()> {
        if self.roles.is_empty() {
            return Err(DomainError::invariant("an account must hold at least one role"));
        }
        Ok(())
    }
}

impl From<Account> for AccountDraft {
    fn from(account: Account) -> Self {
        Self {
            id: Some(account.id),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            roles: account.roles,
        }
    }
}

/// Public projection of an account (safe to serialize to clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub roles: RoleSet,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            roles: account.roles.clone(),
        }
    }
}

/// Canonical form used for storage and lookups: trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Field rules applied to a registration request.
pub fn validate_registration(username: &str, email: &str, password: &str) -> DomainResult<()> {
    let mut errors = FieldErrors::new();

    let username_len = username.trim().chars().count();
    if username_len == 0 {
        errors.add("username", "username is required");
    } else {
        errors.check(
            (USERNAME_MIN..=USERNAME_MAX).contains(&username_len),
            "username",
            "username must be between 5 and 50 characters",
        );
    }

    if email.trim().is_empty() {
        errors.add("email", "email is required");
    } else {
        errors.check(is_plausible_email(email), "email", "email should be valid");
    }

    let password_len = password.chars().count();
    if password_len == 0 {
        errors.add("password", "password is required");
    } else {
        errors.check(
            (PASSWORD_MIN..=PASSWORD_MAX).contains(&password_len),
            "password",
            "password must be between 6 and 16 characters",
        );
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_email_case_and_whitespace() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn plausible_email_shapes() {
        assert!(is_plausible_email("alice@example.com"));
        assert!(is_plausible_email("a.b+tag@sub.example.org"));
        assert!(!is_plausible_email("alice"));
        assert!(!is_plausible_email("alice@"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("alice@example"));
        assert!(!is_plausible_email("alice@@example.com"));
        assert!(!is_plausible_email("al ice@example.com"));
    }

    #[test]
    fn registration_reports_each_bad_field() {
        let err = validate_registration("bob", "not-an-email", "123").unwrap_err();
        let DomainError::InvalidFields(fields) = err else {
            panic!("expected field errors");
        };
        assert_eq!(
            fields.fields().collect::<Vec<_>>(),
            vec!["email", "password", "username"]
        );
    }

    #[test]
    fn registration_accepts_valid_input() {
        assert!(validate_registration("alice01", "alice@example.com", "s3cret!").is_ok());
    }

    #[test]
    fn draft_normalizes_email_and_requires_roles() {
        let draft = AccountDraft::new(
            " alice01 ",
            "ALICE@example.com",
            PasswordHash::from_stored("$2b$04$abc".to_string()),
            RoleSet::new(),
        );
        assert_eq!(draft.username, "alice01");
        assert_eq!(draft.email, "alice@example.com");
        assert!(draft.ensure_roles().is_err());
    }

    proptest! {
        /// Property: normalization is idempotent and case-insensitive.
        #[test]
        fn normalization_is_idempotent(local in "[A-Za-z0-9]{1,12}", domain in "[A-Za-z]{1,10}") {
            let raw = format!(" {local}@{domain}.Com ");
            let once = normalize_email(&raw);
            prop_assert_eq!(normalize_email(&once), once.clone());
            prop_assert_eq!(normalize_email(&raw.to_uppercase()), once);
        }
    }
}
