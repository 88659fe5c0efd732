use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_auth::account::{is_plausible_email, normalize_email};
use learnhub_core::{AccountId, DomainResult, FieldErrors, StudentId};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 100;

/// Student profile. `email` is unique among students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Whether this profile belongs to `account`.
    pub fn is_owned_by(&self, account: AccountId) -> bool {
        self.account_id == Some(account)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub account_id: Option<AccountId>,
}

impl NewStudent {
    pub fn new(name: &str, email: &str, account_id: Option<AccountId>) -> Self {
        Self {
            name: name.trim().to_string(),
            email: normalize_email(email),
            account_id,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        let len = self.name.chars().count();
        errors.check(
            (NAME_MIN..=NAME_MAX).contains(&len),
            "name",
            "name must be between 3 and 100 characters",
        );
        errors.check(is_plausible_email(&self.email), "email", "email should be valid");
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_core::DomainError;

    #[test]
    fn normalizes_name_and_email() {
        let s = NewStudent::new("  Ada Lovelace ", " Ada@Example.com", None);
        assert_eq!(s.name, "Ada Lovelace");
        assert_eq!(s.email, "ada@example.com");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_short_name_and_bad_email() {
        let err = NewStudent::new("Al", "nope", None).validate().unwrap_err();
        let DomainError::InvalidFields(fields) = err else {
            panic!("expected field errors");
        };
        assert_eq!(fields.fields().collect::<Vec<_>>(), vec!["email", "name"]);
    }

    #[test]
    fn ownership_follows_the_linked_account() {
        let student = Student {
            id: StudentId::new(1),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            account_id: Some(AccountId::new(9)),
            created_at: Utc::now(),
        };
        assert!(student.is_owned_by(AccountId::new(9)));
        assert!(!student.is_owned_by(AccountId::new(10)));
    }
}
