use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use learnhub_auth::account::{is_plausible_email, normalize_email};
use learnhub_core::{AccountId, DomainResult, FieldErrors, InstructorId};

/// Instructor profile. At most one per account; `email` unique among instructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstructor {
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub account_id: Option<AccountId>,
}

impl NewInstructor {
    pub fn new(name: &str, email: &str, specialization: &str, account_id: Option<AccountId>) -> Self {
        Self {
            name: name.trim().to_string(),
            email: normalize_email(email),
            specialization: specialization.trim().to_string(),
            account_id,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = FieldErrors::new();
        errors.check(
            (3..=100).contains(&self.name.chars().count()),
            "name",
            "name must be between 3 and 100 characters",
        );
        errors.check(is_plausible_email(&self.email), "email", "email should be valid");
        errors.check(
            (2..=100).contains(&self.specialization.chars().count()),
            "specialization",
            "specialization must be between 2 and 100 characters",
        );
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_instructor_passes() {
        let i = NewInstructor::new("Grace Hopper", "GRACE@navy.mil", " Compilers ", Some(AccountId::new(3)));
        assert_eq!(i.email, "grace@navy.mil");
        assert_eq!(i.specialization, "Compilers");
        assert!(i.validate().is_ok());
    }

    #[test]
    fn blank_specialization_is_rejected() {
        let i = NewInstructor::new("Grace Hopper", "grace@navy.mil", "   ", None);
        assert!(i.validate().is_err());
    }
}
