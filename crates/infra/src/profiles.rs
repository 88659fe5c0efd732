//! Student and instructor profiles.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use learnhub_auth::{AccountDraft, Role};
use learnhub_core::{AccountId, DomainError, InstructorId, StudentId};
use learnhub_learning::{Instructor, NewInstructor, NewStudent, Student};

use crate::store::{AccountStore, InstructorStore, StoreError, Stores, StudentStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(DomainError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProfileError {
    pub(crate) fn not_found(what: &str, id: impl core::fmt::Display) -> Self {
        Self::NotFound(format!("{what} {id}"))
    }
}

/// Input for promoting an existing account to instructor.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub account_id: AccountId,
    /// Display name; the account's username when absent.
    pub name: Option<String>,
    pub specialization: String,
}

pub struct ProfileService {
    accounts: Arc<dyn AccountStore>,
    students: Arc<dyn StudentStore>,
    instructors: Arc<dyn InstructorStore>,
}

impl ProfileService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            accounts: stores.accounts.clone(),
            students: stores.students.clone(),
            instructors: stores.instructors.clone(),
        }
    }

    #[instrument(skip(self, student), fields(email = %student.email), err)]
    pub async fn create_student(&self, student: NewStudent) -> Result<Student, ProfileError> {
        student.validate().map_err(ProfileError::Validation)?;
        if let Some(account_id) = student.account_id {
            self.require_account(account_id).await?;
        }
        let created = self.students.insert(student).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => ProfileError::Conflict("a student with this email already exists".into()),
            other => ProfileError::Store(other),
        })?;
        info!(student_id = %created.id, "student created");
        Ok(created)
    }

    pub async fn student(&self, id: StudentId) -> Result<Student, ProfileError> {
        self.students
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProfileError::not_found("student", id))
    }

    pub async fn student_by_account(&self, account_id: AccountId) -> Result<Student, ProfileError> {
        self.students
            .find_by_account(account_id)
            .await?
            .ok_or_else(|| ProfileError::not_found("student for account", account_id))
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, ProfileError> {
        Ok(self.students.list().await?)
    }

    /// Create the instructor profile for an account and grant it INSTRUCTOR.
    ///
    /// The role is granted before the profile is inserted. A profile left
    /// behind without the role has it re-granted instead of conflicting.
    #[instrument(skip(self, promotion), fields(account_id = %promotion.account_id), err)]
    pub async fn promote_to_instructor(&self, promotion: Promotion) -> Result<Instructor, ProfileError> {
        let account = self.require_account(promotion.account_id).await?;
        if let Some(existing) = self.instructors.find_by_account(account.id).await? {
            if account.roles.contains(Role::Instructor) {
                return Err(ProfileError::Conflict("account is already an instructor".into()));
            }
            self.grant_instructor_role(account.id).await?;
            info!(instructor_id = %existing.id, "instructor role restored for existing profile");
            return Ok(existing);
        }

        let name = promotion.name.as_deref().unwrap_or(&account.username);
        let draft = NewInstructor::new(name, &account.email, &promotion.specialization, Some(account.id));
        draft.validate().map_err(ProfileError::Validation)?;

        self.grant_instructor_role(account.id).await?;
        let instructor = self.instructors.insert(draft).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => ProfileError::Conflict("account is already an instructor".into()),
            other => ProfileError::Store(other),
        })?;
        info!(instructor_id = %instructor.id, "account promoted to instructor");
        Ok(instructor)
    }

    async fn grant_instructor_role(&self, id: AccountId) -> Result<(), ProfileError> {
        // Re-read so a concurrent role change is not overwritten.
        let account = self.require_account(id).await?;
        if account.roles.contains(Role::Instructor) {
            return Ok(());
        }
        let mut draft = AccountDraft::from(account);
        draft.roles.insert(Role::Instructor);
        self.accounts.save(draft).await?;
        Ok(())
    }

    pub async fn instructor(&self, id: InstructorId) -> Result<Instructor, ProfileError> {
        self.instructors
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProfileError::not_found("instructor", id))
    }

    pub async fn list_instructors(&self) -> Result<Vec<Instructor>, ProfileError> {
        Ok(self.instructors.list().await?)
    }

    async fn require_account(&self, id: AccountId) -> Result<learnhub_auth::Account, ProfileError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| ProfileError::not_found("account", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use learnhub_auth::{Account, PasswordHash, RoleSet};

    use crate::store::StoreResult;

    async fn account(stores: &Stores, email: &str) -> learnhub_auth::Account {
        stores
            .accounts
            .save(AccountDraft::new(
                "teacher01",
                email,
                PasswordHash::from_stored("$2b$04$x".into()),
                RoleSet::single(Role::User),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn student_email_is_unique() {
        let svc = ProfileService::new(&Stores::in_memory());
        svc.create_student(NewStudent::new("Ada Lovelace", "ada@example.com", None))
            .await
            .unwrap();
        assert!(matches!(
            svc.create_student(NewStudent::new("Ada Again", "ADA@example.com", None)).await,
            Err(ProfileError::Conflict(_))
        ));
        assert_eq!(svc.list_students().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn student_lookups() {
        let stores = Stores::in_memory();
        let svc = ProfileService::new(&stores);
        let owner = account(&stores, "ada@example.com").await;
        let created = svc
            .create_student(NewStudent::new("Ada Lovelace", "ada@example.com", Some(owner.id)))
            .await
            .unwrap();

        assert_eq!(svc.student(created.id).await.unwrap(), created);
        assert_eq!(svc.student_by_account(owner.id).await.unwrap(), created);
        assert!(matches!(svc.student(StudentId::new(42)).await, Err(ProfileError::NotFound(_))));
        assert!(matches!(
            svc.create_student(NewStudent::new("Ghost Student", "ghost@example.com", Some(AccountId::new(42))))
                .await,
            Err(ProfileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn promotion_creates_profile_and_grants_role() {
        let stores = Stores::in_memory();
        let svc = ProfileService::new(&stores);
        let acc = account(&stores, "grace@example.com").await;

        let instructor = svc
            .promote_to_instructor(Promotion {
                account_id: acc.id,
                name: Some("Grace Hopper".into()),
                specialization: "Compilers".into(),
            })
            .await
            .unwrap();
        assert_eq!(instructor.email, "grace@example.com");
        assert_eq!(instructor.account_id, Some(acc.id));

        let roles = stores.accounts.roles_of(acc.id).await.unwrap().unwrap();
        assert!(roles.contains(Role::Instructor));
        assert!(roles.contains(Role::User));

        assert!(matches!(
            svc.promote_to_instructor(Promotion {
                account_id: acc.id,
                name: None,
                specialization: "Compilers".into(),
            })
            .await,
            Err(ProfileError::Conflict(_))
        ));
        assert_eq!(svc.list_instructors().await.unwrap().len(), 1);
    }

    /// Fails the first `save` it sees, then delegates.
    struct FlakyAccounts {
        inner: Arc<dyn AccountStore>,
        tripped: AtomicBool,
    }

    #[async_trait]
    impl AccountStore for FlakyAccounts {
        async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
            self.inner.find_by_email(email).await
        }
        async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
            self.inner.exists_by_email(email).await
        }
        async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
            self.inner.find_by_id(id).await
        }
        async fn save(&self, draft: AccountDraft) -> StoreResult<Account> {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner.save(draft).await
        }
        async fn roles_of(&self, id: AccountId) -> StoreResult<Option<RoleSet>> {
            self.inner.roles_of(id).await
        }
        async fn list(&self) -> StoreResult<Vec<Account>> {
            self.inner.list().await
        }
    }

    #[tokio::test]
    async fn failed_role_grant_leaves_no_profile_and_retry_succeeds() {
        let base = Stores::in_memory();
        let acc = account(&base, "grace@example.com").await;
        let stores = Stores {
            accounts: Arc::new(FlakyAccounts {
                inner: base.accounts.clone(),
                tripped: AtomicBool::new(false),
            }),
            ..base.clone()
        };
        let svc = ProfileService::new(&stores);
        let promotion = || Promotion {
            account_id: acc.id,
            name: Some("Grace Hopper".into()),
            specialization: "Compilers".into(),
        };

        assert!(matches!(
            svc.promote_to_instructor(promotion()).await,
            Err(ProfileError::Store(StoreError::Backend(_)))
        ));
        assert!(stores.instructors.find_by_account(acc.id).await.unwrap().is_none());

        let instructor = svc.promote_to_instructor(promotion()).await.unwrap();
        assert_eq!(instructor.account_id, Some(acc.id));
        let roles = stores.accounts.roles_of(acc.id).await.unwrap().unwrap();
        assert!(roles.contains(Role::Instructor));
    }

    #[tokio::test]
    async fn profile_without_role_is_regranted() {
        let stores = Stores::in_memory();
        let svc = ProfileService::new(&stores);
        let acc = account(&stores, "grace@example.com").await;
        let existing = stores
            .instructors
            .insert(NewInstructor::new("Grace Hopper", "grace@example.com", "Compilers", Some(acc.id)))
            .await
            .unwrap();

        let promoted = svc
            .promote_to_instructor(Promotion {
                account_id: acc.id,
                name: None,
                specialization: "Compilers".into(),
            })
            .await
            .unwrap();
        assert_eq!(promoted, existing);
        let roles = stores.accounts.roles_of(acc.id).await.unwrap().unwrap();
        assert!(roles.contains(Role::Instructor));
        assert_eq!(svc.list_instructors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn promotion_of_unknown_account_is_not_found() {
        let svc = ProfileService::new(&Stores::in_memory());
        assert!(matches!(
            svc.promote_to_instructor(Promotion {
                account_id: AccountId::new(9),
                name: None,
                specialization: "Compilers".into(),
            })
            .await,
            Err(ProfileError::NotFound(_))
        ));
    }
}
