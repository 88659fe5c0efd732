//! Persistence seams.
//!
//! One trait per record kind. Every uniqueness rule in the data model is
//! enforced by the implementation (a Postgres constraint, or the in-memory
//! write lock) and surfaces as [`StoreError::UniqueViolation`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use learnhub_auth::{Account, AccountDraft, Role, RoleLookupError, RoleSet, RoleSource};
use learnhub_core::{AccountId, CourseId, EnrollmentId, InstructorId, RoleId, StudentId};
use learnhub_learning::{Course, Enrollment, Instructor, NewCourse, NewEnrollment, NewInstructor, NewStudent, Student};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Storage failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. The payload names the constraint.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist.
    #[error("foreign key violated: {0}")]
    ForeignKey(String),

    /// The write would break a domain invariant the store guards.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted role row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: Role,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Insert (`draft.id == None`) or replace the account and its role set.
    async fn save(&self, draft: AccountDraft) -> StoreResult<Account>;

    /// Current role set; `None` when the account does not exist.
    async fn roles_of(&self, id: AccountId) -> StoreResult<Option<RoleSet>>;

    async fn list(&self) -> StoreResult<Vec<Account>>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Return the row for `role`, inserting it first if absent. Idempotent.
    async fn find_or_create(&self, role: Role) -> StoreResult<RoleRecord>;

    async fn find_by_id(&self, id: RoleId) -> StoreResult<Option<RoleRecord>>;

    async fn find_by_name(&self, role: Role) -> StoreResult<Option<RoleRecord>>;

    async fn list(&self) -> StoreResult<Vec<RoleRecord>>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn insert(&self, student: NewStudent) -> StoreResult<Student>;

    async fn find_by_id(&self, id: StudentId) -> StoreResult<Option<Student>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Student>>;

    async fn find_by_account(&self, account_id: AccountId) -> StoreResult<Option<Student>>;

    /// Attach an account to a profile that has none. `Ok(None)` when the
    /// profile does not exist or is already linked.
    async fn link_account(&self, id: StudentId, account_id: AccountId) -> StoreResult<Option<Student>>;

    async fn list(&self) -> StoreResult<Vec<Student>>;
}

#[async_trait]
pub trait InstructorStore: Send + Sync {
    async fn insert(&self, instructor: NewInstructor) -> StoreResult<Instructor>;

    async fn find_by_id(&self, id: InstructorId) -> StoreResult<Option<Instructor>>;

    async fn find_by_account(&self, account_id: AccountId) -> StoreResult<Option<Instructor>>;

    async fn list(&self) -> StoreResult<Vec<Instructor>>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn insert(&self, course: NewCourse) -> StoreResult<Course>;

    async fn find_by_id(&self, id: CourseId) -> StoreResult<Option<Course>>;

    async fn list(&self) -> StoreResult<Vec<Course>>;

    async fn list_by_instructor(&self, instructor_id: InstructorId) -> StoreResult<Vec<Course>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Fails with `UniqueViolation` if the (student, course) pair exists.
    async fn insert(&self, enrollment: NewEnrollment) -> StoreResult<Enrollment>;

    /// Full replacement. `Ok(None)` if `id` does not exist.
    async fn replace(&self, id: EnrollmentId, values: NewEnrollment) -> StoreResult<Option<Enrollment>>;

    /// `Ok(false)` if `id` did not exist.
    async fn delete(&self, id: EnrollmentId) -> StoreResult<bool>;

    async fn find_by_id(&self, id: EnrollmentId) -> StoreResult<Option<Enrollment>>;

    async fn find_by_pair(&self, student_id: StudentId, course_id: CourseId) -> StoreResult<Option<Enrollment>>;

    async fn list(&self) -> StoreResult<Vec<Enrollment>>;

    async fn list_by_student(&self, student_id: StudentId) -> StoreResult<Vec<Enrollment>>;

    async fn list_by_course(&self, course_id: CourseId) -> StoreResult<Vec<Enrollment>>;

    async fn count_by_course(&self, course_id: CourseId) -> StoreResult<u64>;
}

/// Every store the services need, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub roles: Arc<dyn RoleStore>,
    pub students: Arc<dyn StudentStore>,
    pub instructors: Arc<dyn InstructorStore>,
    pub courses: Arc<dyn CourseStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
}

impl Stores {
    /// Back every seam with one implementation.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AccountStore + RoleStore + StudentStore + InstructorStore + CourseStore + EnrollmentStore + 'static,
    {
        Self {
            accounts: backend.clone(),
            roles: backend.clone(),
            students: backend.clone(),
            instructors: backend.clone(),
            courses: backend.clone(),
            enrollments: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }
}

/// Adapts the credential store to the gate's [`RoleSource`] seam.
#[derive(Clone)]
pub struct AccountRoles(pub Arc<dyn AccountStore>);

#[async_trait]
impl RoleSource for AccountRoles {
    async fn roles_of(&self, account_id: AccountId) -> Result<Option<RoleSet>, RoleLookupError> {
        self.0
            .roles_of(account_id)
            .await
            .map_err(|e| RoleLookupError(e.to_string()))
    }
}
