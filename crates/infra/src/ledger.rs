//! The enrollment ledger: the authoritative record of who is in which course.
//!
//! Every write re-checks its preconditions immediately before touching the
//! store, and a uniqueness violation reported by the store itself is mapped
//! to [`LedgerError::AlreadyEnrolled`] so concurrent duplicates still fail
//! cleanly.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use learnhub_auth::{Principal, Role};
use learnhub_core::{CourseId, EnrollmentId, StudentId};
use learnhub_learning::{CapacityPolicy, Course, Enrollment, NewEnrollment};

use crate::store::{CourseStore, EnrollmentStore, StoreError, Stores, StudentStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("enrollment date {date} is in the future (today is {today})")]
    InvalidDate { date: NaiveDate, today: NaiveDate },

    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    #[error("course {0} not found")]
    CourseNotFound(CourseId),

    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),

    #[error("course {0} is full")]
    CourseFull(CourseId),

    #[error("student {student_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled { student_id: StudentId, course_id: CourseId },

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct EnrollmentLedger {
    enrollments: Arc<dyn EnrollmentStore>,
    students: Arc<dyn StudentStore>,
    courses: Arc<dyn CourseStore>,
    capacity: CapacityPolicy,
    today: Clock,
}

impl EnrollmentLedger {
    pub fn new(stores: &Stores, capacity: CapacityPolicy) -> Self {
        Self {
            enrollments: stores.enrollments.clone(),
            students: stores.students.clone(),
            courses: stores.courses.clone(),
            capacity,
            today: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replace the source of "today" (tests pin the date with this).
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn capacity(&self) -> CapacityPolicy {
        self.capacity
    }

    #[instrument(skip(self), err)]
    pub async fn enroll(&self, values: NewEnrollment) -> Result<Enrollment, LedgerError> {
        self.check(&values, None).await?;

        let enrollment = self
            .enrollments
            .insert(values)
            .await
            .map_err(|e| duplicate_or_store(e, &values))?;
        info!(
            enrollment_id = %enrollment.id,
            student_id = %enrollment.student_id,
            course_id = %enrollment.course_id,
            "student enrolled"
        );
        Ok(enrollment)
    }

    /// Full replacement with the same validation as [`Self::enroll`]. The new
    /// (student, course) pair must not belong to another enrollment.
    #[instrument(skip(self), err)]
    pub async fn update(&self, id: EnrollmentId, values: NewEnrollment) -> Result<Enrollment, LedgerError> {
        let current = self.get(id).await?;
        self.check(&values, Some(&current)).await?;

        let updated = self
            .enrollments
            .replace(id, values)
            .await
            .map_err(|e| duplicate_or_store(e, &values))?
            .ok_or(LedgerError::EnrollmentNotFound(id))?;
        info!(enrollment_id = %id, "enrollment replaced");
        Ok(updated)
    }

    #[instrument(skip(self), err)]
    pub async fn unenroll(&self, id: EnrollmentId) -> Result<(), LedgerError> {
        if !self.enrollments.delete(id).await? {
            return Err(LedgerError::EnrollmentNotFound(id));
        }
        info!(enrollment_id = %id, "enrollment removed");
        Ok(())
    }

    /// [`Self::enroll`] on behalf of a caller. Admins may enroll anyone;
    /// otherwise the caller must hold USER and own the student profile.
    pub async fn enroll_as(&self, caller: &Principal, values: NewEnrollment) -> Result<Enrollment, LedgerError> {
        if !caller.is_admin() {
            if !caller.has_role(Role::User) {
                warn!(account_id = %caller.account_id, "self-enrollment rejected: USER role required");
                return Err(LedgerError::Forbidden("only USER accounts may self-enroll"));
            }
            self.ensure_owner(caller, values.student_id).await?;
        }
        self.enroll(values).await
    }

    /// [`Self::unenroll`] on behalf of a caller: admins, or the owning student.
    pub async fn unenroll_as(&self, caller: &Principal, id: EnrollmentId) -> Result<(), LedgerError> {
        if !caller.is_admin() {
            let enrollment = self.get(id).await?;
            self.ensure_owner(caller, enrollment.student_id).await?;
        }
        self.unenroll(id).await
    }

    pub async fn get(&self, id: EnrollmentId) -> Result<Enrollment, LedgerError> {
        self.enrollments
            .find_by_id(id)
            .await?
            .ok_or(LedgerError::EnrollmentNotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Enrollment>, LedgerError> {
        Ok(self.enrollments.list().await?)
    }

    pub async fn list_by_student(&self, student_id: StudentId) -> Result<Vec<Enrollment>, LedgerError> {
        Ok(self.enrollments.list_by_student(student_id).await?)
    }

    pub async fn list_by_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>, LedgerError> {
        Ok(self.enrollments.list_by_course(course_id).await?)
    }

    pub async fn count_by_course(&self, course_id: CourseId) -> Result<u64, LedgerError> {
        Ok(self.enrollments.count_by_course(course_id).await?)
    }

    /// Preconditions shared by enroll and update, in reporting order:
    /// date, student, course, capacity, duplicate pair.
    async fn check(&self, values: &NewEnrollment, current: Option<&Enrollment>) -> Result<(), LedgerError> {
        let today = (self.today)();
        if !values.date_is_valid(today) {
            return Err(LedgerError::InvalidDate {
                date: values.enrollment_date,
                today,
            });
        }

        if self.students.find_by_id(values.student_id).await?.is_none() {
            return Err(LedgerError::StudentNotFound(values.student_id));
        }
        let course = self
            .courses
            .find_by_id(values.course_id)
            .await?
            .ok_or(LedgerError::CourseNotFound(values.course_id))?;

        let joins_course = current.is_none_or(|c| c.course_id != values.course_id);
        if joins_course {
            self.check_capacity(&course).await?;
        }

        if let Some(existing) = self.enrollments.find_by_pair(values.student_id, values.course_id).await? {
            if current.is_none_or(|c| c.id != existing.id) {
                return Err(LedgerError::AlreadyEnrolled {
                    student_id: values.student_id,
                    course_id: values.course_id,
                });
            }
        }
        Ok(())
    }

    async fn check_capacity(&self, course: &Course) -> Result<(), LedgerError> {
        if self.capacity == CapacityPolicy::Unbounded {
            return Ok(());
        }
        let enrolled = self.enrollments.count_by_course(course.id).await?;
        if !self.capacity.admits(enrolled, course.max_students) {
            warn!(course_id = %course.id, enrolled, max = course.max_students, "course is full");
            return Err(LedgerError::CourseFull(course.id));
        }
        Ok(())
    }

    async fn ensure_owner(&self, caller: &Principal, student_id: StudentId) -> Result<(), LedgerError> {
        let student = self
            .students
            .find_by_id(student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;
        if !student.is_owned_by(caller.account_id) {
            warn!(account_id = %caller.account_id, student_id = %student_id, "caller does not own student profile");
            return Err(LedgerError::Forbidden("student profile belongs to another account"));
        }
        Ok(())
    }
}

fn duplicate_or_store(err: StoreError, values: &NewEnrollment) -> LedgerError {
    match err {
        StoreError::UniqueViolation(_) => LedgerError::AlreadyEnrolled {
            student_id: values.student_id,
            course_id: values.course_id,
        },
        other => LedgerError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_auth::{AccountDraft, PasswordHash, RoleSet};
    use learnhub_core::AccountId;
    use learnhub_learning::{NewCourse, NewInstructor, NewStudent};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    async fn fixture(
        students: usize,
        courses: usize,
        max_students: i32,
        capacity: CapacityPolicy,
    ) -> (Stores, EnrollmentLedger) {
        let stores = Stores::in_memory();
        for n in 1..=students {
            stores
                .students
                .insert(NewStudent::new(&format!("Student {n}"), &format!("s{n}@example.com"), None))
                .await
                .unwrap();
        }
        let instructor = stores
            .instructors
            .insert(NewInstructor::new("Grace Hopper", "grace@example.com", "Compilers", None))
            .await
            .unwrap();
        for n in 1..=courses {
            stores
                .courses
                .insert(NewCourse {
                    name: format!("Course {n}"),
                    description: "A course used by ledger tests.".into(),
                    instructor_id: instructor.id,
                    start_date: date(2024, 1, 1),
                    end_date: date(2024, 12, 31),
                    max_students,
                    price_cents: 0,
                    category: "Testing".into(),
                })
                .await
                .unwrap();
        }
        let ledger = EnrollmentLedger::new(&stores, capacity).with_clock(today);
        (stores, ledger)
    }

    fn enrollment(student: i64, course: i64, on: NaiveDate) -> NewEnrollment {
        NewEnrollment::new(StudentId::new(student), CourseId::new(course), on)
    }

    #[tokio::test]
    async fn enroll_student_seven_in_course_three() {
        let (_, ledger) = fixture(7, 3, 30, CapacityPolicy::Unbounded).await;

        let e = ledger.enroll(enrollment(7, 3, date(2024, 1, 1))).await.unwrap();
        assert_eq!(e.student_id, StudentId::new(7));
        assert_eq!(e.course_id, CourseId::new(3));
        assert_eq!(e.enrollment_date, date(2024, 1, 1));

        assert_eq!(
            ledger.enroll(enrollment(7, 3, date(2024, 1, 1))).await,
            Err(LedgerError::AlreadyEnrolled {
                student_id: StudentId::new(7),
                course_id: CourseId::new(3)
            })
        );
        assert_eq!(ledger.list_by_course(CourseId::new(3)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn future_dates_are_rejected_today_is_fine() {
        let (_, ledger) = fixture(1, 1, 30, CapacityPolicy::Unbounded).await;
        assert!(matches!(
            ledger.enroll(enrollment(1, 1, date(2024, 6, 2))).await,
            Err(LedgerError::InvalidDate { .. })
        ));
        assert!(ledger.enroll(enrollment(1, 1, today())).await.is_ok());
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let (_, ledger) = fixture(1, 1, 30, CapacityPolicy::Unbounded).await;
        assert_eq!(
            ledger.enroll(enrollment(9, 1, today())).await,
            Err(LedgerError::StudentNotFound(StudentId::new(9)))
        );
        assert_eq!(
            ledger.enroll(enrollment(1, 9, today())).await,
            Err(LedgerError::CourseNotFound(CourseId::new(9)))
        );
        assert_eq!(
            ledger.unenroll(EnrollmentId::new(5)).await,
            Err(LedgerError::EnrollmentNotFound(EnrollmentId::new(5)))
        );
    }

    #[tokio::test]
    async fn capacity_is_enforced_only_when_configured() {
        let (_, bounded) = fixture(3, 1, 2, CapacityPolicy::CourseMaximum).await;
        bounded.enroll(enrollment(1, 1, today())).await.unwrap();
        bounded.enroll(enrollment(2, 1, today())).await.unwrap();
        assert_eq!(
            bounded.enroll(enrollment(3, 1, today())).await,
            Err(LedgerError::CourseFull(CourseId::new(1)))
        );

        let (_, unbounded) = fixture(3, 1, 2, CapacityPolicy::Unbounded).await;
        for s in 1..=3 {
            unbounded.enroll(enrollment(s, 1, today())).await.unwrap();
        }
        assert_eq!(unbounded.count_by_course(CourseId::new(1)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn update_rechecks_the_pair() {
        let (_, ledger) = fixture(2, 2, 30, CapacityPolicy::Unbounded).await;
        ledger.enroll(enrollment(1, 1, today())).await.unwrap();
        let second = ledger.enroll(enrollment(2, 1, today())).await.unwrap();

        assert!(matches!(
            ledger.update(second.id, enrollment(1, 1, today())).await,
            Err(LedgerError::AlreadyEnrolled { .. })
        ));

        // Re-dating an enrollment in place is not a duplicate of itself.
        let redated = ledger.update(second.id, enrollment(2, 1, date(2024, 2, 2))).await.unwrap();
        assert_eq!(redated.enrollment_date, date(2024, 2, 2));

        let moved = ledger.update(second.id, enrollment(2, 2, today())).await.unwrap();
        assert_eq!(moved.course_id, CourseId::new(2));
        assert!(matches!(
            ledger.update(EnrollmentId::new(99), enrollment(2, 2, today())).await,
            Err(LedgerError::EnrollmentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_duplicate_enrollments_leave_one_row() {
        let (stores, ledger) = fixture(1, 1, 30, CapacityPolicy::Unbounded).await;
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.enroll(enrollment(1, 1, today())).await }));
        }
        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LedgerError::AlreadyEnrolled { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(stores.enrollments.list().await.unwrap().len(), 1);
    }

    async fn owned_fixture() -> (Stores, EnrollmentLedger, Principal, Principal) {
        let (stores, ledger) = fixture(0, 1, 30, CapacityPolicy::Unbounded).await;
        // Account rows are needed for the students' foreign key.
        let mut owners = Vec::new();
        for email in ["owner@example.com", "other@example.com"] {
            let account = stores
                .accounts
                .save(AccountDraft::new(
                    "someone",
                    email,
                    PasswordHash::from_stored("$2b$04$x".into()),
                    RoleSet::single(Role::User),
                ))
                .await
                .unwrap();
            stores
                .students
                .insert(NewStudent::new("Some One", email, Some(account.id)))
                .await
                .unwrap();
            owners.push(Principal::new(account.id, RoleSet::single(Role::User)));
        }
        let other = owners.pop().unwrap();
        let owner = owners.pop().unwrap();
        (stores, ledger, owner, other)
    }

    #[tokio::test]
    async fn users_may_only_enroll_themselves() {
        let (_, ledger, owner, other) = owned_fixture().await;

        let e = ledger.enroll_as(&owner, enrollment(1, 1, today())).await.unwrap();
        assert_eq!(
            ledger.enroll_as(&other, enrollment(1, 1, today())).await,
            Err(LedgerError::Forbidden("student profile belongs to another account"))
        );

        let admin = Principal::new(AccountId::new(777), RoleSet::single(Role::Admin));
        ledger.enroll_as(&admin, enrollment(2, 1, today())).await.unwrap();

        let instructor = Principal::new(AccountId::new(888), RoleSet::single(Role::Instructor));
        assert!(matches!(
            ledger.enroll_as(&instructor, enrollment(2, 1, today())).await,
            Err(LedgerError::Forbidden(_))
        ));

        assert!(matches!(
            ledger.unenroll_as(&other, e.id).await,
            Err(LedgerError::Forbidden(_))
        ));
        ledger.unenroll_as(&owner, e.id).await.unwrap();
        assert!(ledger.list_by_student(StudentId::new(1)).await.unwrap().is_empty());
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig {
            cases: 32,
            ..proptest::prelude::ProptestConfig::default()
        })]

        /// Property: an enforcing ledger admits exactly `min(attempts, max_students)`.
        #[test]
        fn enforced_capacity_caps_enrollments(max_students in 1i32..6, attempts in 0usize..9) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (admitted, full) = runtime.block_on(async {
                let (_, ledger) = fixture(attempts, 1, max_students, CapacityPolicy::CourseMaximum).await;
                let mut admitted = 0usize;
                let mut full = 0usize;
                for student in 1..=attempts as i64 {
                    match ledger.enroll(enrollment(student, 1, today())).await {
                        Ok(_) => admitted += 1,
                        Err(LedgerError::CourseFull(_)) => full += 1,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                (admitted, full)
            });
            proptest::prop_assert_eq!(admitted, attempts.min(max_students as usize));
            proptest::prop_assert_eq!(admitted + full, attempts);
        }
    }
}
