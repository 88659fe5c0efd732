//! In-memory implementation of every store seam.
//!
//! Backs development mode and tests. All tables live behind one lock, so
//! check-then-insert sequences are atomic exactly like a constrained insert
//! in Postgres.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use learnhub_auth::{Account, AccountDraft, Role, RoleSet};
use learnhub_core::{AccountId, CourseId, EnrollmentId, InstructorId, RoleId, StudentId};
use learnhub_learning::{Course, Enrollment, Instructor, NewCourse, NewEnrollment, NewInstructor, NewStudent, Student};

use super::{
    AccountStore, CourseStore, EnrollmentStore, InstructorStore, RoleRecord, RoleStore, StoreError, StoreResult,
    StudentStore,
};

#[derive(Debug, Default)]
struct Sequences {
    accounts: i64,
    roles: i64,
    students: i64,
    instructors: i64,
    courses: i64,
    enrollments: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct State {
    seq: Sequences,
    accounts: BTreeMap<AccountId, Account>,
    roles: BTreeMap<RoleId, Role>,
    students: BTreeMap<StudentId, Student>,
    instructors: BTreeMap<InstructorId, Instructor>,
    courses: BTreeMap<CourseId, Course>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(self.read()?.accounts.values().any(|a| a.email == email))
    }

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    async fn save(&self, draft: AccountDraft) -> StoreResult<Account> {
        draft.ensure_roles().map_err(|e| StoreError::Invariant(e.to_string()))?;
        let mut state = self.write()?;

        let email_taken = state
            .accounts
            .values()
            .any(|a| a.email == draft.email && Some(a.id) != draft.id);
        if email_taken {
            return Err(StoreError::UniqueViolation("accounts_email_key".to_string()));
        }

        let (id, created_at) = match draft.id {
            Some(id) => match state.accounts.get(&id) {
                Some(existing) => (id, existing.created_at),
                None => return Err(StoreError::Backend(format!("account {id} does not exist"))),
            },
            None => (AccountId::new(next(&mut state.seq.accounts)), Utc::now()),
        };

        let account = Account {
            id,
            username: draft.username,
            email: draft.email,
            password_hash: draft.password_hash,
            roles: draft.roles,
            created_at,
        };
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn roles_of(&self, id: AccountId) -> StoreResult<Option<RoleSet>> {
        Ok(self.read()?.accounts.get(&id).map(|a| a.roles.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<Account>> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn find_or_create(&self, role: Role) -> StoreResult<RoleRecord> {
        let mut state = self.write()?;
        if let Some((id, _)) = state.roles.iter().find(|(_, r)| **r == role) {
            return Ok(RoleRecord { id: *id, name: role });
        }
        let id = RoleId::new(next(&mut state.seq.roles));
        state.roles.insert(id, role);
        Ok(RoleRecord { id, name: role })
    }

    async fn find_by_id(&self, id: RoleId) -> StoreResult<Option<RoleRecord>> {
        Ok(self.read()?.roles.get(&id).map(|name| RoleRecord { id, name: *name }))
    }

    async fn find_by_name(&self, role: Role) -> StoreResult<Option<RoleRecord>> {
        Ok(self
            .read()?
            .roles
            .iter()
            .find(|(_, r)| **r == role)
            .map(|(id, name)| RoleRecord { id: *id, name: *name }))
    }

    async fn list(&self) -> StoreResult<Vec<RoleRecord>> {
        Ok(self
            .read()?
            .roles
            .iter()
            .map(|(id, name)| RoleRecord { id: *id, name: *name })
            .collect())
    }
}

#[async_trait]
impl StudentStore for InMemoryStore {
    async fn insert(&self, student: NewStudent) -> StoreResult<Student> {
        let mut state = self.write()?;
        if state.students.values().any(|s| s.email == student.email) {
            return Err(StoreError::UniqueViolation("students_email_key".to_string()));
        }
        if let Some(account_id) = student.account_id {
            if !state.accounts.contains_key(&account_id) {
                return Err(StoreError::ForeignKey("students_account_id_fkey".to_string()));
            }
        }

        let id = StudentId::new(next(&mut state.seq.students));
        let row = Student {
            id,
            name: student.name,
            email: student.email,
            account_id: student.account_id,
            created_at: Utc::now(),
        };
        state.students.insert(id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: StudentId) -> StoreResult<Option<Student>> {
        Ok(self.read()?.students.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Student>> {
        Ok(self.read()?.students.values().find(|s| s.email == email).cloned())
    }

    async fn find_by_account(&self, account_id: AccountId) -> StoreResult<Option<Student>> {
        Ok(self
            .read()?
            .students
            .values()
            .find(|s| s.account_id == Some(account_id))
            .cloned())
    }

    async fn link_account(&self, id: StudentId, account_id: AccountId) -> StoreResult<Option<Student>> {
        let mut state = self.write()?;
        if !state.accounts.contains_key(&account_id) {
            return Err(StoreError::ForeignKey("students_account_id_fkey".to_string()));
        }
        Ok(state
            .students
            .get_mut(&id)
            .filter(|s| s.account_id.is_none())
            .map(|s| {
                s.account_id = Some(account_id);
                s.clone()
            }))
    }

    async fn list(&self) -> StoreResult<Vec<Student>> {
        Ok(self.read()?.students.values().cloned().collect())
    }
}

#[async_trait]
impl InstructorStore for InMemoryStore {
    async fn insert(&self, instructor: NewInstructor) -> StoreResult<Instructor> {
        let mut state = self.write()?;
        if state.instructors.values().any(|i| i.email == instructor.email) {
            return Err(StoreError::UniqueViolation("instructors_email_key".to_string()));
        }
        if let Some(account_id) = instructor.account_id {
            if !state.accounts.contains_key(&account_id) {
                return Err(StoreError::ForeignKey("instructors_account_id_fkey".to_string()));
            }
            if state.instructors.values().any(|i| i.account_id == Some(account_id)) {
                return Err(StoreError::UniqueViolation("instructors_account_id_key".to_string()));
            }
        }

        let id = InstructorId::new(next(&mut state.seq.instructors));
        let row = Instructor {
            id,
            name: instructor.name,
            email: instructor.email,
            specialization: instructor.specialization,
            account_id: instructor.account_id,
            created_at: Utc::now(),
        };
        state.instructors.insert(id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: InstructorId) -> StoreResult<Option<Instructor>> {
        Ok(self.read()?.instructors.get(&id).cloned())
    }

    async fn find_by_account(&self, account_id: AccountId) -> StoreResult<Option<Instructor>> {
        Ok(self
            .read()?
            .instructors
            .values()
            .find(|i| i.account_id == Some(account_id))
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Instructor>> {
        Ok(self.read()?.instructors.values().cloned().collect())
    }
}

#[async_trait]
impl CourseStore for InMemoryStore {
    async fn insert(&self, course: NewCourse) -> StoreResult<Course> {
        let mut state = self.write()?;
        if !state.instructors.contains_key(&course.instructor_id) {
            return Err(StoreError::ForeignKey("courses_instructor_id_fkey".to_string()));
        }

        let id = CourseId::new(next(&mut state.seq.courses));
        let row = Course {
            id,
            name: course.name,
            description: course.description,
            instructor_id: course.instructor_id,
            start_date: course.start_date,
            end_date: course.end_date,
            max_students: course.max_students,
            price_cents: course.price_cents,
            category: course.category,
            created_at: Utc::now(),
        };
        state.courses.insert(id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: CourseId) -> StoreResult<Option<Course>> {
        Ok(self.read()?.courses.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Course>> {
        Ok(self.read()?.courses.values().cloned().collect())
    }

    async fn list_by_instructor(&self, instructor_id: InstructorId) -> StoreResult<Vec<Course>> {
        Ok(self
            .read()?
            .courses
            .values()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect())
    }
}

impl State {
    /// Foreign keys plus UNIQUE(student_id, course_id), ignoring `except`.
    fn check_enrollment(&self, values: &NewEnrollment, except: Option<EnrollmentId>) -> StoreResult<()> {
        if !self.students.contains_key(&values.student_id) {
            return Err(StoreError::ForeignKey("enrollments_student_id_fkey".to_string()));
        }
        if !self.courses.contains_key(&values.course_id) {
            return Err(StoreError::ForeignKey("enrollments_course_id_fkey".to_string()));
        }
        let duplicate = self.enrollments.values().any(|e| {
            e.student_id == values.student_id && e.course_id == values.course_id && Some(e.id) != except
        });
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "enrollments_student_id_course_id_key".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn insert(&self, enrollment: NewEnrollment) -> StoreResult<Enrollment> {
        let mut state = self.write()?;
        state.check_enrollment(&enrollment, None)?;

        let id = EnrollmentId::new(next(&mut state.seq.enrollments));
        let row = Enrollment {
            id,
            student_id: enrollment.student_id,
            course_id: enrollment.course_id,
            enrollment_date: enrollment.enrollment_date,
        };
        state.enrollments.insert(id, row.clone());
        Ok(row)
    }

    async fn replace(&self, id: EnrollmentId, values: NewEnrollment) -> StoreResult<Option<Enrollment>> {
        let mut state = self.write()?;
        if !state.enrollments.contains_key(&id) {
            return Ok(None);
        }
        state.check_enrollment(&values, Some(id))?;

        let row = Enrollment {
            id,
            student_id: values.student_id,
            course_id: values.course_id,
            enrollment_date: values.enrollment_date,
        };
        state.enrollments.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn delete(&self, id: EnrollmentId) -> StoreResult<bool> {
        Ok(self.write()?.enrollments.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: EnrollmentId) -> StoreResult<Option<Enrollment>> {
        Ok(self.read()?.enrollments.get(&id).cloned())
    }

    async fn find_by_pair(&self, student_id: StudentId, course_id: CourseId) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .read()?
            .enrollments
            .values()
            .find(|e| e.student_id == student_id && e.course_id == course_id)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Enrollment>> {
        Ok(self.read()?.enrollments.values().cloned().collect())
    }

    async fn list_by_student(&self, student_id: StudentId) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .read()?
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn list_by_course(&self, course_id: CourseId) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .read()?
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn count_by_course(&self, course_id: CourseId) -> StoreResult<u64> {
        let count = self
            .read()?
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use learnhub_auth::PasswordHash;

    use crate::store::Stores;

    fn draft(email: &str) -> AccountDraft {
        AccountDraft::new(
            "alice01",
            email,
            PasswordHash::from_stored("$2b$04$hash".to_string()),
            RoleSet::single(Role::User),
        )
    }

    #[tokio::test]
    async fn account_email_is_unique_on_insert_and_update() {
        let stores = Stores::in_memory();
        let a = stores.accounts.save(draft("a@example.com")).await.unwrap();
        stores.accounts.save(draft("b@example.com")).await.unwrap();

        assert_eq!(
            stores.accounts.save(draft("a@example.com")).await,
            Err(StoreError::UniqueViolation("accounts_email_key".to_string()))
        );

        let mut moved = AccountDraft::from(a.clone());
        moved.email = "b@example.com".to_string();
        assert!(matches!(
            stores.accounts.save(moved).await,
            Err(StoreError::UniqueViolation(_))
        ));

        // Re-saving an account under its own email is fine.
        let again = stores.accounts.save(AccountDraft::from(a.clone())).await.unwrap();
        assert_eq!(again.id, a.id);
        assert_eq!(stores.accounts.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ids_are_assigned_and_never_reused() {
        let stores = Stores::in_memory();
        let a = stores.accounts.save(draft("a@example.com")).await.unwrap();
        let b = stores.accounts.save(draft("b@example.com")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn enrollment_pair_is_unique_and_checked_on_replace() {
        let backend = Arc::new(InMemoryStore::new());
        let stores = Stores::from_backend(backend);

        let s1 = stores.students.insert(NewStudent::new("Ada Lovelace", "ada@example.com", None)).await.unwrap();
        let s2 = stores.students.insert(NewStudent::new("Alan Turing", "alan@example.com", None)).await.unwrap();
        let instructor = stores
            .instructors
            .insert(NewInstructor::new("Grace Hopper", "grace@example.com", "Compilers", None))
            .await
            .unwrap();
        let course = stores
            .courses
            .insert(NewCourse {
                name: "Rust 101".into(),
                description: "A first course in Rust.".into(),
                instructor_id: instructor.id,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                max_students: 10,
                price_cents: 0,
                category: "Programming".into(),
            })
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        stores.enrollments.insert(NewEnrollment::new(s1.id, course.id, date)).await.unwrap();
        let second = stores.enrollments.insert(NewEnrollment::new(s2.id, course.id, date)).await.unwrap();

        assert!(matches!(
            stores.enrollments.insert(NewEnrollment::new(s1.id, course.id, date)).await,
            Err(StoreError::UniqueViolation(_))
        ));
        assert!(matches!(
            stores.enrollments.replace(second.id, NewEnrollment::new(s1.id, course.id, date)).await,
            Err(StoreError::UniqueViolation(_))
        ));
        assert_eq!(stores.enrollments.count_by_course(course.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn enrollment_requires_existing_rows() {
        let stores = Stores::in_memory();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            stores
                .enrollments
                .insert(NewEnrollment::new(StudentId::new(1), CourseId::new(1), date))
                .await,
            Err(StoreError::ForeignKey(_))
        ));
    }

    #[tokio::test]
    async fn one_instructor_profile_per_account() {
        let stores = Stores::in_memory();
        let account = stores.accounts.save(draft("g@example.com")).await.unwrap();
        stores
            .instructors
            .insert(NewInstructor::new("Grace Hopper", "g@example.com", "Compilers", Some(account.id)))
            .await
            .unwrap();
        assert_eq!(
            stores
                .instructors
                .insert(NewInstructor::new("Grace Hopper", "g2@example.com", "Compilers", Some(account.id)))
                .await,
            Err(StoreError::UniqueViolation("instructors_account_id_key".to_string()))
        );
    }

    #[tokio::test]
    async fn accounts_without_roles_are_refused() {
        let stores = Stores::in_memory();
        let mut empty = draft("nobody@example.com");
        empty.roles = RoleSet::new();
        assert!(matches!(
            stores.accounts.save(empty).await,
            Err(StoreError::Invariant(_))
        ));
        assert!(stores.accounts.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unlinked_student_can_be_claimed_once() {
        let stores = Stores::in_memory();
        let first = stores.accounts.save(draft("a@example.com")).await.unwrap();
        let second = stores.accounts.save(draft("b@example.com")).await.unwrap();
        let student = stores
            .students
            .insert(NewStudent::new("Ada Lovelace", "ada@example.com", None))
            .await
            .unwrap();

        let linked = stores.students.link_account(student.id, first.id).await.unwrap().unwrap();
        assert_eq!(linked.account_id, Some(first.id));

        assert_eq!(stores.students.link_account(student.id, second.id).await.unwrap(), None);
        assert_eq!(
            stores.students.find_by_account(first.id).await.unwrap().map(|s| s.id),
            Some(student.id)
        );
        assert_eq!(stores.students.link_account(StudentId::new(404), first.id).await.unwrap(), None);
    }
}
