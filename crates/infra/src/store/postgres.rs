//! Postgres-backed implementation of every store seam.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation(constraint)` |
//! | Database (foreign key violation) | `23503` | `ForeignKey(constraint)` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |
//!
//! The pool is `Send + Sync`; `PostgresStore` is cheap to clone.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use async_trait::async_trait;
use learnhub_auth::{Account, AccountDraft, PasswordHash, Role, RoleSet};
use learnhub_core::{AccountId, CourseId, EnrollmentId, InstructorId, RoleId, StudentId};
use learnhub_learning::{Course, Enrollment, Instructor, NewCourse, NewEnrollment, NewInstructor, NewStudent, Student};

use super::{
    AccountStore, CourseStore, EnrollmentStore, InstructorStore, RoleRecord, RoleStore, StoreError, StoreResult,
    StudentStore,
};

const SCHEMA: &str = include_str!("schema.sql");

const ACCOUNT_SELECT: &str = r#"
    SELECT
        a.id,
        a.username,
        a.email,
        a.password_hash,
        a.created_at,
        COALESCE(array_agg(r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles
    FROM accounts a
    LEFT JOIN account_roles ar ON ar.account_id = a.id
    LEFT JOIN roles r ON r.id = ar.role_id
"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes. Safe to run on every startup.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_account(&self, filter: &str, bind: AccountFilter<'_>) -> StoreResult<Option<Account>> {
        let sql = format!("{ACCOUNT_SELECT} WHERE {filter} GROUP BY a.id");
        let query = sqlx::query(&sql);
        let query = match bind {
            AccountFilter::Id(id) => query.bind(id.get()),
            AccountFilter::Email(email) => query.bind(email),
        };
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_account", e))?;
        row.as_ref().map(account_from_row).transpose()
    }
}

enum AccountFilter<'a> {
    Id(AccountId),
    Email(&'a str),
}

#[async_trait]
impl AccountStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.fetch_account("a.email = $1", AccountFilter::Email(email)).await
    }

    #[instrument(skip(self), err)]
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM accounts WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_by_email", e))
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.fetch_account("a.id = $1", AccountFilter::Id(id)).await
    }

    #[instrument(skip(self, draft), fields(account_id = ?draft.id), err)]
    async fn save(&self, draft: AccountDraft) -> StoreResult<Account> {
        draft.ensure_roles().map_err(|e| StoreError::Invariant(e.to_string()))?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let (id, created_at): (i64, DateTime<Utc>) = match draft.id {
            None => sqlx::query_as(
                "INSERT INTO accounts (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id, created_at",
            )
            .bind(&draft.username)
            .bind(&draft.email)
            .bind(draft.password_hash.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_account", e))?,
            Some(id) => sqlx::query_as(
                "UPDATE accounts SET username = $2, email = $3, password_hash = $4 WHERE id = $1 RETURNING id, created_at",
            )
            .bind(id.get())
            .bind(&draft.username)
            .bind(&draft.email)
            .bind(draft.password_hash.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_account", e))?
            .ok_or_else(|| StoreError::Backend(format!("account {id} does not exist")))?,
        };

        sqlx::query("DELETE FROM account_roles WHERE account_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_account_roles", e))?;

        let names: Vec<String> = draft.roles.names().into_iter().map(str::to_string).collect();
        let inserted = sqlx::query(
            "INSERT INTO account_roles (account_id, role_id) SELECT $1, id FROM roles WHERE name = ANY($2)",
        )
        .bind(id)
        .bind(&names)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account_roles", e))?;

        if inserted.rows_affected() != names.len() as u64 {
            return Err(StoreError::Backend(format!(
                "roles {names:?} are not all seeded"
            )));
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(Account {
            id: AccountId::new(id),
            username: draft.username,
            email: draft.email,
            password_hash: draft.password_hash,
            roles: draft.roles,
            created_at,
        })
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn roles_of(&self, id: AccountId) -> StoreResult<Option<RoleSet>> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(array_agg(r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles
            FROM accounts a
            LEFT JOIN account_roles ar ON ar.account_id = a.id
            LEFT JOIN roles r ON r.id = ar.role_id
            WHERE a.id = $1
            GROUP BY a.id
            "#,
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_of", e))?;

        row.map(|r| {
            let names: Vec<String> = r.try_get("roles").map_err(|e| map_sqlx_error("roles_of", e))?;
            parse_roles(&names)
        })
        .transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> StoreResult<Vec<Account>> {
        let sql = format!("{ACCOUNT_SELECT} GROUP BY a.id ORDER BY a.id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;
        rows.iter().map(account_from_row).collect()
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    #[instrument(skip(self), fields(role = %role), err)]
    async fn find_or_create(&self, role: Role) -> StoreResult<RoleRecord> {
        sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?;

        let row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("select_role", e))?;
        role_from_row(&row)
    }

    async fn find_by_id(&self, id: RoleId) -> StoreResult<Option<RoleRecord>> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_id", e))?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn find_by_name(&self, role: Role) -> StoreResult<Option<RoleRecord>> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_name", e))?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<RoleRecord>> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter().map(role_from_row).collect()
    }
}

#[async_trait]
impl StudentStore for PostgresStore {
    #[instrument(skip(self, student), err)]
    async fn insert(&self, student: NewStudent) -> StoreResult<Student> {
        let row = sqlx::query(
            r#"
            INSERT INTO students (name, email, account_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, account_id, created_at
            "#,
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(student.account_id.map(AccountId::get))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_student", e))?;
        Ok(decode::<StudentRow>(&row)?.into())
    }

    async fn find_by_id(&self, id: StudentId) -> StoreResult<Option<Student>> {
        self.fetch_student("id = $1", id.get()).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Student>> {
        let row = sqlx::query("SELECT id, name, email, account_id, created_at FROM students WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_student_by_email", e))?;
        Ok(row.map(|r| decode::<StudentRow>(&r)).transpose()?.map(Into::into))
    }

    async fn find_by_account(&self, account_id: AccountId) -> StoreResult<Option<Student>> {
        self.fetch_student("account_id = $1", account_id.get()).await
    }

    #[instrument(skip(self), err)]
    async fn link_account(&self, id: StudentId, account_id: AccountId) -> StoreResult<Option<Student>> {
        let row = sqlx::query(
            r#"
            UPDATE students SET account_id = $2
            WHERE id = $1 AND account_id IS NULL
            RETURNING id, name, email, account_id, created_at
            "#,
        )
        .bind(id.get())
        .bind(account_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("link_student_account", e))?;
        Ok(row.map(|r| decode::<StudentRow>(&r)).transpose()?.map(Into::into))
    }

    async fn list(&self) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query("SELECT id, name, email, account_id, created_at FROM students ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_students", e))?;
        rows.iter().map(|r| decode::<StudentRow>(r).map(Student::from)).collect()
    }
}

impl PostgresStore {
    async fn fetch_student(&self, filter: &str, key: i64) -> StoreResult<Option<Student>> {
        let sql = format!("SELECT id, name, email, account_id, created_at FROM students WHERE {filter} ORDER BY id LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_student", e))?;
        Ok(row.map(|r| decode::<StudentRow>(&r)).transpose()?.map(Into::into))
    }

    async fn fetch_instructors(&self, filter: &str, key: Option<i64>) -> StoreResult<Vec<Instructor>> {
        let sql = format!(
            "SELECT id, name, email, specialization, account_id, created_at FROM instructors {filter} ORDER BY id"
        );
        let mut query = sqlx::query(&sql);
        if let Some(key) = key {
            query = query.bind(key);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_instructors", e))?;
        rows.iter().map(|r| decode::<InstructorRow>(r).map(Instructor::from)).collect()
    }

    async fn fetch_courses(&self, filter: &str, key: Option<i64>) -> StoreResult<Vec<Course>> {
        let sql = format!(
            r#"
            SELECT id, name, description, instructor_id, start_date, end_date,
                   max_students, price_cents, category, created_at
            FROM courses {filter} ORDER BY id
            "#
        );
        let mut query = sqlx::query(&sql);
        if let Some(key) = key {
            query = query.bind(key);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_courses", e))?;
        rows.iter().map(|r| decode::<CourseRow>(r).map(Course::from)).collect()
    }

    async fn fetch_enrollments(&self, filter: &str, keys: &[i64]) -> StoreResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT id, student_id, course_id, enrollment_date FROM enrollments {filter} ORDER BY id"
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(*key);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_enrollments", e))?;
        rows.iter().map(|r| decode::<EnrollmentRow>(r).map(Enrollment::from)).collect()
    }
}

#[async_trait]
impl InstructorStore for PostgresStore {
    #[instrument(skip(self, instructor), err)]
    async fn insert(&self, instructor: NewInstructor) -> StoreResult<Instructor> {
        let row = sqlx::query(
            r#"
            INSERT INTO instructors (name, email, specialization, account_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, specialization, account_id, created_at
            "#,
        )
        .bind(&instructor.name)
        .bind(&instructor.email)
        .bind(&instructor.specialization)
        .bind(instructor.account_id.map(AccountId::get))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_instructor", e))?;
        Ok(decode::<InstructorRow>(&row)?.into())
    }

    async fn find_by_id(&self, id: InstructorId) -> StoreResult<Option<Instructor>> {
        Ok(self.fetch_instructors("WHERE id = $1", Some(id.get())).await?.into_iter().next())
    }

    async fn find_by_account(&self, account_id: AccountId) -> StoreResult<Option<Instructor>> {
        Ok(self
            .fetch_instructors("WHERE account_id = $1", Some(account_id.get()))
            .await?
            .into_iter()
            .next())
    }

    async fn list(&self) -> StoreResult<Vec<Instructor>> {
        self.fetch_instructors("", None).await
    }
}

#[async_trait]
impl CourseStore for PostgresStore {
    #[instrument(skip(self, course), fields(instructor_id = %course.instructor_id), err)]
    async fn insert(&self, course: NewCourse) -> StoreResult<Course> {
        let row = sqlx::query(
            r#"
            INSERT INTO courses
                (name, description, instructor_id, start_date, end_date, max_students, price_cents, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, description, instructor_id, start_date, end_date,
                      max_students, price_cents, category, created_at
            "#,
        )
        .bind(&course.name)
        .bind(&course.description)
        .bind(course.instructor_id.get())
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(course.max_students)
        .bind(course.price_cents)
        .bind(&course.category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_course", e))?;
        Ok(decode::<CourseRow>(&row)?.into())
    }

    async fn find_by_id(&self, id: CourseId) -> StoreResult<Option<Course>> {
        Ok(self.fetch_courses("WHERE id = $1", Some(id.get())).await?.into_iter().next())
    }

    async fn list(&self) -> StoreResult<Vec<Course>> {
        self.fetch_courses("", None).await
    }

    async fn list_by_instructor(&self, instructor_id: InstructorId) -> StoreResult<Vec<Course>> {
        self.fetch_courses("WHERE instructor_id = $1", Some(instructor_id.get())).await
    }
}

#[async_trait]
impl EnrollmentStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn insert(&self, enrollment: NewEnrollment) -> StoreResult<Enrollment> {
        let row = sqlx::query(
            r#"
            INSERT INTO enrollments (student_id, course_id, enrollment_date)
            VALUES ($1, $2, $3)
            RETURNING id, student_id, course_id, enrollment_date
            "#,
        )
        .bind(enrollment.student_id.get())
        .bind(enrollment.course_id.get())
        .bind(enrollment.enrollment_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_enrollment", e))?;
        Ok(decode::<EnrollmentRow>(&row)?.into())
    }

    #[instrument(skip(self), fields(enrollment_id = %id), err)]
    async fn replace(&self, id: EnrollmentId, values: NewEnrollment) -> StoreResult<Option<Enrollment>> {
        let row = sqlx::query(
            r#"
            UPDATE enrollments
            SET student_id = $2, course_id = $3, enrollment_date = $4
            WHERE id = $1
            RETURNING id, student_id, course_id, enrollment_date
            "#,
        )
        .bind(id.get())
        .bind(values.student_id.get())
        .bind(values.course_id.get())
        .bind(values.enrollment_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("replace_enrollment", e))?;
        Ok(row.map(|r| decode::<EnrollmentRow>(&r)).transpose()?.map(Into::into))
    }

    #[instrument(skip(self), fields(enrollment_id = %id), err)]
    async fn delete(&self, id: EnrollmentId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_enrollment", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: EnrollmentId) -> StoreResult<Option<Enrollment>> {
        Ok(self.fetch_enrollments("WHERE id = $1", &[id.get()]).await?.into_iter().next())
    }

    async fn find_by_pair(&self, student_id: StudentId, course_id: CourseId) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .fetch_enrollments(
                "WHERE student_id = $1 AND course_id = $2",
                &[student_id.get(), course_id.get()],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn list(&self) -> StoreResult<Vec<Enrollment>> {
        self.fetch_enrollments("", &[]).await
    }

    async fn list_by_student(&self, student_id: StudentId) -> StoreResult<Vec<Enrollment>> {
        self.fetch_enrollments("WHERE student_id = $1", &[student_id.get()]).await
    }

    async fn list_by_course(&self, course_id: CourseId) -> StoreResult<Vec<Enrollment>> {
        self.fetch_enrollments("WHERE course_id = $1", &[course_id.get()]).await
    }

    async fn count_by_course(&self, course_id: CourseId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
            .bind(course_id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_by_course", e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().map(str::to_string);
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(constraint.unwrap_or(msg)),
                Some("23503") => StoreError::ForeignKey(constraint.unwrap_or(msg)),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn decode<T>(row: &PgRow) -> StoreResult<T>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn account_from_row(row: &PgRow) -> StoreResult<Account> {
    decode::<AccountRow>(row)?.try_into()
}

fn role_from_row(row: &PgRow) -> StoreResult<RoleRecord> {
    decode::<RoleRow>(row)?.try_into()
}

fn parse_roles(names: &[String]) -> StoreResult<RoleSet> {
    names
        .iter()
        .map(|n| n.parse::<Role>().map_err(|e| StoreError::Backend(e.to_string())))
        .collect()
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
            roles: row.try_get("roles")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId::new(row.id),
            username: row.username,
            email: row.email,
            password_hash: PasswordHash::from_stored(row.password_hash),
            roles: parse_roles(&row.roles)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct RoleRow {
    id: i64,
    name: String,
}

impl<'r> FromRow<'r, PgRow> for RoleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RoleRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

impl TryFrom<RoleRow> for RoleRecord {
    type Error = StoreError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(RoleRecord {
            id: RoleId::new(row.id),
            name: row.name.parse().map_err(|e: learnhub_auth::UnknownRole| StoreError::Backend(e.to_string()))?,
        })
    }
}

#[derive(Debug)]
struct StudentRow {
    id: i64,
    name: String,
    email: String,
    account_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for StudentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StudentRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            account_id: row.try_get("account_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: StudentId::new(row.id),
            name: row.name,
            email: row.email,
            account_id: row.account_id.map(AccountId::new),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct InstructorRow {
    id: i64,
    name: String,
    email: String,
    specialization: String,
    account_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InstructorRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InstructorRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            specialization: row.try_get("specialization")?,
            account_id: row.try_get("account_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<InstructorRow> for Instructor {
    fn from(row: InstructorRow) -> Self {
        Instructor {
            id: InstructorId::new(row.id),
            name: row.name,
            email: row.email,
            specialization: row.specialization,
            account_id: row.account_id.map(AccountId::new),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct CourseRow {
    id: i64,
    name: String,
    description: String,
    instructor_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    max_students: i32,
    price_cents: i64,
    category: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for CourseRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CourseRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            instructor_id: row.try_get("instructor_id")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            max_students: row.try_get("max_students")?,
            price_cents: row.try_get("price_cents")?,
            category: row.try_get("category")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: CourseId::new(row.id),
            name: row.name,
            description: row.description,
            instructor_id: InstructorId::new(row.instructor_id),
            start_date: row.start_date,
            end_date: row.end_date,
            max_students: row.max_students,
            price_cents: row.price_cents,
            category: row.category,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct EnrollmentRow {
    id: i64,
    student_id: i64,
    course_id: i64,
    enrollment_date: NaiveDate,
}

impl<'r> FromRow<'r, PgRow> for EnrollmentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EnrollmentRow {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            course_id: row.try_get("course_id")?,
            enrollment_date: row.try_get("enrollment_date")?,
        })
    }
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Enrollment {
            id: EnrollmentId::new(row.id),
            student_id: StudentId::new(row.student_id),
            course_id: CourseId::new(row.course_id),
            enrollment_date: row.enrollment_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_the_uniqueness_constraints() {
        let flat = SCHEMA.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(flat.contains("email TEXT NOT NULL UNIQUE"));
        assert!(flat.contains("name TEXT NOT NULL UNIQUE"));
        assert!(flat.contains("UNIQUE (student_id, course_id)"));
        assert!(flat.contains("account_id BIGINT UNIQUE REFERENCES accounts (id)"));
    }

    #[test]
    fn schema_is_idempotent() {
        let flat = SCHEMA.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(
            flat.matches("CREATE TABLE").count(),
            flat.matches("CREATE TABLE IF NOT EXISTS").count()
        );
        assert_eq!(
            flat.matches("CREATE INDEX").count(),
            flat.matches("CREATE INDEX IF NOT EXISTS").count()
        );
    }

    #[test]
    fn stored_role_names_parse_leniently() {
        let roles = parse_roles(&["USER".to_string(), "ROLE_ADMIN".to_string()]).unwrap();
        assert!(roles.contains(Role::User));
        assert!(roles.contains(Role::Admin));
        assert!(parse_roles(&["ROOT".to_string()]).is_err());
    }

    #[test]
    fn non_database_errors_map_to_backend() {
        assert_eq!(
            map_sqlx_error("op", sqlx::Error::PoolClosed),
            StoreError::Backend("connection pool closed in op".to_string())
        );
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }
}
