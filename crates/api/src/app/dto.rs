//! Request/response bodies and their mapping to service inputs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use learnhub_auth::{AccountView, RoleSet};
use learnhub_core::{AccountId, CourseId, RoleId, StudentId};
use learnhub_infra::{Registration, RoleSelector, Session};
use learnhub_learning::NewEnrollment;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Role by identifier; takes precedence over `role`.
    pub role_id: Option<RoleId>,
    /// Role by name, e.g. `"INSTRUCTOR"`.
    pub role: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        let role = match (req.role_id, req.role) {
            (Some(id), _) => Some(RoleSelector::Id(id)),
            (None, Some(name)) if !name.trim().is_empty() => Some(RoleSelector::Name(name)),
            (None, _) => None,
        };
        Registration {
            username: req.username,
            email: req.email,
            password: req.password,
            role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub account: AccountView,
}

impl From<Session> for AuthResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token.token,
            token_type: "Bearer",
            expires_at: session.token.expires_at,
            account: AccountView::from(&session.account),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub roles: RoleSet,
}

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub account_id: Option<AccountId>,
}

#[derive(Debug, Deserialize)]
pub struct PromoteInstructorRequest {
    pub account_id: AccountId,
    pub name: Option<String>,
    #[serde(default)]
    pub specialization: String,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
    /// Defaults to today when omitted.
    pub enrollment_date: Option<NaiveDate>,
}

impl EnrollRequest {
    pub fn into_values(self, today: NaiveDate) -> NewEnrollment {
        NewEnrollment::new(self.student_id, self.course_id, self.enrollment_date.unwrap_or(today))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEnrollmentRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub enrollment_date: NaiveDate,
}

impl From<UpdateEnrollmentRequest> for NewEnrollment {
    fn from(req: UpdateEnrollmentRequest) -> Self {
        NewEnrollment::new(req.student_id, req.course_id, req.enrollment_date)
    }
}

#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(json: serde_json::Value) -> Registration {
        serde_json::from_value::<RegisterRequest>(json).unwrap().into()
    }

    #[test]
    fn role_id_wins_over_role_name() {
        let reg = register(serde_json::json!({
            "username": "alice01", "email": "a@example.com", "password": "secret1",
            "role_id": 2, "role": "ADMIN"
        }));
        assert_eq!(reg.role, Some(RoleSelector::Id(RoleId::new(2))));
    }

    #[test]
    fn blank_role_name_means_default_role() {
        let reg = register(serde_json::json!({
            "username": "alice01", "email": "a@example.com", "password": "secret1", "role": "  "
        }));
        assert_eq!(reg.role, None);
    }

    #[test]
    fn missing_fields_reach_validation_as_empty() {
        let reg = register(serde_json::json!({}));
        assert!(reg.username.is_empty() && reg.email.is_empty() && reg.password.is_empty());
    }

    #[test]
    fn enrollment_date_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let req: EnrollRequest = serde_json::from_value(serde_json::json!({"student_id": 1, "course_id": 2})).unwrap();
        assert_eq!(req.into_values(today).enrollment_date, today);
    }
}
