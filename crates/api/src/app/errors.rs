//! Mapping from service errors to consistent JSON error responses.
//!
//! Every error body has the shape `{"error": <code>, "message": <text>}`;
//! validation failures add a `fields` map. Infrastructure failures are logged
//! in full and answered with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use learnhub_auth::{AuthzError, UnauthorizedReason};
use learnhub_core::DomainError;
use learnhub_infra::{AccountError, LedgerError, ProfileError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Account(e) => account_error(e),
            ApiError::Ledger(e) => ledger_error(e),
            ApiError::Profile(e) => profile_error(e),
            ApiError::Authz(e) => authz_error(e),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
        }
    }
}

fn account_error(err: AccountError) -> Response {
    match err {
        AccountError::Validation(e) => domain_error(e),
        AccountError::EmailInUse => json_error(StatusCode::CONFLICT, "email_in_use", err.to_string()),
        AccountError::RoleNotFound(_) => json_error(StatusCode::BAD_REQUEST, "role_not_found", err.to_string()),
        AccountError::RoleNotSelectable(_) => {
            json_error(StatusCode::FORBIDDEN, "role_not_selectable", err.to_string())
        }
        AccountError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
        }
        AccountError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        AccountError::Store(_) | AccountError::Password(_) | AccountError::Token(_) | AccountError::Blocking(_) => {
            internal(&err)
        }
    }
}

fn ledger_error(err: LedgerError) -> Response {
    match err {
        LedgerError::InvalidDate { .. } => json_error(StatusCode::BAD_REQUEST, "invalid_date", err.to_string()),
        LedgerError::StudentNotFound(_) | LedgerError::CourseNotFound(_) | LedgerError::EnrollmentNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        LedgerError::CourseFull(_) => json_error(StatusCode::CONFLICT, "course_full", err.to_string()),
        LedgerError::AlreadyEnrolled { .. } => {
            json_error(StatusCode::CONFLICT, "already_enrolled", err.to_string())
        }
        LedgerError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        LedgerError::Store(_) => internal(&err),
    }
}

fn profile_error(err: ProfileError) -> Response {
    match err {
        ProfileError::Validation(e) => domain_error(e),
        ProfileError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ProfileError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ProfileError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        ProfileError::Store(_) => internal(&err),
    }
}

fn authz_error(err: AuthzError) -> Response {
    match err {
        AuthzError::Unauthorized(reason) => {
            tracing::debug!(%reason, "request rejected as unauthorized");
            let message = match reason {
                UnauthorizedReason::MissingToken => "authentication required",
                UnauthorizedReason::Token(_) | UnauthorizedReason::UnknownAccount => "invalid or expired token",
            };
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
        }
        AuthzError::Forbidden { .. } => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
        AuthzError::RoleLookup(_) => internal(&err),
    }
}

fn domain_error(err: DomainError) -> Response {
    match err {
        DomainError::InvalidFields(fields) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "validation_error",
                "message": "validation failed",
                "fields": fields,
            })),
        )
            .into_response(),
        DomainError::Validation(msg) | DomainError::InvariantViolation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

fn internal(err: &dyn std::error::Error) -> Response {
    tracing::error!(error = %err, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
