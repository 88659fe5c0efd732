//! Enrollment endpoints. Writes go through the ledger, which owns the date,
//! existence, capacity and uniqueness rules.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use learnhub_core::{EnrollmentId, StudentId};
use learnhub_learning::Enrollment;

use crate::app::dto::{EnrollRequest, Items, UpdateEnrollmentRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/enrollments", post(enroll).get(list_enrollments))
        .route(
            "/api/enrollments/:id",
            get(get_enrollment).put(update_enrollment).delete(delete_enrollment),
        )
        .route("/api/enrollments/student/:student_id", get(list_student_enrollments))
}

pub async fn enroll(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<PrincipalContext>,
    body: Result<Json<EnrollRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let Json(body) = body?;
    let values = body.into_values(Utc::now().date_naive());
    let enrollment = services.ledger.enroll_as(caller.principal(), values).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn list_enrollments(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Items<Enrollment>>> {
    Ok(Json(Items::new(services.ledger.list().await?)))
}

pub async fn get_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<EnrollmentId>, PathRejection>,
) -> ApiResult<Json<Enrollment>> {
    let Path(id) = path?;
    Ok(Json(services.ledger.get(id).await?))
}

pub async fn update_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<EnrollmentId>, PathRejection>,
    body: Result<Json<UpdateEnrollmentRequest>, JsonRejection>,
) -> ApiResult<Json<Enrollment>> {
    let Path(id) = path?;
    let Json(body) = body?;
    Ok(Json(services.ledger.update(id, body.into()).await?))
}

pub async fn delete_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<PrincipalContext>,
    path: Result<Path<EnrollmentId>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    services.ledger.unenroll_as(caller.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_student_enrollments(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<StudentId>, PathRejection>,
) -> ApiResult<Json<Items<Enrollment>>> {
    let Path(student_id) = path?;
    Ok(Json(Items::new(services.ledger.list_by_student(student_id).await?)))
}
