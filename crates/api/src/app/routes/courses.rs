use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use learnhub_core::CourseId;
use learnhub_learning::{Course, Enrollment, NewCourse};

use crate::app::dto::Items;
use crate::context::PrincipalContext;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/api/courses", post(create_course).get(list_courses))
        .route("/api/courses/:id", get(get_course))
        .route("/api/courses/:id/enrollments", get(list_course_enrollments))
}

pub async fn create_course(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<PrincipalContext>,
    body: Result<Json<NewCourse>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let Json(body) = body?;
    let course = services.catalog.create_as(caller.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn list_courses(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Items<Course>>> {
    Ok(Json(Items::new(services.catalog.list().await?)))
}

pub async fn get_course(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<CourseId>, PathRejection>,
) -> ApiResult<Json<Course>> {
    let Path(id) = path?;
    Ok(Json(services.catalog.get(id).await?))
}

pub async fn list_course_enrollments(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<CourseId>, PathRejection>,
) -> ApiResult<Json<Items<Enrollment>>> {
    let Path(id) = path?;
    services.catalog.get(id).await?;
    Ok(Json(Items::new(services.ledger.list_by_course(id).await?)))
}
