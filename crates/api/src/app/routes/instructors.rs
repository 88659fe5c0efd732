use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::PathRejection},
    routing::get,
    Json, Router,
};

use learnhub_core::InstructorId;
use learnhub_learning::{Course, Instructor};

use crate::app::dto::Items;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/api/instructors", get(list_instructors))
        .route("/api/instructors/:id", get(get_instructor))
        .route("/api/instructors/:id/courses", get(list_instructor_courses))
}

pub async fn list_instructors(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Items<Instructor>>> {
    Ok(Json(Items::new(services.profiles.list_instructors().await?)))
}

pub async fn get_instructor(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<InstructorId>, PathRejection>,
) -> ApiResult<Json<Instructor>> {
    let Path(id) = path?;
    Ok(Json(services.profiles.instructor(id).await?))
}

pub async fn list_instructor_courses(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<InstructorId>, PathRejection>,
) -> ApiResult<Json<Items<Course>>> {
    let Path(id) = path?;
    services.profiles.instructor(id).await?;
    Ok(Json(Items::new(services.catalog.list_by_instructor(id).await?)))
}
