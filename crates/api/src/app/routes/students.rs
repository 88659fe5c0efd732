use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use learnhub_core::{AccountId, StudentId};
use learnhub_learning::{NewStudent, Student};

use crate::app::dto::{CreateStudentRequest, Items};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/api/students", post(create_student).get(list_students))
        .route("/api/students/:id", get(get_student))
        .route("/api/students/by-account/:account_id", get(get_student_by_account))
}

pub async fn create_student(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateStudentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    let Json(body) = body?;
    let student = services
        .profiles
        .create_student(NewStudent::new(&body.name, &body.email, body.account_id))
        .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn list_students(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Items<Student>>> {
    Ok(Json(Items::new(services.profiles.list_students().await?)))
}

pub async fn get_student(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<StudentId>, PathRejection>,
) -> ApiResult<Json<Student>> {
    let Path(id) = path?;
    Ok(Json(services.profiles.student(id).await?))
}

pub async fn get_student_by_account(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<AccountId>, PathRejection>,
) -> ApiResult<Json<Student>> {
    let Path(account_id) = path?;
    Ok(Json(services.profiles.student_by_account(account_id).await?))
}
