//! Administrative endpoints (ADMIN role).

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::{JsonRejection, PathRejection}},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use learnhub_auth::AccountView;
use learnhub_core::AccountId;
use learnhub_infra::Promotion;
use learnhub_learning::Instructor;

use crate::app::dto::{AssignRolesRequest, Items, PromoteInstructorRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/admin/accounts", get(list_accounts))
        .route("/api/admin/accounts/:id/roles", put(assign_roles))
        .route("/api/admin/instructors", post(promote_instructor))
}

pub async fn list_accounts(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Items<AccountView>>> {
    let items = services
        .accounts
        .list_accounts()
        .await?
        .iter()
        .map(AccountView::from)
        .collect();
    Ok(Json(Items::new(items)))
}

pub async fn assign_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<PrincipalContext>,
    path: Result<Path<AccountId>, PathRejection>,
    body: Result<Json<AssignRolesRequest>, JsonRejection>,
) -> ApiResult<Json<AccountView>> {
    let Path(id) = path?;
    let Json(body) = body?;
    let account = services.accounts.assign_roles(id, body.roles).await?;
    tracing::info!(admin = %admin.account_id(), account_id = %id, "account roles changed by admin");
    Ok(Json(AccountView::from(&account)))
}

pub async fn promote_instructor(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<PromoteInstructorRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Instructor>)> {
    let Json(body) = body?;
    let instructor = services
        .profiles
        .promote_to_instructor(Promotion {
            account_id: body.account_id,
            name: body.name,
            specialization: body.specialization,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(instructor)))
}
