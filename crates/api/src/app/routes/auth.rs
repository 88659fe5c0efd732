use std::sync::Arc;

use axum::{
    extract::{Extension, rejection::JsonRejection},
    routing::{get, post},
    Json, Router,
};
use axum::http::StatusCode;

use learnhub_auth::AccountView;

use crate::app::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(body) = body?;
    let session = services.accounts.register(body.into()).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(body) = body?;
    let session = services.accounts.login(&body.email, &body.password).await?;
    Ok(Json(session.into()))
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<AccountView>> {
    let account = services.accounts.account(principal.account_id()).await?;
    Ok(Json(AccountView::from(&account)))
}
