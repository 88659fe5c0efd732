use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use learnhub_infra::RoleRecord;

use crate::app::dto::Items;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/api/roles", get(list_roles))
}

pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Json<Items<RoleRecord>>> {
    Ok(Json(Items::new(services.accounts.list_roles().await?)))
}
