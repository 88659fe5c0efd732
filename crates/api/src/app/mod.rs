//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: the application services every handler shares
//! - `policy.rs`: access policy per route
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use thiserror::Error;
use tower::ServiceBuilder;

use learnhub_auth::{AuthorizationGate, TokenService};
use learnhub_infra::{AccountRoles, AppConfig, PostgresStore, StoreError, Stores, seed_roles};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod policy;
pub mod routes;
pub mod services;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("storage initialization failed: {0}")]
    Store(#[from] StoreError),
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Uses PostgreSQL when `DATABASE_URL` is configured and the in-memory
/// backend otherwise.
pub async fn build_app(config: &AppConfig) -> Result<Router, StartupError> {
    let stores = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.apply_schema().await?;
            tracing::info!("using postgres storage");
            Stores::from_backend(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            Stores::in_memory()
        }
    };
    build_app_with(stores, config).await
}

/// Build the router over already-constructed stores.
pub async fn build_app_with(stores: Stores, config: &AppConfig) -> Result<Router, StartupError> {
    let roles = seed_roles(stores.roles.as_ref()).await?;
    tracing::info!(count = roles.len(), "roles seeded");

    let tokens = Arc::new(TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl));
    let gate = AuthorizationGate::new(
        tokens.clone(),
        policy::policy_table(),
        AccountRoles(stores.accounts.clone()),
    );
    let auth_state = middleware::AuthState { gate: Arc::new(gate) };
    let services = Arc::new(services::AppServices::new(&stores, tokens, config));

    // The gate only wraps matched routes; /health stays outside it.
    let gated = routes::router()
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .layer(ServiceBuilder::new().layer(Extension(services)));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(gated))
}
