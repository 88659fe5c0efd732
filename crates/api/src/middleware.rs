//! Authorization gate as axum middleware.
//!
//! Installed with `route_layer`, so it only runs for requests that matched a
//! route and `MatchedPath` is always available to build the operation id.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use learnhub_auth::{Access, AuthorizationGate};
use learnhub_infra::AccountRoles;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub gate: Arc<AuthorizationGate<AccountRoles>>,
}

pub async fn auth_middleware(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let operation = operation_id(&req);
    let bearer = extract_bearer(req.headers());

    match state.gate.authorize(&operation, bearer.as_deref()).await {
        Ok(Access::Granted(principal)) => {
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        Ok(Access::Anonymous) => next.run(req).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// `"<METHOD> <route pattern>"`, e.g. `"DELETE /api/enrollments/:id"`.
pub fn operation_id(req: &Request) -> String {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| req.uri().path());
    format!("{} {}", req.method(), path)
}

/// The bearer credential, if an Authorization header is present.
///
/// A header that is not of the `Bearer <token>` form is passed through as-is
/// so that verification rejects it as malformed rather than as missing.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().unwrap_or_default().trim();

    let token = match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => header,
    };
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi".into()));
        assert_eq!(extract_bearer(&headers("bearer  xyz ")), Some("xyz".into()));
    }

    #[test]
    fn absent_header_means_no_token() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn other_schemes_are_passed_through_for_rejection() {
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwYXNz")), Some("Basic dXNlcjpwYXNz".into()));
    }
}
