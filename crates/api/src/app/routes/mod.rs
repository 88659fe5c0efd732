use axum::Router;

pub mod admin;
pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod instructors;
pub mod roles;
pub mod students;
pub mod system;

/// Every gated endpoint. Paths are spelled out in full so that the matched
/// route pattern doubles as the policy key.
pub fn router() -> Router {
    Router::new()
        .merge(auth::router())
        .merge(roles::router())
        .merge(admin::router())
        .merge(students::router())
        .merge(instructors::router())
        .merge(courses::router())
        .merge(enrollments::router())
}
