use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without credentials. Read endpoints resolve identity
/// optionally through `OptionalAuthUser`, so a valid token still unlocks paid
/// content while a missing or broken one degrades to an anonymous caller.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Never touches storage.
        .route("/health", get(handlers::health_check))
        // GET /db-test
        // Single storage round trip returning the database clock.
        .route("/db-test", get(handlers::database_check))
        // GET /api/posts (+ trailing-slash and legacy aliases)
        // Lists every post newest-first; paid content is redacted per caller.
        .route("/api/posts", get(handlers::get_all_posts))
        .route("/api/posts/", get(handlers::get_all_posts))
        .route("/api/posts/getAllPosts", get(handlers::get_all_posts))
        // GET /api/posts/{id}
        // Single post; a paid post the caller cannot read is a 403.
        .route("/api/posts/{id}", get(handlers::get_post_by_id))
}
