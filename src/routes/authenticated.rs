use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post, put},
};

/// Authenticated Router Module
///
/// Every mutating post endpoint. The router is wrapped in the authentication
/// middleware in `create_router`, and each handler additionally takes an
/// `AuthUser`, so no request reaches a handler body without an identity.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /api/posts/create (+ legacy /createPost alias)
        // Creates a post authored by the caller.
        .route("/api/posts/create", post(handlers::create_post))
        .route("/api/posts/createPost", post(handlers::create_post))
        // PUT/DELETE /api/posts/{id}
        // Author-or-admin only. Existence is checked before ownership.
        .route(
            "/api/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // Legacy aliases kept for older clients.
        .route("/api/posts/updatepost/{id}", put(handlers::update_post))
        .route("/api/posts/deletepost/{id}", delete(handlers::delete_post))
}
