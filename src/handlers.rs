use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, AppResult},
    models::{
        CreatePostRequest, DatabaseTimeResponse, HealthResponse, MessageResponse, PostEnvelope,
        PostListResponse, UpdatePostRequest,
    },
    policy,
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use uuid::Uuid;

// --- Extraction Helpers ---

/// A malformed id cannot name a stored post, so it is reported the same way
/// as an id that was never issued.
fn post_id(id: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    id.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!("unparseable post id: {}", rejection);
        AppError::NotFound
    })
}

/// Every update field is optional, so a request without a JSON body is an
/// empty update. A body that is present but unreadable is a validation error.
fn update_payload(
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> AppResult<UpdatePostRequest> {
    match payload {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(UpdatePostRequest::default()),
        Err(rejection) => {
            tracing::debug!("invalid update body: {}", rejection);
            Err(AppError::ValidationFailed("invalid update payload".to_string()))
        }
    }
}

// --- Handlers ---

/// create_post
///
/// [Authenticated Route] Creates a post owned by the caller.
///
/// `author_id` always comes from the resolved identity, never from the body.
/// `is_paid` defaults to `false` when omitted.
#[utoipa::path(
    post,
    path = "/api/posts/create",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = PostEnvelope),
        (status = 400, description = "Missing title or content", body = MessageResponse),
        (status = 401, description = "Authentication required", body = MessageResponse)
    )
)]
pub async fn create_post(
    AuthUser { id: author_id, .. }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PostEnvelope>)> {
    // A missing or mistyped body is reported like missing fields.
    let new_post = payload
        .ok()
        .and_then(|Json(req)| req.into_new_post(author_id))
        .ok_or_else(|| AppError::ValidationFailed("title and content are required".to_string()))?;

    let post = state
        .repo
        .insert_post(new_post)
        .await
        .map_err(|e| AppError::storage("creating post", e))?;

    tracing::info!(post_id = %post.id, author_id = %author_id, is_paid = post.is_paid, "post created");

    Ok((
        StatusCode::CREATED,
        Json(PostEnvelope {
            message: Some("Post created successfully".to_string()),
            post,
        }),
    ))
}

/// get_all_posts
///
/// [Public Route] Lists every post, newest first.
///
/// Paid posts the caller cannot read are still listed with their metadata,
/// but `content` is replaced by the subscriber placeholder.
#[utoipa::path(
    get,
    path = "/api/posts",
    responses(
        (status = 200, description = "All posts, paid content redacted per caller", body = PostListResponse),
        (status = 500, description = "Storage failure", body = MessageResponse)
    )
)]
pub async fn get_all_posts(
    OptionalAuthUser(identity): OptionalAuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<PostListResponse>> {
    let posts = state
        .repo
        .list_posts()
        .await
        .map_err(|e| AppError::storage("listing posts", e))?;

    let posts = posts
        .into_iter()
        .map(|post| policy::redact_for_listing(identity.as_ref(), post))
        .collect();

    Ok(Json(PostListResponse { posts }))
}

/// get_post_by_id
///
/// [Public Route] Fetches a single post.
///
/// Unlike the listing, a paid post the caller cannot read is not returned at
/// all: the response is a 403 with the placeholder message.
#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostEnvelope),
        (status = 403, description = "Paid content", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_post_by_id(
    OptionalAuthUser(identity): OptionalAuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<PostEnvelope>> {
    let id = post_id(id)?;
    let post = state
        .repo
        .find_post(id)
        .await
        .map_err(|e| AppError::storage("fetching post", e))?
        .ok_or(AppError::NotFound)?;

    if !policy::can_view_full_content(identity.as_ref(), &post) {
        return Err(AppError::AccessDenied);
    }

    Ok(Json(PostEnvelope { message: None, post }))
}

/// update_post
///
/// [Authenticated Route] Partially updates a post.
///
/// Existence is checked before ownership, so a missing post is a 404 for
/// every caller. Only the author or an admin gets past the 403, and only
/// then is an unreadable body reported.
#[utoipa::path(
    put,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = PostEnvelope),
        (status = 403, description = "Not author or admin", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> AppResult<Json<PostEnvelope>> {
    let id = post_id(id)?;
    let payload = update_payload(payload);

    let existing = state
        .repo
        .find_post(id)
        .await
        .map_err(|e| AppError::storage("updating post", e))?
        .ok_or(AppError::NotFound)?;

    if !policy::can_mutate(&user, &existing) {
        tracing::warn!(post_id = %id, user_id = %user.id, "update refused: not author or admin");
        return Err(AppError::NotAuthorized);
    }

    let post = state
        .repo
        .update_post(id, payload?)
        .await
        .map_err(|e| AppError::storage("updating post", e))?;

    Ok(Json(PostEnvelope {
        message: Some("Post updated".to_string()),
        post,
    }))
}

/// delete_post
///
/// [Authenticated Route] Permanently removes a post. Same ordering as
/// `update_post`: 404 first, then 403.
#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not author or admin", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let id = post_id(id)?;
    let existing = state
        .repo
        .find_post(id)
        .await
        .map_err(|e| AppError::storage("deleting post", e))?
        .ok_or(AppError::NotFound)?;

    if !policy::can_mutate(&user, &existing) {
        tracing::warn!(post_id = %id, user_id = %user.id, "delete refused: not author or admin");
        return Err(AppError::NotAuthorized);
    }

    state
        .repo
        .delete_post(id)
        .await
        .map_err(|e| AppError::storage("deleting post", e))?;

    tracing::info!(post_id = %id, user_id = %user.id, "post deleted");

    Ok(Json(MessageResponse {
        message: "Post deleted".to_string(),
    }))
}

/// health_check
///
/// [Public Route] Liveness probe. Does not touch storage.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

/// database_check
///
/// [Public Route] One storage round trip, returning the database clock.
#[utoipa::path(
    get,
    path = "/db-test",
    responses(
        (status = 200, description = "Database reachable", body = DatabaseTimeResponse),
        (status = 500, description = "Storage failure", body = MessageResponse)
    )
)]
pub async fn database_check(State(state): State<AppState>) -> AppResult<Json<DatabaseTimeResponse>> {
    let now = state
        .repo
        .database_time()
        .await
        .map_err(|e| AppError::storage("checking database", e))?;

    Ok(Json(DatabaseTimeResponse { now }))
}
