use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity Attributes ---

/// Role
///
/// Closed set of roles a caller can hold. Both policies match on this
/// exhaustively, so adding a variant forces a review of each gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    /// Bypasses both content gating and ownership checks.
    Admin,
    #[default]
    Standard,
}

impl Role {
    /// Maps the stored role column onto the closed enum. Anything that is not
    /// `admin` falls back to the least-privileged variant.
    pub fn from_db(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            return Role::Admin;
        }
        if !value.trim().eq_ignore_ascii_case("standard") && !value.trim().eq_ignore_ascii_case("user") {
            tracing::warn!(role = %value, "unrecognised role, treating as standard");
        }
        Role::Standard
    }
}

/// SubscriptionStatus
///
/// The caller's subscription tier. `Paid` and `Premium` unlock paid posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Paid,
    Premium,
}

impl SubscriptionStatus {
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "paid" => SubscriptionStatus::Paid,
            "premium" => SubscriptionStatus::Premium,
            "free" => SubscriptionStatus::Free,
            other => {
                tracing::warn!(subscription_status = %other, "unrecognised subscription tier, treating as free");
                SubscriptionStatus::Free
            }
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The identity record stored in the `users` table. Only the fields the
/// authorization engine needs are loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub subscription_status: SubscriptionStatus,
}

/// Post
///
/// A blog post row from the `posts` table. Visibility and mutability are
/// never stored here; they are computed per request by `crate::policy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub is_paid: bool,
    // Back-pointer to the creating user. Never changes after insert.
    pub author_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewPost
///
/// A validated create payload, ready for insertion. Built by the create
/// handler once the caller is known and `title`/`content` are present.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub is_paid: bool,
    pub author_id: Uuid,
}

// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for `POST /api/posts/create`. Every field is optional on the
/// wire so that a missing title or content yields our own 400 instead of a
/// deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
}

impl CreatePostRequest {
    /// Returns `None` when `title` or `content` is missing or empty.
    pub fn into_new_post(self, author_id: Uuid) -> Option<NewPost> {
        let title = self.title.filter(|t| !t.is_empty())?;
        let content = self.content.filter(|c| !c.is_empty())?;
        Some(NewPost {
            title,
            content,
            is_paid: self.is_paid.unwrap_or(false),
            author_id,
        })
    }
}

/// UpdatePostRequest
///
/// Partial update payload for `PUT /api/posts/{id}`. Omitted fields keep the
/// stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
}

impl UpdatePostRequest {
    /// Same semantics as `COALESCE($n, column)`. `id`, `author_id` and
    /// `created_at` are never touched.
    pub fn apply(self, post: Post) -> Post {
        Post {
            title: self.title.unwrap_or(post.title),
            content: self.content.unwrap_or(post.content),
            is_paid: self.is_paid.unwrap_or(post.is_paid),
            ..post
        }
    }
}

// --- Response Payloads (Output Schemas) ---

/// PostEnvelope
///
/// Single-post response body for create, get and update.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
}

/// MessageResponse
///
/// Plain `{ "message": ... }` body used for delete confirmations and for every
/// error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// DatabaseTimeResponse
///
/// Output of `GET /db-test`: the storage clock, proving a round trip works.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DatabaseTimeResponse {
    pub now: DateTime<Utc>,
}
