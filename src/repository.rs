use crate::models::{NewPost, Post, Role, SubscriptionStatus, UpdatePostRequest, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepositoryError
///
/// Distinguishes "the row is not there" from "the storage call failed", so
/// handlers never have to guess which one an empty result meant.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Raised by non-SQL backends (e.g. `MemoryRepository` in failure mode).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Repository Trait
///
/// The storage collaborator. Each method is a single, independent round trip;
/// no method opens a transaction spanning several calls.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    // --- Posts ---
    async fn insert_post(&self, post: NewPost) -> Result<Post, RepositoryError>;
    // Newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, RepositoryError>;
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepositoryError>;
    // Partial update. `NotFound` if the row no longer exists.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Result<Post, RepositoryError>;
    // Permanent removal. `NotFound` if the row no longer exists.
    async fn delete_post(&self, id: Uuid) -> Result<(), RepositoryError>;

    // --- Diagnostics ---
    async fn database_time(&self) -> Result<DateTime<Utc>, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Raw `users` row. Role and tier are stored as text and mapped onto the
/// closed enums in one place.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    role: String,
    subscription_status: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            role: Role::from_db(&row.role),
            subscription_status: SubscriptionStatus::from_db(&row.subscription_status),
        }
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, title, content, is_paid, author_id, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user
    ///
    /// Loads the identity attributes the policies need (role, subscription tier).
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, role, subscription_status FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// insert_post
    ///
    /// The id is generated here and `created_at` comes from the database clock.
    async fn insert_post(&self, post: NewPost) -> Result<Post, RepositoryError> {
        let query = format!(
            "INSERT INTO posts (id, title, content, is_paid, author_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING {POST_COLUMNS}"
        );

        let created = sqlx::query_as::<_, Post>(&query)
            .bind(Uuid::new_v4())
            .bind(post.title)
            .bind(post.content)
            .bind(post.is_paid)
            .bind(post.author_id)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("insert_post error: {:?}", e))?;

        Ok(created)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC");

        let posts = sqlx::query_as::<_, Post>(&query)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("list_posts error: {:?}", e))?;

        Ok(posts)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepositoryError> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");

        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("find_post error: {:?}", e))?;

        Ok(post)
    }

    /// update_post
    ///
    /// Uses `COALESCE` so a `None` field leaves the column untouched.
    /// No ownership filter here: authorization is decided by the handler.
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Result<Post, RepositoryError> {
        let query = format!(
            "UPDATE posts \
             SET title = COALESCE($1, title), \
                 content = COALESCE($2, content), \
                 is_paid = COALESCE($3, is_paid) \
             WHERE id = $4 \
             RETURNING {POST_COLUMNS}"
        );

        sqlx::query_as::<_, Post>(&query)
            .bind(req.title)
            .bind(req.content)
            .bind(req.is_paid)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("update_post error: {:?}", e))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("delete_post error: {:?}", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn database_time(&self) -> Result<DateTime<Utc>, RepositoryError> {
        let now = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()")
            .fetch_one(&self.pool)
            .await?;
        Ok(now)
    }
}

/// MemoryRepository
///
/// In-process implementation of `Repository` used by the test suites. It
/// honours the same contract as `PostgresRepository` (newest-first listing,
/// `NotFound` on missing rows, COALESCE updates) and can be switched into a
/// failure mode where every call returns `RepositoryError::Unavailable`.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    posts: RwLock<HashMap<Uuid, Post>>,
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Stores a post verbatim, keeping its id and timestamp.
    pub async fn seed_post(&self, post: Post) {
        self.posts.write().await.insert(post.id, post);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.should_fail {
            return Err(RepositoryError::Unavailable(
                "simulated storage outage".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.check_available()?;
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, RepositoryError> {
        self.check_available()?;
        let mut posts = self.posts.write().await;

        // Keep created_at strictly increasing so ordering is deterministic.
        let latest = posts.values().map(|p| p.created_at).max();
        let now = Utc::now();
        let created_at = match latest {
            Some(latest) if latest >= now => latest + Duration::microseconds(1),
            _ => now,
        };

        let created = Post {
            id: Uuid::new_v4(),
            title: post.title,
            content: post.content,
            is_paid: post.is_paid,
            author_id: post.author_id,
            created_at,
        };
        posts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        self.check_available()?;
        let mut posts: Vec<Post> = self.posts.read().await.values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepositoryError> {
        self.check_available()?;
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> Result<Post, RepositoryError> {
        self.check_available()?;
        let mut posts = self.posts.write().await;
        let current = posts.remove(&id).ok_or(RepositoryError::NotFound)?;
        let updated = req.apply(current);
        posts.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.check_available()?;
        self.posts
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn database_time(&self) -> Result<DateTime<Utc>, RepositoryError> {
        self.check_available()?;
        Ok(Utc::now())
    }
}
