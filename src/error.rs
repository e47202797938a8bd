use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{models::MessageResponse, policy::PAID_CONTENT_PLACEHOLDER, repository::RepositoryError};

/// AppError
///
/// Every failure a post endpoint can produce. Each variant maps to exactly one
/// HTTP status and a `{ "message": ... }` JSON body, so handlers only ever
/// return `AppResult<T>` and let `IntoResponse` do the shaping.
#[derive(Debug, Error)]
pub enum AppError {
    /// No resolvable identity on a route that requires one.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("{0}")]
    ValidationFailed(String),

    #[error("Post not found")]
    NotFound,

    /// The caller is neither the author nor an admin.
    #[error("Not authorized")]
    NotAuthorized,

    /// Paid content requested by a caller without the required tier.
    #[error("{}", PAID_CONTENT_PLACEHOLDER)]
    AccessDenied,

    /// Unexpected storage failure. The raw detail is surfaced to the client.
    #[error("Error {action}: {detail}")]
    StorageFailure { action: &'static str, detail: String },
}

impl AppError {
    /// storage
    ///
    /// Converts a repository error into the response taxonomy. `action` names
    /// what the handler was doing ("creating post", "listing posts", ...) and
    /// prefixes the diagnostic message. A `NotFound` coming back from storage
    /// (row vanished between check and mutate) stays a 404.
    pub fn storage(action: &'static str, err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound,
            other => AppError::StorageFailure {
                action,
                detail: other.to_string(),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NotAuthorized | AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let AppError::StorageFailure { action, detail } = &self {
            tracing::error!(action = %action, "storage failure: {}", detail);
        }

        let body = MessageResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
