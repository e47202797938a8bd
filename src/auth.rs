use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Role, SubscriptionStatus, User},
    repository::{RepositoryError, RepositoryState},
};

/// Header accepted as a development shortcut when running in `Env::Local`.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload expected inside the bearer JWT. Tokens are minted elsewhere; this
/// service only verifies them.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, looked up in the `users` table.
    pub sub: Uuid,
    /// Expiration Time (exp). Always validated.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// AuthUser
///
/// A fully resolved caller identity. There is no partially populated form:
/// either every field came from storage or no `AuthUser` exists.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub subscription_status: SubscriptionStatus,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        AuthUser {
            id: user.id,
            role: user.role,
            subscription_status: user.subscription_status,
        }
    }
}

/// IdentityError
///
/// Why identity resolution failed. Never leaves this module as-is: the
/// mandatory extractor turns it into a 401, the optional one into `None`.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no credentials supplied")]
    MissingCredentials,

    #[error("authorization header is not a bearer token")]
    MalformedCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Token was valid but the user no longer exists.
    #[error("unknown user")]
    UnknownUser,

    #[error("identity lookup failed: {0}")]
    Lookup(#[from] RepositoryError),
}

/// resolve_identity
///
/// The identity-provider contract: credentials in, `AuthUser` or failure out.
///
/// 1. Local bypass: in `Env::Local` a valid `x-user-id` header naming an
///    existing user is accepted. On any miss we fall through to step 2.
/// 2. Bearer token: HS256 JWT signed with `jwt_secret`, `exp` enforced.
/// 3. Storage lookup of `sub`, so deleted users lose access immediately and
///    role/tier always reflect the current row.
pub async fn resolve_identity(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<AuthUser, IdentityError> {
    if config.env == Env::Local {
        if let Some(user) = local_bypass(headers, repo).await {
            return Ok(user);
        }
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(IdentityError::MissingCredentials)?
        .to_str()
        .map_err(|_| IdentityError::MalformedCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(IdentityError::MalformedCredentials)?;

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation)?;

    let user = repo
        .get_user(token_data.claims.sub)
        .await?
        .ok_or(IdentityError::UnknownUser)?;

    Ok(AuthUser::from(user))
}

async fn local_bypass(headers: &HeaderMap, repo: &RepositoryState) -> Option<AuthUser> {
    let raw = headers.get(LOCAL_USER_HEADER)?.to_str().ok()?;
    let user_id = Uuid::parse_str(raw).ok()?;

    match repo.get_user(user_id).await {
        Ok(Some(user)) => Some(AuthUser::from(user)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("local bypass lookup failed: {}", e);
            None
        }
    }
}

/// Mandatory identity.
///
/// Usable as a handler argument on any route that requires a caller. Every
/// resolution failure is rejected with `AppError::AuthenticationRequired`
/// before the handler body runs.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_identity(&parts.headers, &repo, &config)
            .await
            .map_err(|e| {
                tracing::debug!("authentication rejected: {}", e);
                AppError::AuthenticationRequired
            })
    }
}

/// OptionalAuthUser
///
/// Optional identity. Never rejects: a missing or invalid credential simply
/// yields `OptionalAuthUser(None)` and the request carries on anonymously.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match resolve_identity(&parts.headers, &repo, &config).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(IdentityError::MissingCredentials) => Ok(OptionalAuthUser(None)),
            Err(e) => {
                tracing::debug!("optional identity dropped: {}", e);
                Ok(OptionalAuthUser(None))
            }
        }
    }
}
