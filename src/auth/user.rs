//! Identity comes from the upstream auth layer as an `x-user-id` header; this
//! extractor resolves it to the stored user.

use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use tracing::debug;

use crate::{entities::user, error::ApiError, router::AppState};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing {USER_ID_HEADER} header")]
    MissingIdentity,

    #[error("malformed {USER_ID_HEADER} header")]
    MalformedIdentity,

    #[error("unknown user {0}")]
    UnknownUser(i32),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(e) => e.into(),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

fn user_id_from(parts: &Parts) -> Result<i32, AuthError> {
    let raw = parts
        .headers
        .get(USER_ID_HEADER)
        .ok_or(AuthError::MissingIdentity)?;
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or(AuthError::MalformedIdentity)
}

pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model, AuthError> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(AuthError::UnknownUser(user_id))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = user_id_from(parts)?;
        let user = get_user(&state.db, user_id).await.inspect_err(|e| {
            debug!(user_id, error = %e, "rejecting request");
        })?;
        Ok(CurrentUser(user))
    }
}
