// HTTP middleware

use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use prjflow_core::models::{UserId, ADMIN_ROLE};

use super::{AppError, AppResult, AppState};

/// Authenticated user extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl AuthUser {
    /// Fail unless the account currently holds the admin role
    ///
    /// Roles are read from storage, not from the token.
    pub async fn require_admin(&self, state: &AppState) -> AppResult<()> {
        let roles = state.accounts.role_codes(self.user_id).await?;
        if roles.iter().any(|r| r == ADMIN_ROLE) {
            Ok(())
        } else {
            Err(AppError::forbidden("Administrator role required"))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|e| AppError::unauthorized(format!("Invalid Authorization header: {e}")))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Expected a Bearer token"))?;

        let claims = app_state
            .tokens
            .verify(token)
            .map_err(|e| AppError::unauthorized(e.to_string()))?;
        let user_id = claims
            .user_id()
            .map_err(|_| AppError::unauthorized("Invalid token subject"))?;

        // disabled or deleted accounts lose access even with a valid token
        let account = app_state.accounts.get_by_id(user_id).await?;
        if !account.is_some_and(|a| a.is_active()) {
            return Err(AppError::unauthorized("Authentication failed"));
        }

        Ok(Self { user_id })
    }
}

/// `None` only when no Authorization header was sent; a bad token is still rejected
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }
        <Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
