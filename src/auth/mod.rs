pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::Role, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// An authenticated caller holding the `job_seeker` role.
#[derive(Debug, Clone)]
pub struct JobSeeker(pub AuthenticatedUser);

/// An authenticated caller holding the `recruiter` role.
#[derive(Debug, Clone)]
pub struct Recruiter(pub AuthenticatedUser);

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    role: Role,
) -> Result<AuthenticatedUser, AppError> {
    let user = AuthenticatedUser::from_request_parts(parts, state).await?;
    if user.role != role {
        tracing::debug!(user_id = user.user_id, required = role.as_str(), "role check failed");
        return Err(AppError::forbidden());
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for JobSeeker {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::JobSeeker).await.map(JobSeeker)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Recruiter {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Recruiter).await.map(Recruiter)
    }
}
