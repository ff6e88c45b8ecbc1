use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, Role, User},
    schema::users::{self, dsl},
    state::AppState,
};

use super::to_iso;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: to_iso(user.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let new_user = NewUser {
        email,
        password_hash,
        role: payload.role.as_str().to_string(),
    };

    let mut conn = state.db()?;
    let user: User = match diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
    {
        Ok(user) => user,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("email is already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    info!(user_id = user.id, role = %user.role, "registered user");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;
    let email = normalize_email(&payload.email);

    let user: User = dsl::users
        .filter(dsl::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        return Err(AppError::unauthorized());
    }

    let role: Role = user.role.parse().map_err(AppError::internal)?;
    let access_token = state
        .jwt
        .generate_token(user.id, &user.email, role)
        .map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
