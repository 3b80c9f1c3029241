use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, Claims, hash_password, verify_password},
    error::{AppError, Result},
    models::{NewUser, User, UserResponse},
    services::user_service,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

async fn issue_token(state: &AppState, user: User) -> Result<AuthResponse> {
    let (token, claims) = Claims::new(
        user.id,
        user.username.clone(),
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
    )?;

    state
        .redis
        .store_session(&claims.jti, &claims.sub, state.config.session_ttl_seconds())
        .await?;

    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    // Validate input
    payload.validate()?;

    // Rate limiting
    let rate_limit_key = format!(
        "register_attempt:{}",
        payload.email.as_deref().unwrap_or(&payload.username)
    );
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 5, 3600)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let password_hash = hash_password(&payload.password)?;

    let (user, _profile) = user_service::create_user(
        &state.db,
        &NewUser {
            username: payload.username,
            email: payload.email,
            password_hash: Some(password_hash),
            is_staff: false,
        },
    )
    .await?;

    let response = issue_token(&state, user).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    payload.validate()?;

    let rate_limit_key = format!("login_attempt:{}", payload.username);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 10, 900)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let invalid = || AppError::Authentication("Invalid credentials".to_string());

    let user = user_service::get_user_by_username(&state.db, &payload.username)
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&payload.password, hash)? {
        tracing::warn!("Failed login for {}", payload.username);
        return Err(invalid());
    }

    let response = issue_token(&state, user).await?;

    Ok(Json(response))
}

pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<Value>> {
    state.redis.delete_session(&auth_user.jti).await?;

    Ok(Json(json!({
        "message": "Logged out successfully"
    })))
}
