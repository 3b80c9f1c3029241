use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        LinkSocialAccountRequest, SocialAccount, UpdateProfileRequest, UserProfile, UserResponse,
    },
    services::user_service,
};

#[derive(Debug, Deserialize)]
pub struct GetUsersQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn get_users(
    State(state): State<AppState>,
    Query(params): Query<GetUsersQuery>,
) -> Result<Json<Value>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0);

    let users: Vec<UserResponse> = user_service::get_users(&state.db, limit, offset)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(json!({
        "users": users,
        "pagination": {
            "limit": limit,
            "offset": offset
        }
    })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserResponse>> {
    let user = user_service::get_user_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserProfile>> {
    let profile = user_service::get_profile(&state.db, auth_user.user_id).await?;
    Ok(Json(profile))
}

pub async fn update_my_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>> {
    let profile = user_service::update_profile(
        &state.db,
        auth_user.user_id,
        payload.receive_comments_email,
    )
    .await?;

    Ok(Json(profile))
}

pub async fn get_my_social_accounts(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<SocialAccount>>> {
    let accounts = user_service::get_social_accounts(&state.db, auth_user.user_id).await?;
    Ok(Json(accounts))
}

pub async fn link_social_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<LinkSocialAccountRequest>,
) -> Result<(StatusCode, Json<SocialAccount>)> {
    payload.validate()?;

    let account = user_service::link_social_account(
        &state.db,
        auth_user.user_id,
        payload.network,
        payload.external_id.as_deref(),
    )
    .await?;

    tracing::info!(
        "User {} linked a {:?} account",
        auth_user.user_id,
        account.network
    );

    Ok((StatusCode::CREATED, Json(account)))
}
