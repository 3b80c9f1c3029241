use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{CreateTagRequest, Tag, UpdateTagRequest},
    services::{tag_service, user_service},
};

pub async fn get_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>> {
    let tags = tag_service::get_tags(&state.db).await?;
    Ok(Json(tags))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(tag_id): Path<i64>,
) -> Result<Json<Tag>> {
    let tag = tag_service::get_tag_by_id(&state.db, tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))?;

    Ok(Json(tag))
}

pub async fn create_tag(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>)> {
    payload.validate()?;
    user_service::require_staff(&state.db, auth_user.user_id).await?;

    let tag = tag_service::create_tag(&state.db, &payload).await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(tag_id): Path<i64>,
    Json(payload): Json<UpdateTagRequest>,
) -> Result<Json<Tag>> {
    payload.validate()?;
    user_service::require_staff(&state.db, auth_user.user_id).await?;

    let tag = tag_service::update_tag(&state.db, tag_id, &payload).await?;

    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(tag_id): Path<i64>,
) -> Result<StatusCode> {
    user_service::require_staff(&state.db, auth_user.user_id).await?;

    tag_service::delete_tag(&state.db, tag_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
