use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    models::{Comment, CommentFilter, CreateCommentRequest, UpdateCommentRequest},
    services::comment_service,
};

pub async fn create_comment(
    State(state): State<AppState>,
    auth_user: OptionalAuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    payload.validate()?;

    // Check rate limiting
    let rate_limit_key = match &auth_user.0 {
        Some(user) => format!("comment_create:user:{}", user.user_id),
        None => format!("comment_create:post:{}", payload.post),
    };
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 10, 60)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let comment = comment_service::create_comment(&state.db, auth_user.0.as_ref(), &payload).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comments(
    State(state): State<AppState>,
    Query(filter): Query<CommentFilter>,
) -> Result<Json<Value>> {
    let comments = comment_service::get_comments(&state.db, &filter).await?;

    Ok(Json(json!({
        "comments": comments,
        "post_id": filter.post
    })))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<Json<Comment>> {
    let comment = comment_service::get_comment_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

pub async fn update_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(comment_id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>> {
    payload.validate()?;

    let comment =
        comment_service::update_comment(&state.db, comment_id, auth_user.user_id, &payload)
            .await?;

    Ok(Json(comment))
}

pub async fn get_comment_versions(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    let _comment = comment_service::get_comment_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    let versions = comment_service::get_comment_versions(&state.db, comment_id).await?;

    Ok(Json(json!({
        "versions": versions,
        "comment_id": comment_id
    })))
}
