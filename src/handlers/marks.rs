use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    models::{CreateMarkRequest, PostMark, UpdateMarkRequest},
    services::mark_service,
};

#[derive(Debug, Deserialize)]
pub struct GetMarksQuery {
    pub post: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn get_marks(
    State(state): State<AppState>,
    Query(params): Query<GetMarksQuery>,
) -> Result<Json<Value>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let offset = params.offset.unwrap_or(0);

    let marks = mark_service::list_marks(&state.db, params.post, limit, offset).await?;

    Ok(Json(json!({
        "marks": marks,
        "pagination": {
            "limit": limit,
            "offset": offset
        }
    })))
}

/// Raw mark creation. A mark on one's own post is accepted but not stored,
/// which is answered with 200 and `"mark": null`.
pub async fn create_mark(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateMarkRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let rate_limit_key = format!("mark_post:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 100, 3600)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let mark = mark_service::submit_mark(
        &state.db,
        payload.post,
        auth_user.user_id,
        payload.mark_type,
    )
    .await?;

    let status = if mark.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(json!({ "mark": mark }))))
}

pub async fn get_mark(
    State(state): State<AppState>,
    Path(mark_id): Path<i64>,
) -> Result<Json<PostMark>> {
    let mark = mark_service::get_mark(&state.db, mark_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Mark not found".to_string()))?;

    Ok(Json(mark))
}

pub async fn update_mark(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(mark_id): Path<i64>,
    Json(payload): Json<UpdateMarkRequest>,
) -> Result<Json<Value>> {
    let rate_limit_key = format!("mark_post:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 100, 3600)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let mark =
        mark_service::update_mark(&state.db, mark_id, auth_user.user_id, payload.mark_type)
            .await?;

    Ok(Json(json!({ "mark": mark })))
}

pub async fn delete_mark(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(mark_id): Path<i64>,
) -> Result<StatusCode> {
    mark_service::delete_mark(&state.db, mark_id, auth_user.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
