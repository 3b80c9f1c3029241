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
    models::{
        CreatePostRequest, MarkType, PostFilter, PostResponse, RatePostRequest, RateResponse,
        RatedScope, UpdatePostRequest,
    },
    services::{mark_service, post_service},
};

pub async fn create_post(
    State(state): State<AppState>,
    auth_user: OptionalAuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    payload.validate()?;

    // Rate limiting - anonymous posters share one bucket per display name
    let rate_limit_key = match &auth_user.0 {
        Some(user) => format!("create_post:user:{}", user.user_id),
        None => format!(
            "create_post:anon:{}",
            payload.username.as_deref().unwrap_or_default()
        ),
    };
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 10, 3600)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let post = post_service::create_post(&state.db, auth_user.0.as_ref(), &payload).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
    auth_user: OptionalAuthUser,
) -> Result<Json<Value>> {
    let posts =
        post_service::get_posts(&state.db, auth_user.user_id(), &filter, RatedScope::All).await?;

    Ok(Json(json!({
        "posts": posts,
        "pagination": {
            "limit": filter.limit(),
            "offset": filter.offset()
        }
    })))
}

/// Posts the current user has liked or disliked.
pub async fn get_rated_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
    auth_user: AuthUser,
) -> Result<Json<Value>> {
    let posts = post_service::get_posts(
        &state.db,
        Some(auth_user.user_id),
        &filter,
        RatedScope::OnlyRated,
    )
    .await?;

    Ok(Json(json!({
        "posts": posts,
        "pagination": {
            "limit": filter.limit(),
            "offset": filter.offset()
        }
    })))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    auth_user: OptionalAuthUser,
) -> Result<Json<PostResponse>> {
    let post = post_service::get_post_by_id(&state.db, post_id, auth_user.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

pub async fn update_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>> {
    payload.validate()?;

    let post = post_service::update_post(&state.db, post_id, auth_user.user_id, &payload).await?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    post_service::delete_post(&state.db, post_id, auth_user.user_id).await?;

    Ok(Json(json!({
        "message": "Post deleted successfully"
    })))
}

/// Toggle rating: same mark again withdraws it, the other mark replaces it.
pub async fn rate_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(post_id): Path<i64>,
    Json(payload): Json<RatePostRequest>,
) -> Result<Json<RateResponse>> {
    let requested = MarkType::from_rated(payload.rated).map_err(AppError::Validation)?;

    let rate_limit_key = format!("mark_post:{}", auth_user.user_id);
    if !state
        .redis
        .check_rate_limit(&rate_limit_key, 100, 3600)
        .await?
    {
        return Err(AppError::RateLimit);
    }

    let rated = mark_service::rate_post(&state.db, post_id, auth_user.user_id, requested).await?;
    let (liked_count, disliked_count) = mark_service::mark_counts(&state.db, post_id).await?;

    Ok(Json(RateResponse {
        post: post_id,
        rated,
        liked_count,
        disliked_count,
    }))
}

pub async fn get_post_versions(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Value>> {
    let _post = post_service::get_post_by_id_raw(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let versions = post_service::get_post_versions(&state.db, post_id).await?;

    Ok(Json(json!({
        "versions": versions,
        "post_id": post_id
    })))
}
