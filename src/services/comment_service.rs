use chrono::Utc;
use sqlx::PgPool;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        Comment, CommentFilter, CommentVersion, CreateCommentRequest, HistoryEvent,
        UpdateCommentRequest,
    },
    services::{history_service, post_service::lock_post},
};

pub async fn get_comment_by_id(db: &PgPool, comment_id: i64) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(db)
        .await?;

    Ok(comment)
}

/// Inserts the comment and moves the parent post's `commented`/`last_action`
/// to the comment's creation time, atomically. 404 when the post is missing.
pub async fn create_comment(
    db: &PgPool,
    author: Option<&AuthUser>,
    request: &CreateCommentRequest,
) -> Result<Comment> {
    let (user_id, username) = match author {
        Some(user) => (Some(user.user_id), user.username.clone()),
        None => (None, request.username.clone().unwrap_or_default()),
    };

    let mut tx = db.begin().await?;

    // Comments on one post get their timestamps in commit order
    lock_post(&mut tx, request.post).await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, username, body, email, created)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(request.post)
    .bind(user_id)
    .bind(&username)
    .bind(&request.body)
    .bind(&request.email)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    history_service::record(
        &mut tx,
        comment.post_id,
        HistoryEvent::Commented,
        comment.created,
    )
    .await?;

    tx.commit().await?;

    tracing::info!("Comment {} added to post {}", comment.id, comment.post_id);

    Ok(comment)
}

/// Owner-only edit; the previous text is kept as a `CommentVersion`. Saving
/// re-stamps `commented` with the comment's creation time, which never moves
/// it behind a newer comment.
pub async fn update_comment(
    db: &PgPool,
    comment_id: i64,
    editor_id: i64,
    request: &UpdateCommentRequest,
) -> Result<Comment> {
    let post_id = get_comment_by_id(db, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?
        .post_id;

    let mut tx = db.begin().await?;

    // Post before comment, the same order as post deletion
    lock_post(&mut tx, post_id).await?;

    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1 FOR UPDATE")
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.user_id != Some(editor_id) {
        return Err(AppError::Authorization(
            "Can only edit your own comments".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO comment_versions (comment_id, post_id, user_id, username, body, email, created)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(comment.id)
    .bind(comment.post_id)
    .bind(comment.user_id)
    .bind(&comment.username)
    .bind(&comment.body)
    .bind(&comment.email)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    let updated = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET body = $1 WHERE id = $2 RETURNING *",
    )
    .bind(&request.body)
    .bind(comment_id)
    .fetch_one(&mut *tx)
    .await?;

    history_service::record(
        &mut tx,
        updated.post_id,
        HistoryEvent::Commented,
        updated.created,
    )
    .await?;

    tx.commit().await?;

    Ok(updated)
}

pub async fn get_comments(db: &PgPool, filter: &CommentFilter) -> Result<Vec<Comment>> {
    let limit = filter.limit.unwrap_or(50).clamp(1, 200);
    let offset = filter.offset.unwrap_or(0);

    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT * FROM comments
        WHERE ($1::BIGINT IS NULL OR post_id = $1)
        ORDER BY created DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(filter.post)
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await?;

    Ok(comments)
}

pub async fn get_comment_versions(db: &PgPool, comment_id: i64) -> Result<Vec<CommentVersion>> {
    let versions = sqlx::query_as::<_, CommentVersion>(
        "SELECT * FROM comment_versions WHERE comment_id = $1 ORDER BY created DESC, id DESC",
    )
    .bind(comment_id)
    .fetch_all(db)
    .await?;

    Ok(versions)
}
