use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::{
    error::{AppError, Result},
    models::{HistoryEvent, PostHistory},
};

/// Upserts the history row of `post_id` and stamps `event` on it.
///
/// Runs on the caller's connection so it commits or rolls back together with the
/// row that triggered it. `at` must be the stored timestamp of that row.
pub async fn record(
    conn: &mut PgConnection,
    post_id: i64,
    event: HistoryEvent,
    at: DateTime<Utc>,
) -> Result<PostHistory> {
    sqlx::query("INSERT INTO post_histories (post_id) VALUES ($1) ON CONFLICT (post_id) DO NOTHING")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    let mut history = sqlx::query_as::<_, PostHistory>(
        "SELECT * FROM post_histories WHERE post_id = $1 FOR UPDATE",
    )
    .bind(post_id)
    .fetch_one(&mut *conn)
    .await?;

    let post_created =
        sqlx::query_scalar::<_, DateTime<Utc>>("SELECT created FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    history.apply(event, at, post_created);

    let history = sqlx::query_as::<_, PostHistory>(
        r#"
        UPDATE post_histories
        SET commented = $1,
            up_voted = $2,
            down_voted = $3,
            un_voted = $4,
            last_action = $5
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(history.commented)
    .bind(history.up_voted)
    .bind(history.down_voted)
    .bind(history.un_voted)
    .bind(history.last_action)
    .bind(history.id)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!("Post {} history updated on {:?}", post_id, event);

    Ok(history)
}

pub async fn get_history(db: &PgPool, post_id: i64) -> Result<Option<PostHistory>> {
    let history =
        sqlx::query_as::<_, PostHistory>("SELECT * FROM post_histories WHERE post_id = $1")
            .bind(post_id)
            .fetch_optional(db)
            .await?;

    Ok(history)
}
