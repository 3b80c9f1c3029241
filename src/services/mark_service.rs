use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row};

use crate::{
    error::{AppError, Result},
    models::{HistoryEvent, MarkPlan, MarkType, PostMark, rated_for},
    services::{history_service, post_service::lock_post},
};

async fn marks_of(conn: &mut PgConnection, post_id: i64, user_id: i64) -> Result<Vec<PostMark>> {
    let marks = sqlx::query_as::<_, PostMark>(
        "SELECT * FROM post_marks WHERE post_id = $1 AND user_id = $2 ORDER BY id",
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(marks)
}

async fn apply_plan(
    conn: &mut PgConnection,
    post_id: i64,
    user_id: i64,
    plan: &MarkPlan,
) -> Result<Option<PostMark>> {
    if !plan.stale.is_empty() {
        sqlx::query("DELETE FROM post_marks WHERE id = ANY($1)")
            .bind(plan.stale.as_slice())
            .execute(&mut *conn)
            .await?;
    }

    if plan.withdrawn {
        history_service::record(conn, post_id, HistoryEvent::UnVoted, Utc::now()).await?;
    }

    let Some(mark_type) = plan.place else {
        return Ok(None);
    };

    let mark = sqlx::query_as::<_, PostMark>(
        r#"
        INSERT INTO post_marks (post_id, user_id, mark_type, created)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(mark_type)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    history_service::record(conn, post_id, HistoryEvent::placed(mark_type), mark.created).await?;

    Ok(Some(mark))
}

/// Places `mark_type` on the post for `user_id`, replacing whatever the user held.
/// Marking one's own post is accepted and silently dropped: `None` is returned.
pub async fn submit_mark(
    db: &PgPool,
    post_id: i64,
    user_id: i64,
    mark_type: MarkType,
) -> Result<Option<PostMark>> {
    let mut tx = db.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;
    let existing = marks_of(&mut tx, post_id, user_id).await?;
    let plan = MarkPlan::submit(&existing, mark_type, user_id, post.user_id);

    let mark = apply_plan(&mut tx, post_id, user_id, &plan).await?;

    tx.commit().await?;

    if mark.is_none() {
        tracing::debug!("Ignored self mark by user {} on post {}", user_id, post_id);
    }

    Ok(mark)
}

/// Changes the type of a mark owned by `user_id`. The change is a fresh submission
/// on the mark's post, so the returned mark carries a new id and `created`.
pub async fn update_mark(
    db: &PgPool,
    mark_id: i64,
    user_id: i64,
    mark_type: MarkType,
) -> Result<Option<PostMark>> {
    let mark = get_mark(db, mark_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Mark not found".to_string()))?;

    if mark.user_id != user_id {
        return Err(AppError::Authorization(
            "Can only change your own marks".to_string(),
        ));
    }

    let mut tx = db.begin().await?;

    let post = lock_post(&mut tx, mark.post_id).await?;
    let existing = marks_of(&mut tx, mark.post_id, user_id).await?;

    // Withdrawn or replaced while we were waiting for the lock
    if !existing.iter().any(|held| held.id == mark_id) {
        return Err(AppError::NotFound("Mark not found".to_string()));
    }

    let plan = MarkPlan::submit(&existing, mark_type, user_id, post.user_id);
    let updated = apply_plan(&mut tx, mark.post_id, user_id, &plan).await?;

    tx.commit().await?;

    Ok(updated)
}

/// Toggle variant behind the rate endpoint; returns the resulting `rated` value.
/// `requested = None` changes nothing and reports the current state.
pub async fn rate_post(
    db: &PgPool,
    post_id: i64,
    user_id: i64,
    requested: Option<MarkType>,
) -> Result<i16> {
    let mut tx = db.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;
    let existing = marks_of(&mut tx, post_id, user_id).await?;

    let Some(requested) = requested else {
        return Ok(MarkType::rated(rated_for(&existing, Some(user_id))));
    };

    let plan = MarkPlan::rate(&existing, requested, user_id, post.user_id);
    apply_plan(&mut tx, post_id, user_id, &plan).await?;

    tx.commit().await?;

    tracing::info!(
        "User {} rated post {}: requested {:?}, now {}",
        user_id,
        post_id,
        requested,
        plan.rated()
    );

    Ok(plan.rated())
}

/// Removes a mark owned by `user_id` and records the un-vote.
pub async fn delete_mark(db: &PgPool, mark_id: i64, user_id: i64) -> Result<()> {
    let mut tx = db.begin().await?;

    let mark = sqlx::query_as::<_, PostMark>("SELECT * FROM post_marks WHERE id = $1")
        .bind(mark_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Mark not found".to_string()))?;

    if mark.user_id != user_id {
        return Err(AppError::Authorization(
            "Can only remove your own marks".to_string(),
        ));
    }

    lock_post(&mut tx, mark.post_id).await?;

    let result = sqlx::query("DELETE FROM post_marks WHERE id = $1")
        .bind(mark_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Mark not found".to_string()));
    }

    history_service::record(&mut tx, mark.post_id, HistoryEvent::UnVoted, Utc::now()).await?;

    tx.commit().await?;

    Ok(())
}

pub async fn get_mark(db: &PgPool, mark_id: i64) -> Result<Option<PostMark>> {
    let mark = sqlx::query_as::<_, PostMark>("SELECT * FROM post_marks WHERE id = $1")
        .bind(mark_id)
        .fetch_optional(db)
        .await?;

    Ok(mark)
}

pub async fn list_marks(
    db: &PgPool,
    post_id: Option<i64>,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostMark>> {
    let marks = sqlx::query_as::<_, PostMark>(
        r#"
        SELECT * FROM post_marks
        WHERE ($1::BIGINT IS NULL OR post_id = $1)
        ORDER BY id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(post_id)
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await?;

    Ok(marks)
}

/// `(liked_count, disliked_count)` of a post, counted on every call.
pub async fn mark_counts(db: &PgPool, post_id: i64) -> Result<(i64, i64)> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE mark_type = 1) AS liked_count,
            COUNT(*) FILTER (WHERE mark_type = 2) AS disliked_count
        FROM post_marks
        WHERE post_id = $1
        "#,
    )
    .bind(post_id)
    .fetch_one(db)
    .await?;

    Ok((row.get("liked_count"), row.get("disliked_count")))
}
