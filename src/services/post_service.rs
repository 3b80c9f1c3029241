use std::collections::HashMap;

use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{
        CreatePostRequest, HistoryEvent, Post, PostFilter, PostResponse, PostSummaryRow,
        PostVersion, PostVersionResponse, RatedScope, Tag, UpdatePostRequest,
    },
    services::history_service,
};

#[derive(FromRow)]
struct LinkedTag {
    owner_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

pub async fn get_post_by_id_raw(db: &PgPool, post_id: i64) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(db)
        .await?;

    Ok(post)
}

/// Locks the post row. Every write that touches a post's marks, comments or
/// history takes this lock first, so those writes are applied one at a time.
pub async fn lock_post(conn: &mut PgConnection, post_id: i64) -> Result<Post> {
    sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Lists posts newest first with counters, tags and the viewer's `rated` value.
///
/// Anonymous viewers get `rated = 0` without touching `post_marks`; with
/// `RatedScope::OnlyRated` they get nothing at all.
pub async fn get_posts(
    db: &PgPool,
    viewer_id: Option<i64>,
    filter: &PostFilter,
    scope: RatedScope,
) -> Result<Vec<PostResponse>> {
    if scope == RatedScope::OnlyRated && viewer_id.is_none() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Postgres>::new(
        r#"
        SELECT
            p.id, p.created, p.user_id, p.username, p.body, p.email,
            (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
            (SELECT COUNT(*) FROM post_marks m WHERE m.post_id = p.id AND m.mark_type = 1) AS liked_count,
            (SELECT COUNT(*) FROM post_marks m WHERE m.post_id = p.id AND m.mark_type = 2) AS disliked_count,
        "#,
    );

    match viewer_id {
        Some(viewer_id) => {
            query.push(
                "COALESCE((SELECT m.mark_type FROM post_marks m WHERE m.post_id = p.id AND m.user_id = ",
            );
            query.push_bind(viewer_id);
            query.push(" ORDER BY m.id DESC LIMIT 1), 0::SMALLINT) AS rated");
        }
        None => {
            query.push("0::SMALLINT AS rated");
        }
    }

    query.push(
        r#",
            h.last_action
        FROM posts p
        LEFT JOIN post_histories h ON h.post_id = p.id
        WHERE TRUE
        "#,
    );

    if let (RatedScope::OnlyRated, Some(viewer_id)) = (scope, viewer_id) {
        query.push(" AND EXISTS (SELECT 1 FROM post_marks m WHERE m.post_id = p.id AND m.user_id = ");
        query.push_bind(viewer_id);
        query.push(")");
    }

    if let Some(id) = filter.id {
        query.push(" AND p.id = ");
        query.push_bind(id);
    }

    if let Some(id_gte) = filter.id_gte {
        query.push(" AND p.id >= ");
        query.push_bind(id_gte);
    }

    if let Some(alias) = &filter.tag {
        query.push(
            " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id WHERE pt.post_id = p.id AND t.alias = ",
        );
        query.push_bind(alias.clone());
        query.push(")");
    }

    query.push(" ORDER BY p.created DESC, p.id DESC LIMIT ");
    query.push_bind(filter.limit() as i64);
    query.push(" OFFSET ");
    query.push_bind(filter.offset() as i64);

    let rows = query
        .build_query_as::<PostSummaryRow>()
        .fetch_all(db)
        .await?;

    let post_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut tags = get_tags_for_posts(db, &post_ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let post_tags = tags.remove(&row.id).unwrap_or_default();
            PostResponse::from_row(row, post_tags)
        })
        .collect())
}

pub async fn get_post_by_id(
    db: &PgPool,
    post_id: i64,
    viewer_id: Option<i64>,
) -> Result<Option<PostResponse>> {
    let filter = PostFilter {
        id: Some(post_id),
        limit: Some(1),
        ..Default::default()
    };

    let mut posts = get_posts(db, viewer_id, &filter, RatedScope::All).await?;
    Ok(posts.pop())
}

/// Creates the post, its tag links and its history row in one transaction.
pub async fn create_post(
    db: &PgPool,
    author: Option<&AuthUser>,
    request: &CreatePostRequest,
) -> Result<PostResponse> {
    let tag_ids = request.tags.clone().unwrap_or_default();

    // Authenticated authors always post under their own name
    let (user_id, username) = match author {
        Some(user) => (Some(user.user_id), user.username.clone()),
        None => (None, request.username.clone().unwrap_or_default()),
    };

    let mut tx = db.begin().await?;

    ensure_tags_exist(&mut tx, &tag_ids).await?;

    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (user_id, username, body, email, created)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&username)
    .bind(&request.body)
    .bind(&request.email)
    .bind(chrono::Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    link_tags(&mut tx, post.id, &tag_ids).await?;

    history_service::record(&mut tx, post.id, HistoryEvent::Created, post.created).await?;

    tx.commit().await?;

    tracing::info!("Post {} created by {:?}", post.id, user_id);

    get_post_by_id(db, post.id, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("Failed to retrieve created post".to_string()))
}

/// Owner-only edit. The state before the edit is kept as a `PostVersion`.
pub async fn update_post(
    db: &PgPool,
    post_id: i64,
    editor_id: i64,
    request: &UpdatePostRequest,
) -> Result<PostResponse> {
    let mut tx = db.begin().await?;

    let post = lock_post(&mut tx, post_id).await?;

    if post.user_id != Some(editor_id) {
        return Err(AppError::Authorization(
            "Can only edit your own posts".to_string(),
        ));
    }

    snapshot_post(&mut tx, &post).await?;

    sqlx::query(
        r#"
        UPDATE posts
        SET body = COALESCE($1, body),
            email = COALESCE($2, email)
        WHERE id = $3
        "#,
    )
    .bind(&request.body)
    .bind(&request.email)
    .bind(post_id)
    .execute(&mut *tx)
    .await?;

    if let Some(tag_ids) = &request.tags {
        ensure_tags_exist(&mut tx, tag_ids).await?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        link_tags(&mut tx, post_id, tag_ids).await?;
    }

    tx.commit().await?;

    get_post_by_id(db, post_id, Some(editor_id))
        .await?
        .ok_or_else(|| AppError::Internal("Failed to retrieve updated post".to_string()))
}

pub async fn delete_post(db: &PgPool, post_id: i64, editor_id: i64) -> Result<()> {
    let post = get_post_by_id_raw(db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.user_id != Some(editor_id) {
        return Err(AppError::Authorization(
            "Cannot delete this post".to_string(),
        ));
    }

    // Marks, comments, history and versions go with it
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(db)
        .await?;

    tracing::info!("Post {} deleted by user {}", post_id, editor_id);

    Ok(())
}

pub async fn get_post_versions(db: &PgPool, post_id: i64) -> Result<Vec<PostVersionResponse>> {
    let versions = sqlx::query_as::<_, PostVersion>(
        "SELECT * FROM post_versions WHERE post_id = $1 ORDER BY created DESC, id DESC",
    )
    .bind(post_id)
    .fetch_all(db)
    .await?;

    let version_ids: Vec<i64> = versions.iter().map(|version| version.id).collect();
    let mut tags = group_tags(
        sqlx::query_as::<_, LinkedTag>(
            r#"
            SELECT pvt.post_version_id AS owner_id, t.id, t.title, t.alias, t.weight
            FROM post_version_tags pvt
            JOIN tags t ON t.id = pvt.tag_id
            WHERE pvt.post_version_id = ANY($1)
            ORDER BY t.weight, t.title
            "#,
        )
        .bind(version_ids.as_slice())
        .fetch_all(db)
        .await?,
    );

    Ok(versions
        .into_iter()
        .map(|version| {
            let version_tags = tags.remove(&version.id).unwrap_or_default();
            PostVersionResponse {
                version,
                tags: version_tags,
            }
        })
        .collect())
}

async fn snapshot_post(conn: &mut PgConnection, post: &Post) -> Result<()> {
    let version_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO post_versions (post_id, user_id, username, body, email, created)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(post.id)
    .bind(post.user_id)
    .bind(&post.username)
    .bind(&post.body)
    .bind(&post.email)
    .bind(chrono::Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO post_version_tags (post_version_id, tag_id)
        SELECT $1, tag_id FROM post_tags WHERE post_id = $2
        "#,
    )
    .bind(version_id)
    .bind(post.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn ensure_tags_exist(conn: &mut PgConnection, tag_ids: &[i64]) -> Result<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    let mut unique = tag_ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(unique.as_slice())
        .fetch_one(&mut *conn)
        .await?;

    if found != unique.len() as i64 {
        return Err(AppError::BadRequest("Unknown tag".to_string()));
    }

    Ok(())
}

async fn link_tags(conn: &mut PgConnection, post_id: i64, tag_ids: &[i64]) -> Result<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO post_tags (post_id, tag_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn get_tags_for_posts(db: &PgPool, post_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, LinkedTag>(
        r#"
        SELECT pt.post_id AS owner_id, t.id, t.title, t.alias, t.weight
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ANY($1)
        ORDER BY t.weight, t.title
        "#,
    )
    .bind(post_ids)
    .fetch_all(db)
    .await?;

    Ok(group_tags(rows))
}

fn group_tags(rows: Vec<LinkedTag>) -> HashMap<i64, Vec<Tag>> {
    let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id).or_default().push(row.tag);
    }
    grouped
}
