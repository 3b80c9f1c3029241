use sqlx::PgPool;

use crate::{
    error::{AppError, Result},
    models::{CreateTagRequest, Tag, UpdateTagRequest},
};

pub async fn get_tags(db: &PgPool) -> Result<Vec<Tag>> {
    let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY weight, title")
        .fetch_all(db)
        .await?;

    Ok(tags)
}

pub async fn get_tag_by_id(db: &PgPool, tag_id: i64) -> Result<Option<Tag>> {
    let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = $1")
        .bind(tag_id)
        .fetch_optional(db)
        .await?;

    Ok(tag)
}

pub async fn create_tag(db: &PgPool, request: &CreateTagRequest) -> Result<Tag> {
    let tag = sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (title, alias, weight) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&request.title)
    .bind(&request.alias)
    .bind(request.weight.unwrap_or(0))
    .fetch_one(db)
    .await?;

    Ok(tag)
}

pub async fn update_tag(db: &PgPool, tag_id: i64, request: &UpdateTagRequest) -> Result<Tag> {
    sqlx::query_as::<_, Tag>(
        r#"
        UPDATE tags
        SET title = COALESCE($1, title),
            alias = COALESCE($2, alias),
            weight = COALESCE($3, weight)
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&request.title)
    .bind(&request.alias)
    .bind(request.weight)
    .bind(tag_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))
}

pub async fn delete_tag(db: &PgPool, tag_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(tag_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Tag not found".to_string()));
    }

    Ok(())
}
