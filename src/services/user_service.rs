use sqlx::PgPool;

use crate::{
    error::{AppError, Result},
    models::{NewUser, SocialAccount, SocialNetwork, User, UserProfile},
};

/// Creates a user together with its profile. Nothing else creates profiles.
pub async fn create_user(db: &PgPool, new_user: &NewUser) -> Result<(User, UserProfile)> {
    let mut tx = db.begin().await?;

    let existing: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(&new_user.username)
            .fetch_one(&mut *tx)
            .await?;

    if existing {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, is_staff, date_joined)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(new_user.is_staff)
    .bind(chrono::Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match e {
        // A concurrent registration took the name after the check above
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Username already exists".to_string())
        }
        other => AppError::from(other),
    })?;

    let profile = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO user_profiles (user_id, receive_comments_email, email_confirmed)
        VALUES ($1, TRUE, FALSE)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("User {} ({}) created", user.id, user.username);

    Ok((user, profile))
}

pub async fn get_user_by_id(db: &PgPool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(user)
}

pub async fn get_user_by_username(db: &PgPool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1 AND is_active")
        .bind(username)
        .fetch_optional(db)
        .await?;

    Ok(user)
}

pub async fn get_users(db: &PgPool, limit: u32, offset: u32) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE is_active ORDER BY id LIMIT $1 OFFSET $2",
    )
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await?;

    Ok(users)
}

pub async fn require_staff(db: &PgPool, user_id: i64) -> Result<()> {
    let user = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("User not found".to_string()))?;

    if !user.is_staff {
        return Err(AppError::Authorization("Staff only".to_string()));
    }

    Ok(())
}

pub async fn get_profile(db: &PgPool, user_id: i64) -> Result<UserProfile> {
    sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

pub async fn update_profile(
    db: &PgPool,
    user_id: i64,
    receive_comments_email: Option<bool>,
) -> Result<UserProfile> {
    sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE user_profiles
        SET receive_comments_email = COALESCE($1, receive_comments_email)
        WHERE user_id = $2
        RETURNING *
        "#,
    )
    .bind(receive_comments_email)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

pub async fn link_social_account(
    db: &PgPool,
    user_id: i64,
    network: SocialNetwork,
    external_id: Option<&str>,
) -> Result<SocialAccount> {
    let account = sqlx::query_as::<_, SocialAccount>(
        r#"
        INSERT INTO social_accounts (user_id, network, external_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(network)
    .bind(external_id)
    .fetch_one(db)
    .await?;

    Ok(account)
}

pub async fn get_social_accounts(db: &PgPool, user_id: i64) -> Result<Vec<SocialAccount>> {
    let accounts = sqlx::query_as::<_, SocialAccount>(
        "SELECT * FROM social_accounts WHERE user_id = $1 ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(accounts)
}
