use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub created: DateTime<Utc>,
    #[serde(rename = "post")]
    pub post_id: i64,
    #[serde(rename = "user")]
    pub user_id: Option<i64>,
    pub username: String,
    pub body: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommentVersion {
    pub id: i64,
    pub created: DateTime<Utc>,
    #[serde(rename = "comment")]
    pub comment_id: i64,
    #[serde(rename = "post")]
    pub post_id: i64,
    #[serde(rename = "user")]
    pub user_id: Option<i64>,
    pub username: String,
    pub body: String,
    pub email: Option<String>,
}

// Create comment request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateCommentRequest {
    pub post: i64,
    #[validate(length(min = 1))]
    pub body: String,
    #[validate(length(max = 200))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

// Update comment request
#[derive(Debug, Validate, Deserialize)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1))]
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentFilter {
    pub post: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
