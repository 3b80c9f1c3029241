use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub title: String,
    pub alias: String,
    pub weight: i32,
}

// Create tag request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub alias: String,
    pub weight: Option<i32>,
}

// Update tag request
#[derive(Debug, Validate, Deserialize)]
pub struct UpdateTagRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub alias: Option<String>,
    pub weight: Option<i32>,
}
