use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::Tag;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub created: DateTime<Utc>,
    #[serde(rename = "user")]
    pub user_id: Option<i64>,
    pub username: String,
    pub body: String,
    pub email: Option<String>,
}

/// Snapshot of a post taken right before it was edited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostVersion {
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

// Create post request
#[derive(Debug, Validate, Deserialize)]
pub struct CreatePostRequest {
    #[validate(length(min = 1))]
    pub body: String,
    #[validate(length(max = 200))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub tags: Option<Vec<i64>>,
}

// Update post request
#[derive(Debug, Validate, Deserialize)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1))]
    pub body: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub tags: Option<Vec<i64>>,
}

/// Post row joined with its derived counters and the viewer's own mark.
#[derive(Debug, Clone, FromRow)]
pub struct PostSummaryRow {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub user_id: Option<i64>,
    pub username: String,
    pub body: String,
    pub email: Option<String>,
    pub comment_count: i64,
    pub liked_count: i64,
    pub disliked_count: i64,
    pub rated: i16,
    pub last_action: Option<DateTime<Utc>>,
}

// Post response with derived state
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub user: Option<i64>,
    pub username: String,
    pub body: String,
    pub email: Option<String>,
    pub tags: Vec<Tag>,
    pub comment_count: i64,
    pub liked_count: i64,
    pub disliked_count: i64,
    pub rated: i16,
    pub last_action: Option<DateTime<Utc>>,
}

impl PostResponse {
    pub fn from_row(row: PostSummaryRow, tags: Vec<Tag>) -> Self {
        Self {
            id: row.id,
            created: row.created,
            user: row.user_id,
            username: row.username,
            body: row.body,
            email: row.email,
            tags,
            comment_count: row.comment_count,
            liked_count: row.liked_count,
            disliked_count: row.disliked_count,
            rated: row.rated,
            last_action: row.last_action,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostVersionResponse {
    #[serde(flatten)]
    pub version: PostVersion,
    pub tags: Vec<Tag>,
}

/// Which posts a listing returns relative to the viewer's marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatedScope {
    /// Every post, unmarked ones with `rated = 0`.
    All,
    /// Only posts the viewer has marked.
    OnlyRated,
}

// Listing filters
#[derive(Debug, Default, Deserialize)]
pub struct PostFilter {
    pub id: Option<i64>,
    pub id_gte: Option<i64>,
    pub tag: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PostFilter {
    pub const DEFAULT_LIMIT: u32 = 25;
    pub const MAX_LIMIT: u32 = 100;

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_limit_is_bounded() {
        let default = PostFilter::default();
        assert_eq!(default.limit(), 25);
        assert_eq!(default.offset(), 0);

        let huge = PostFilter {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(huge.limit(), 100);

        let zero = PostFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.limit(), 1);
    }

    #[test]
    fn response_uses_relation_field_names() {
        let row = PostSummaryRow {
            id: 7,
            created: Utc::now(),
            user_id: None,
            username: "guest".to_string(),
            body: "hello".to_string(),
            email: None,
            comment_count: 2,
            liked_count: 1,
            disliked_count: 0,
            rated: 0,
            last_action: None,
        };

        let json = serde_json::to_value(PostResponse::from_row(row, Vec::new())).unwrap();

        assert_eq!(json["id"], 7);
        assert!(json["user"].is_null());
        assert_eq!(json["liked_count"], 1);
        assert_eq!(json["rated"], 0);
        assert!(json["tags"].as_array().unwrap().is_empty());
    }
}
