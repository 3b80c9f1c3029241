use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "social_network", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SocialNetwork {
    Google,
    Vk,
    Facebook,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub receive_comments_email: bool,
    pub email_confirmed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SocialAccount {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub external_id: Option<String>,
    pub network: SocialNetwork,
}

/// Everything needed to create a user together with its profile.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_staff: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub receive_comments_email: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LinkSocialAccountRequest {
    pub network: SocialNetwork,
    #[validate(length(min = 1, max = 500))]
    pub external_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_network_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&SocialNetwork::Vk).unwrap(), "\"vk\"");
        let parsed: SocialNetwork = serde_json::from_str("\"facebook\"").unwrap();
        assert_eq!(parsed, SocialNetwork::Facebook);
        assert!(serde_json::from_str::<SocialNetwork>("\"twitter\"").is_err());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: 1,
            username: "kulik".to_string(),
            email: None,
            password_hash: Some("$2b$12$secret".to_string()),
            is_staff: false,
            is_active: true,
            date_joined: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "kulik");
    }
}
