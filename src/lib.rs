pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod services;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, redis::RedisClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: Arc<RedisClient>,
    pub config: Arc<Config>,
}

async fn health() -> &'static str {
    "ok"
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout));

    let post_routes = Router::new()
        .route(
            "/api/posts",
            get(handlers::posts::get_posts).post(handlers::posts::create_post),
        )
        .route("/api/posts/rated", get(handlers::posts::get_rated_posts))
        .route(
            "/api/posts/{post_id}",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route("/api/posts/{post_id}/rate", put(handlers::posts::rate_post))
        .route(
            "/api/posts/{post_id}/versions",
            get(handlers::posts::get_post_versions),
        );

    let mark_routes = Router::new()
        .route(
            "/api/marks",
            get(handlers::marks::get_marks).post(handlers::marks::create_mark),
        )
        .route(
            "/api/marks/{mark_id}",
            get(handlers::marks::get_mark)
                .put(handlers::marks::update_mark)
                .delete(handlers::marks::delete_mark),
        );

    let tag_routes = Router::new()
        .route(
            "/api/tags",
            get(handlers::tags::get_tags).post(handlers::tags::create_tag),
        )
        .route(
            "/api/tags/{tag_id}",
            get(handlers::tags::get_tag)
                .put(handlers::tags::update_tag)
                .delete(handlers::tags::delete_tag),
        );

    let comment_routes = Router::new()
        .route(
            "/api/comments",
            get(handlers::comments::get_comments).post(handlers::comments::create_comment),
        )
        .route(
            "/api/comments/{comment_id}",
            get(handlers::comments::get_comment).put(handlers::comments::update_comment),
        )
        .route(
            "/api/comments/{comment_id}/versions",
            get(handlers::comments::get_comment_versions),
        );

    let user_routes = Router::new()
        .route("/api/users", get(handlers::users::get_users))
        .route(
            "/api/users/me/profile",
            get(handlers::users::get_my_profile).put(handlers::users::update_my_profile),
        )
        .route(
            "/api/users/me/social-accounts",
            get(handlers::users::get_my_social_accounts)
                .post(handlers::users::link_social_account),
        )
        .route("/api/users/{user_id}", get(handlers::users::get_user));

    Router::new()
        .route("/health", get(health))
        .merge(auth_routes)
        .merge(post_routes)
        .merge(mark_routes)
        .merge(tag_routes)
        .merge(comment_routes)
        .merge(user_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
