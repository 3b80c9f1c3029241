pub mod comment_service;
pub mod history_service;
pub mod mark_service;
pub mod post_service;
pub mod tag_service;
pub mod user_service;
