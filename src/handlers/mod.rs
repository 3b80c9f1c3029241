pub mod auth;
pub mod comments;
pub mod marks;
pub mod posts;
pub mod tags;
pub mod users;
