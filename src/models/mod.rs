pub mod comment;
pub mod history;
pub mod mark;
pub mod post;
pub mod tag;
pub mod user;

pub use comment::*;
pub use history::*;
pub use mark::*;
pub use post::*;
pub use tag::*;
pub use user::*;
