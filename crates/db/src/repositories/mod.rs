//! Database repositories.

mod comment;
mod post;
mod reply;
mod user;

pub use comment::CommentRepository;
pub use post::PostRepository;
pub use reply::ReplyRepository;
pub use user::UserRepository;
