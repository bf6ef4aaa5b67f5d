//! Business logic services.
//!
//! Services call each other strictly downward: user → post → comment → reply.

#![allow(missing_docs)]

pub mod auth;
pub mod cascade;
pub mod comment;
pub mod media;
pub mod post;
pub mod reply;
pub mod user;

pub use auth::{AccessToken, AuthService, Identity};
pub use comment::{CommentService, CommentWithReplies, CreateCommentInput, UpdateCommentInput};
pub use media::{
    MediaFile, MediaGateway, MediaPolicy, MediaUploader, StorageMediaUploader, StoredMedia,
};
pub use post::PostService;
pub use reply::{CreateReplyInput, ReplyService, UpdateReplyInput};
pub use user::{CreateUserInput, PublicUser, UpdateUserInput, UserService};

use agora_db::entities::id_list;
use sea_orm::prelude::Json;
use serde::Serialize;

/// Default number of items returned by bounded listings.
pub const DEFAULT_LIST_LIMIT: u64 = 10;
/// Upper bound for a requested listing limit.
pub const MAX_LIST_LIMIT: u64 = 100;

/// Resolve a client-supplied limit.
#[must_use]
pub fn resolve_limit(limit: Option<u64>) -> u64 {
    limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

/// A counter-set as exposed to clients: `{ total, users }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSetView {
    pub total: i32,
    pub users: Vec<String>,
}

impl CounterSetView {
    #[must_use]
    pub fn new(total: i32, users: &Json) -> Self {
        Self {
            total,
            users: id_list(users),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_limit() {
        assert_eq!(resolve_limit(None), 10);
        assert_eq!(resolve_limit(Some(0)), 1);
        assert_eq!(resolve_limit(Some(25)), 25);
        assert_eq!(resolve_limit(Some(10_000)), 100);
    }

    #[test]
    fn test_counter_set_view() {
        let view = CounterSetView::new(2, &serde_json::json!(["a", "b"]));
        assert_eq!(view.total, 2);
        assert_eq!(view.users, vec!["a", "b"]);
    }
}
