//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod post;
pub mod reply;
pub mod user;

pub use comment::Entity as Comment;
pub use post::Entity as Post;
pub use reply::Entity as Reply;
pub use user::Entity as User;

/// Read a jsonb id array into owned strings, skipping non-string elements.
#[must_use]
pub fn id_list(value: &sea_orm::prelude::Json) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
