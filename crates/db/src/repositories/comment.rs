//! Comment repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::counter_set::{self, CounterSet};
use crate::entities::{Comment, comment};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    const fn likes() -> CounterSet<comment::Entity> {
        CounterSet::new(comment::Column::LikeTotal, comment::Column::LikeUsers)
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a comment only if it is owned by `owner_id`.
    pub async fn find_owned(&self, id: &str, owner_id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .filter(comment::Column::CommentOwnerId.eq(owner_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every comment.
    pub async fn find_all(&self) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .order_by_asc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List at most `limit` comments of a post.
    pub async fn find_by_post(&self, post_id: &str, limit: u64) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every comment matching `column == value`.
    async fn find_ids_where(
        &self,
        column: comment::Column,
        value: &str,
    ) -> AppResult<Vec<String>> {
        Comment::find()
            .filter(column.eq(value))
            .all(self.db.as_ref())
            .await
            .map(|comments| comments.into_iter().map(|c| c.id).collect())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of the comments of a post.
    pub async fn find_ids_by_post(&self, post_id: &str) -> AppResult<Vec<String>> {
        self.find_ids_where(comment::Column::PostId, post_id).await
    }

    /// IDs of the comments written by a user.
    pub async fn find_ids_by_owner(&self, owner_id: &str) -> AppResult<Vec<String>> {
        self.find_ids_where(comment::Column::CommentOwnerId, owner_id)
            .await
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a comment. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        Comment::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every comment of a post.
    pub async fn delete_by_post(&self, post_id: &str) -> AppResult<u64> {
        Comment::delete_many()
            .filter(comment::Column::PostId.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every comment written by a user.
    pub async fn delete_by_owner(&self, owner_id: &str) -> AppResult<u64> {
        Comment::delete_many()
            .filter(comment::Column::CommentOwnerId.eq(owner_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Append a reply id to the comment's cached reply list.
    ///
    /// Returns `None` if the comment does not exist.
    pub async fn append_reply(
        &self,
        id: &str,
        reply_id: &str,
    ) -> AppResult<Option<comment::Model>> {
        counter_set::append::<comment::Entity>(comment::Column::ReplyIds, reply_id)
            .filter(comment::Column::Id.eq(id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a like from `user_id`. `None` if the comment is missing or already liked.
    pub async fn add_like(&self, id: &str, user_id: &str) -> AppResult<Option<comment::Model>> {
        Self::likes()
            .add(user_id)
            .filter(comment::Column::Id.eq(id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Withdraw a like from `user_id`. `None` if the comment is missing or not liked.
    pub async fn remove_like(&self, id: &str, user_id: &str) -> AppResult<Option<comment::Model>> {
        Self::likes()
            .remove(user_id)
            .filter(comment::Column::Id.eq(id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
