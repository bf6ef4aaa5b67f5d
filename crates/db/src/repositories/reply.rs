//! Reply repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::counter_set::CounterSet;
use crate::entities::{Reply, reply};

/// Reply repository for database operations.
#[derive(Clone)]
pub struct ReplyRepository {
    db: Arc<DatabaseConnection>,
}

impl ReplyRepository {
    /// Create a new reply repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    const fn likes() -> CounterSet<reply::Entity> {
        CounterSet::new(reply::Column::LikeTotal, reply::Column::LikeUsers)
    }

    /// Find a reply by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<reply::Model>> {
        Reply::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a reply only if it is owned by `owner_id`.
    pub async fn find_owned(&self, id: &str, owner_id: &str) -> AppResult<Option<reply::Model>> {
        Reply::find_by_id(id)
            .filter(reply::Column::ReplyOwnerId.eq(owner_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every reply.
    pub async fn find_all(&self) -> AppResult<Vec<reply::Model>> {
        Reply::find()
            .order_by_asc(reply::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List at most `limit` replies of a comment.
    pub async fn find_by_comment(
        &self,
        comment_id: &str,
        limit: u64,
    ) -> AppResult<Vec<reply::Model>> {
        Reply::find()
            .filter(reply::Column::CommentId.eq(comment_id))
            .order_by_asc(reply::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List the replies of several comments.
    pub async fn find_by_comments(&self, comment_ids: &[String]) -> AppResult<Vec<reply::Model>> {
        if comment_ids.is_empty() {
            return Ok(vec![]);
        }

        Reply::find()
            .filter(reply::Column::CommentId.is_in(comment_ids.to_vec()))
            .order_by_asc(reply::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new reply.
    pub async fn create(&self, model: reply::ActiveModel) -> AppResult<reply::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a reply.
    pub async fn update(&self, model: reply::ActiveModel) -> AppResult<reply::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a reply. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        Reply::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every reply of a comment.
    pub async fn delete_by_comment(&self, comment_id: &str) -> AppResult<u64> {
        Reply::delete_many()
            .filter(reply::Column::CommentId.eq(comment_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every reply of the given comments.
    pub async fn delete_by_comments(&self, comment_ids: &[String]) -> AppResult<u64> {
        if comment_ids.is_empty() {
            return Ok(0);
        }

        Reply::delete_many()
            .filter(reply::Column::CommentId.is_in(comment_ids.to_vec()))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every reply under a post.
    pub async fn delete_by_post(&self, post_id: &str) -> AppResult<u64> {
        Reply::delete_many()
            .filter(reply::Column::PostId.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a like from `user_id`. `None` if the reply is missing or already liked.
    pub async fn add_like(&self, id: &str, user_id: &str) -> AppResult<Option<reply::Model>> {
        Self::likes()
            .add(user_id)
            .filter(reply::Column::Id.eq(id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Withdraw a like from `user_id`. `None` if the reply is missing or not liked.
    pub async fn remove_like(&self, id: &str, user_id: &str) -> AppResult<Option<reply::Model>> {
        Self::likes()
            .remove(user_id)
            .filter(reply::Column::Id.eq(id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_find_by_comments_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = ReplyRepository::new(db);
        assert!(repo.find_by_comments(&[]).await.unwrap().is_empty());
        assert_eq!(repo.delete_by_comments(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_comment() {
        let r1 = fixtures::reply("r1", "p1", "c1", "u1");
        let r2 = fixtures::reply("r2", "p1", "c1", "u2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[r1, r2]])
                .into_connection(),
        );

        let repo = ReplyRepository::new(db);
        let replies = repo.find_by_comment("c1", 10).await.unwrap();

        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r.comment_id == "c1"));
    }

    #[tokio::test]
    async fn test_delete_by_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 4,
                }])
                .into_connection(),
        );

        let repo = ReplyRepository::new(db);
        assert_eq!(repo.delete_by_post("p1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_add_like_duplicate() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<reply::Model>::new()])
                .into_connection(),
        );

        let repo = ReplyRepository::new(db);
        assert!(repo.add_like("r1", "u1").await.unwrap().is_none());
    }
}
