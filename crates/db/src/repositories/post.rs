//! Post repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use crate::counter_set::CounterSet;
use crate::entities::{Post, post};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    const fn likes() -> CounterSet<post::Entity> {
        CounterSet::new(post::Column::LikeTotal, post::Column::LikeUsers)
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post only if it is owned by `owner_id`.
    pub async fn find_owned(&self, id: &str, owner_id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .filter(post::Column::PostOwnerId.eq(owner_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every post.
    pub async fn find_all(&self) -> AppResult<Vec<post::Model>> {
        Post::find()
            .order_by_asc(post::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List the posts of one owner.
    pub async fn find_by_owner(&self, owner_id: &str) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::PostOwnerId.eq(owner_id))
            .order_by_asc(post::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every post owned by `owner_id`.
    pub async fn delete_by_owner(&self, owner_id: &str) -> AppResult<u64> {
        Post::delete_many()
            .filter(post::Column::PostOwnerId.eq(owner_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a like from `user_id`. `None` if the post is missing or already liked.
    pub async fn add_like(&self, id: &str, user_id: &str) -> AppResult<Option<post::Model>> {
        Self::likes()
            .add(user_id)
            .filter(post::Column::Id.eq(id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Withdraw a like from `user_id`. `None` if the post is missing or not liked.
    pub async fn remove_like(&self, id: &str, user_id: &str) -> AppResult<Option<post::Model>> {
        Self::likes()
            .remove(user_id)
            .filter(post::Column::Id.eq(id))
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
    async fn test_find_owned_not_owner() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.find_owned("p1", "someone-else").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_by_owner() {
        let p1 = fixtures::post("p1", "u1");
        let p2 = fixtures::post("p2", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let posts = repo.find_by_owner("u1").await.unwrap();

        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| p.post_owner_id == "u1"));
    }

    #[tokio::test]
    async fn test_delete_by_owner_counts_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        assert_eq!(repo.delete_by_owner("u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_like() {
        let mut liked = fixtures::post("p1", "u1");
        liked.like_total = 1;
        liked.like_users = serde_json::json!(["u2"]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[liked]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let post = repo.add_like("p1", "u2").await.unwrap().unwrap();

        assert_eq!(post.like_total, 1);
        assert_eq!(crate::entities::id_list(&post.like_users), vec!["u2"]);
    }

    #[tokio::test]
    async fn test_remove_like_not_member() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        assert!(repo.remove_like("p1", "u2").await.unwrap().is_none());
    }
}
