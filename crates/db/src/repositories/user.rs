//! User repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, SqlErr,
};

use crate::counter_set::CounterSet;
use crate::entities::{User, user};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

/// Map a write error, reporting unique-key collisions as a duplicate user.
fn map_write_err(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("User already exists".to_string())
        }
        _ => AppError::Database(e.to_string()),
    }
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    const fn followers() -> CounterSet<user::Entity> {
        CounterSet::new(user::Column::FollowersTotal, user::Column::FollowersUsers)
    }

    const fn followings() -> CounterSet<user::Entity> {
        CounterSet::new(user::Column::FollowingsTotal, user::Column::FollowingsUsers)
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user whose username or email equals `term`.
    pub async fn find_by_username_or_email(&self, term: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(term))
                    .add(user::Column::Email.eq(term)),
            )
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find any user holding either the given username or the given email.
    pub async fn find_conflicting(
        &self,
        username: &str,
        email: &str,
    ) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(username))
                    .add(user::Column::Email.eq(email)),
            )
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every user, oldest first.
    pub async fn find_all(&self) -> AppResult<Vec<user::Model>> {
        User::find()
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_write_err)
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model.update(self.db.as_ref()).await.map_err(map_write_err)
    }

    /// Delete a user. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        User::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add `target_id` to `user_id`'s followings unless already present.
    ///
    /// Returns `None` when the user does not exist or already follows the target.
    pub async fn add_following(
        &self,
        user_id: &str,
        target_id: &str,
    ) -> AppResult<Option<user::Model>> {
        Self::followings()
            .add(target_id)
            .filter(user::Column::Id.eq(user_id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove `target_id` from `user_id`'s followings if present.
    pub async fn remove_following(
        &self,
        user_id: &str,
        target_id: &str,
    ) -> AppResult<Option<user::Model>> {
        Self::followings()
            .remove(target_id)
            .filter(user::Column::Id.eq(user_id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add `follower_id` to `user_id`'s followers unless already present.
    pub async fn add_follower(
        &self,
        user_id: &str,
        follower_id: &str,
    ) -> AppResult<Option<user::Model>> {
        Self::followers()
            .add(follower_id)
            .filter(user::Column::Id.eq(user_id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove `follower_id` from `user_id`'s followers if present.
    pub async fn remove_follower(
        &self,
        user_id: &str,
        follower_id: &str,
    ) -> AppResult<Option<user::Model>> {
        Self::followers()
            .remove(follower_id)
            .filter(user::Column::Id.eq(user_id))
            .exec_with_returning(self.db.as_ref())
            .await
            .map(|rows| rows.into_iter().next())
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
