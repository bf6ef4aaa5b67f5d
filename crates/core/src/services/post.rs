//! Post service.

use agora_common::{AppError, AppResult, IdGenerator, validate_ids};
use agora_db::{entities::post, repositories::PostRepository};
use chrono::Utc;
use sea_orm::Set;
use serde_json::json;

use crate::services::CommentService;
use crate::services::cascade::{Cascade, collapse_bulk_failure};
use crate::services::media::{self, MediaFile, MediaGateway};

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    comment_service: CommentService,
    media: MediaGateway,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        comment_service: CommentService,
        media: MediaGateway,
    ) -> Self {
        Self {
            post_repo,
            comment_service,
            media,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post from uploaded media.
    ///
    /// Files go to `users/{owner_id}/posts/{post_id}` and the returned URLs become
    /// the post content, in upload order.
    pub async fn create(&self, owner_id: &str, files: Vec<MediaFile>) -> AppResult<post::Model> {
        validate_ids(&[owner_id])?;

        if files.is_empty() {
            return Err(AppError::BadRequest(
                "Post must contain at least one file".to_string(),
            ));
        }

        let post_id = self.id_gen.generate();
        let folder = format!("users/{owner_id}/posts/{post_id}");
        let stored = self.media.upload(&folder, files).await?;

        let model = post::ActiveModel {
            id: Set(post_id),
            content: Set(json!(media::urls(&stored))),
            post_owner_id: Set(owner_id.to_string()),
            like_total: Set(0),
            like_users: Set(json!([])),
            created_at: Set(Utc::now().into()),
        };

        match self.post_repo.create(model).await {
            Ok(post) => {
                tracing::info!(post_id = %post.id, owner_id = %owner_id, "Created post");
                Ok(post)
            }
            Err(e) => {
                self.media.discard(&stored).await;
                Err(e)
            }
        }
    }

    /// List every post.
    pub async fn list_all(&self) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_all().await
    }

    /// List the posts of one owner.
    pub async fn list_by_owner(&self, owner_id: &str) -> AppResult<Vec<post::Model>> {
        validate_ids(&[owner_id])?;
        self.post_repo.find_by_owner(owner_id).await
    }

    /// Get a post by ID.
    pub async fn get_by_id(&self, post_id: &str) -> AppResult<post::Model> {
        validate_ids(&[post_id])?;
        self.post_repo
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post does not exist".to_string()))
    }

    /// Delete a post owned by `owner_id` along with its comments.
    pub async fn delete(&self, post_id: &str, owner_id: &str) -> AppResult<post::Model> {
        validate_ids(&[post_id, owner_id])?;

        let post = self
            .post_repo
            .find_owned(post_id, owner_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(
                    "You are not authorized to delete this post or it does not exist".to_string(),
                )
            })?;

        let mut cascade = Cascade::new("post", post_id);
        cascade
            .step("comments", self.comment_service.delete_all_by_post(post_id))
            .await?;
        cascade.step("post", self.post_repo.delete(post_id)).await?;

        tracing::info!(post_id = %post_id, "Deleted post");
        Ok(post)
    }

    /// Like a post.
    pub async fn like(&self, post_id: &str, user_id: &str) -> AppResult<post::Model> {
        validate_ids(&[post_id, user_id])?;

        match self.post_repo.add_like(post_id, user_id).await? {
            Some(post) => Ok(post),
            None => Err(self
                .rejected_toggle(post_id, "You have already liked this post")
                .await),
        }
    }

    /// Withdraw a like from a post.
    pub async fn unlike(&self, post_id: &str, user_id: &str) -> AppResult<post::Model> {
        validate_ids(&[post_id, user_id])?;

        match self.post_repo.remove_like(post_id, user_id).await? {
            Some(post) => Ok(post),
            None => Err(self
                .rejected_toggle(post_id, "You have already unliked this post")
                .await),
        }
    }

    async fn rejected_toggle(&self, post_id: &str, message: &str) -> AppError {
        match self.post_repo.find_by_id(post_id).await {
            Ok(Some(_)) => AppError::BadRequest(message.to_string()),
            Ok(None) => AppError::NotFound("Post does not exist".to_string()),
            Err(e) => e,
        }
    }

    /// Delete every post of a user, then every comment the user wrote.
    ///
    /// Returns the number of posts removed.
    pub async fn delete_all_by_user(&self, user_id: &str) -> AppResult<u64> {
        let deleted = collapse_bulk_failure(
            "delete_posts_by_user",
            self.post_repo.delete_by_owner(user_id).await,
        )?;
        self.comment_service.delete_all_by_user(user_id).await?;

        tracing::debug!(user_id = %user_id, deleted, "Deleted user posts");
        Ok(deleted)
    }
}
