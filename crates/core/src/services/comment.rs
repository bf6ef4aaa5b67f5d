//! Comment service.

use agora_common::{AppError, AppResult, IdGenerator, validate_ids};
use agora_db::{
    entities::{comment, reply},
    repositories::CommentRepository,
};
use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::services::cascade::{Cascade, collapse_bulk_failure};
use crate::services::{ReplyService, resolve_limit};

/// Input for creating a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    pub post_id: String,
    #[validate(length(min = 1, max = 3000))]
    pub content: String,
}

/// Input for editing a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCommentInput {
    #[validate(length(min = 1, max = 3000))]
    pub content: String,
}

/// A comment together with its replies.
#[derive(Debug, Clone)]
pub struct CommentWithReplies {
    pub comment: comment::Model,
    pub replies: Vec<reply::Model>,
}

/// Append `reply_id` to a comment's cached reply list.
///
/// Shared by [`CommentService::append_reply`] and reply creation.
pub(crate) async fn append_reply_to(
    repo: &CommentRepository,
    comment_id: &str,
    reply_id: &str,
) -> AppResult<comment::Model> {
    repo.append_reply(comment_id, reply_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    reply_service: ReplyService,
    sweep_replies: bool,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository, reply_service: ReplyService) -> Self {
        Self {
            comment_repo,
            reply_service,
            sweep_replies: false,
            id_gen: IdGenerator::new(),
        }
    }

    /// Also delete replies when comments are removed in bulk.
    pub fn set_sweep_replies(&mut self, sweep: bool) {
        self.sweep_replies = sweep;
    }

    /// Create a comment on a post.
    pub async fn create(
        &self,
        owner_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        validate_ids(&[owner_id, input.post_id.as_str()])?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(input.post_id),
            comment_owner_id: Set(owner_id.to_string()),
            content: Set(input.content),
            like_total: Set(0),
            like_users: Set(json!([])),
            reply_ids: Set(json!([])),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let comment = self.comment_repo.create(model).await?;
        tracing::info!(comment_id = %comment.id, post_id = %comment.post_id, "Created comment");
        Ok(comment)
    }

    /// List at most `limit` comments of a post.
    pub async fn list_by_post(
        &self,
        post_id: &str,
        limit: Option<u64>,
    ) -> AppResult<Vec<comment::Model>> {
        validate_ids(&[post_id])?;
        self.comment_repo
            .find_by_post(post_id, resolve_limit(limit))
            .await
    }

    /// Get a comment by ID.
    pub async fn get_by_id(&self, comment_id: &str) -> AppResult<comment::Model> {
        validate_ids(&[comment_id])?;
        self.comment_repo
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    /// List every comment with its replies, read from the reply table.
    pub async fn list_all(&self) -> AppResult<Vec<CommentWithReplies>> {
        let comments = self.comment_repo.find_all().await?;
        let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        let mut replies = self.reply_service.list_by_comments(&ids).await?;

        Ok(comments
            .into_iter()
            .map(|comment| CommentWithReplies {
                replies: replies.remove(&comment.id).unwrap_or_default(),
                comment,
            })
            .collect())
    }

    /// Edit a comment owned by `owner_id`.
    pub async fn update(
        &self,
        comment_id: &str,
        owner_id: &str,
        input: UpdateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        validate_ids(&[comment_id, owner_id])?;

        let comment = self
            .comment_repo
            .find_owned(comment_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        let mut active: comment::ActiveModel = comment.into();
        active.content = Set(input.content);
        active.updated_at = Set(Some(Utc::now().into()));

        self.comment_repo.update(active).await
    }

    /// Delete a comment owned by `owner_id` along with its replies.
    pub async fn delete(&self, comment_id: &str, owner_id: &str) -> AppResult<comment::Model> {
        validate_ids(&[comment_id, owner_id])?;

        let comment = self
            .comment_repo
            .find_owned(comment_id, owner_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(
                    "You are not authorized to delete this comment or it does not exist"
                        .to_string(),
                )
            })?;

        let mut cascade = Cascade::new("comment", comment_id);
        cascade
            .step(
                "replies",
                self.reply_service.delete_all_by_comment(comment_id),
            )
            .await?;
        cascade.step("comment", self.comment_repo.delete(comment_id)).await?;

        tracing::info!(comment_id = %comment_id, "Deleted comment");
        Ok(comment)
    }

    /// Append a reply to a comment's reply list.
    pub async fn append_reply(
        &self,
        comment_id: &str,
        reply_id: &str,
    ) -> AppResult<comment::Model> {
        validate_ids(&[comment_id, reply_id])?;
        append_reply_to(&self.comment_repo, comment_id, reply_id).await
    }

    /// Like a comment.
    pub async fn like(&self, comment_id: &str, user_id: &str) -> AppResult<comment::Model> {
        validate_ids(&[comment_id, user_id])?;

        match self.comment_repo.add_like(comment_id, user_id).await? {
            Some(comment) => Ok(comment),
            None => Err(self
                .rejected_toggle(comment_id, "Already liked this comment")
                .await),
        }
    }

    /// Withdraw a like from a comment.
    pub async fn unlike(&self, comment_id: &str, user_id: &str) -> AppResult<comment::Model> {
        validate_ids(&[comment_id, user_id])?;

        match self.comment_repo.remove_like(comment_id, user_id).await? {
            Some(comment) => Ok(comment),
            None => Err(self
                .rejected_toggle(comment_id, "You already unliked this comment")
                .await),
        }
    }

    async fn rejected_toggle(&self, comment_id: &str, message: &str) -> AppError {
        match self.comment_repo.find_by_id(comment_id).await {
            Ok(Some(_)) => AppError::BadRequest(message.to_string()),
            Ok(None) => AppError::NotFound("Comment not found".to_string()),
            Err(e) => e,
        }
    }

    /// Delete every comment of a post.
    pub async fn delete_all_by_post(&self, post_id: &str) -> AppResult<u64> {
        if self.sweep_replies {
            let ids = collapse_bulk_failure(
                "find_comments_by_post",
                self.comment_repo.find_ids_by_post(post_id).await,
            )?;
            self.reply_service.delete_all_by_comments(&ids).await?;
        }

        let deleted = collapse_bulk_failure(
            "delete_comments_by_post",
            self.comment_repo.delete_by_post(post_id).await,
        )?;
        tracing::debug!(post_id = %post_id, deleted, "Deleted post comments");
        Ok(deleted)
    }

    /// Delete every comment written by a user.
    pub async fn delete_all_by_user(&self, user_id: &str) -> AppResult<u64> {
        if self.sweep_replies {
            let ids = collapse_bulk_failure(
                "find_comments_by_user",
                self.comment_repo.find_ids_by_owner(user_id).await,
            )?;
            self.reply_service.delete_all_by_comments(&ids).await?;
        }

        let deleted = collapse_bulk_failure(
            "delete_comments_by_user",
            self.comment_repo.delete_by_owner(user_id).await,
        )?;
        tracing::debug!(user_id = %user_id, deleted, "Deleted user comments");
        Ok(deleted)
    }
}
