//! Reply service.

use std::collections::HashMap;

use agora_common::{AppError, AppResult, IdGenerator, validate_ids};
use agora_db::{
    entities::reply,
    repositories::{CommentRepository, ReplyRepository},
};
use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::services::cascade::collapse_bulk_failure;
use crate::services::{comment::append_reply_to, resolve_limit};

/// Input for creating a reply.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyInput {
    pub post_id: String,
    pub comment_id: String,
    #[validate(length(min = 1, max = 3000))]
    pub content: String,
}

/// Input for editing a reply.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateReplyInput {
    #[validate(length(min = 1, max = 3000))]
    pub content: String,
}

/// Reply service for business logic.
#[derive(Clone)]
pub struct ReplyService {
    reply_repo: ReplyRepository,
    comment_repo: CommentRepository,
    id_gen: IdGenerator,
}

impl ReplyService {
    /// Create a new reply service.
    #[must_use]
    pub const fn new(reply_repo: ReplyRepository, comment_repo: CommentRepository) -> Self {
        Self {
            reply_repo,
            comment_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a reply and append it to its comment's reply list.
    ///
    /// The reply is stored first. If the append fails the error is returned and the
    /// reply stays stored.
    pub async fn create(&self, owner_id: &str, input: CreateReplyInput) -> AppResult<reply::Model> {
        input.validate()?;
        validate_ids(&[owner_id, input.post_id.as_str(), input.comment_id.as_str()])?;

        let model = reply::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(input.post_id),
            comment_id: Set(input.comment_id.clone()),
            reply_owner_id: Set(owner_id.to_string()),
            content: Set(input.content),
            like_total: Set(0),
            like_users: Set(json!([])),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let reply = self.reply_repo.create(model).await?;

        if let Err(e) = append_reply_to(&self.comment_repo, &input.comment_id, &reply.id).await {
            tracing::warn!(
                error = %e,
                reply_id = %reply.id,
                comment_id = %input.comment_id,
                "Reply stored but not appended to comment"
            );
            return Err(e);
        }

        tracing::info!(reply_id = %reply.id, comment_id = %reply.comment_id, "Created reply");
        Ok(reply)
    }

    /// List at most `limit` replies of a comment.
    pub async fn list_by_comment(
        &self,
        comment_id: &str,
        limit: Option<u64>,
    ) -> AppResult<Vec<reply::Model>> {
        validate_ids(&[comment_id])?;
        self.reply_repo
            .find_by_comment(comment_id, resolve_limit(limit))
            .await
    }

    /// Replies of several comments, grouped by comment id.
    pub async fn list_by_comments(
        &self,
        comment_ids: &[String],
    ) -> AppResult<HashMap<String, Vec<reply::Model>>> {
        let replies = self.reply_repo.find_by_comments(comment_ids).await?;

        let mut grouped: HashMap<String, Vec<reply::Model>> = HashMap::new();
        for reply in replies {
            grouped.entry(reply.comment_id.clone()).or_default().push(reply);
        }
        Ok(grouped)
    }

    /// List every reply.
    pub async fn list_all(&self) -> AppResult<Vec<reply::Model>> {
        self.reply_repo.find_all().await
    }

    /// Edit a reply owned by `owner_id`.
    pub async fn update(
        &self,
        reply_id: &str,
        owner_id: &str,
        input: UpdateReplyInput,
    ) -> AppResult<reply::Model> {
        input.validate()?;
        validate_ids(&[reply_id, owner_id])?;

        let reply = self
            .reply_repo
            .find_owned(reply_id, owner_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(
                    "You are not authorized to edit this reply or it does not exist".to_string(),
                )
            })?;

        let mut active: reply::ActiveModel = reply.into();
        active.content = Set(input.content);
        active.updated_at = Set(Some(Utc::now().into()));

        self.reply_repo.update(active).await
    }

    /// Delete a reply owned by `owner_id`. Returns the deleted reply.
    pub async fn delete(&self, reply_id: &str, owner_id: &str) -> AppResult<reply::Model> {
        validate_ids(&[reply_id, owner_id])?;

        let reply = self
            .reply_repo
            .find_owned(reply_id, owner_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(
                    "You are not authorized to delete this reply or it does not exist".to_string(),
                )
            })?;

        self.reply_repo.delete(reply_id).await?;

        tracing::info!(reply_id = %reply_id, "Deleted reply");
        Ok(reply)
    }

    /// Like a reply.
    pub async fn like(&self, reply_id: &str, user_id: &str) -> AppResult<reply::Model> {
        validate_ids(&[reply_id, user_id])?;

        match self.reply_repo.add_like(reply_id, user_id).await? {
            Some(reply) => Ok(reply),
            None => Err(self.rejected_toggle(reply_id, "Already liked this reply").await),
        }
    }

    /// Withdraw a like from a reply.
    pub async fn unlike(&self, reply_id: &str, user_id: &str) -> AppResult<reply::Model> {
        validate_ids(&[reply_id, user_id])?;

        match self.reply_repo.remove_like(reply_id, user_id).await? {
            Some(reply) => Ok(reply),
            None => Err(self.rejected_toggle(reply_id, "Already unliked this reply").await),
        }
    }

    /// Explain why a like toggle changed nothing.
    async fn rejected_toggle(&self, reply_id: &str, message: &str) -> AppError {
        match self.reply_repo.find_by_id(reply_id).await {
            Ok(Some(_)) => AppError::BadRequest(message.to_string()),
            Ok(None) => AppError::NotFound("Reply not found".to_string()),
            Err(e) => e,
        }
    }

    /// Delete every reply of a comment.
    pub async fn delete_all_by_comment(&self, comment_id: &str) -> AppResult<u64> {
        let deleted = collapse_bulk_failure(
            "delete_replies_by_comment",
            self.reply_repo.delete_by_comment(comment_id).await,
        )?;
        tracing::debug!(comment_id = %comment_id, deleted, "Deleted comment replies");
        Ok(deleted)
    }

    /// Delete every reply of the given comments.
    pub async fn delete_all_by_comments(&self, comment_ids: &[String]) -> AppResult<u64> {
        collapse_bulk_failure(
            "delete_replies_by_comments",
            self.reply_repo.delete_by_comments(comment_ids).await,
        )
    }

    /// Delete every reply under a post.
    pub async fn delete_all_by_post(&self, post_id: &str) -> AppResult<u64> {
        let deleted = collapse_bulk_failure(
            "delete_replies_by_post",
            self.reply_repo.delete_by_post(post_id).await,
        )?;
        tracing::debug!(post_id = %post_id, deleted, "Deleted post replies");
        Ok(deleted)
    }
}
