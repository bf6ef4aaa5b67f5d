//! Comment endpoints.

use agora_common::AppResult;
use agora_core::{CommentWithReplies, CounterSetView, CreateCommentInput, UpdateCommentInput};
use agora_db::entities::{comment, id_list};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use serde::Serialize;

use super::LimitQuery;
use super::replies::ReplyResponse;
use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Comment response. `replyIds` is the cached reply list.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub comment_owner_id: String,
    pub content: String,
    pub like: CounterSetView,
    pub reply_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<comment::Model> for CommentResponse {
    fn from(c: comment::Model) -> Self {
        Self {
            like: CounterSetView::new(c.like_total, &c.like_users),
            reply_ids: id_list(&c.reply_ids),
            id: c.id,
            post_id: c.post_id,
            comment_owner_id: c.comment_owner_id,
            content: c.content,
            created_at: c.created_at.to_rfc3339(),
            updated_at: c.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Comment with its replies.
#[derive(Serialize)]
pub struct CommentThreadResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub replies: Vec<ReplyResponse>,
}

impl From<CommentWithReplies> for CommentThreadResponse {
    fn from(thread: CommentWithReplies) -> Self {
        Self {
            comment: thread.comment.into(),
            replies: thread.replies.into_iter().map(ReplyResponse::from).collect(),
        }
    }
}

/// List every comment with its replies.
async fn list_all(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<CommentThreadResponse>>> {
    let threads = state.comment_service.list_all().await?;
    Ok(ApiResponse::ok(
        threads.into_iter().map(CommentThreadResponse::from).collect(),
    ))
}

/// List the comments of a post.
async fn list_by_post(
    AuthUser(_caller): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let comments = state
        .comment_service
        .list_by_post(&post_id, query.limit)
        .await?;
    Ok(ApiResponse::ok(
        comments.into_iter().map(CommentResponse::from).collect(),
    ))
}

/// Comment on a post.
async fn create(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.create(&caller.user_id, req).await?;
    Ok(ApiResponse::created(comment.into()))
}

/// Edit one of the caller's comments.
async fn update(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .comment_service
        .update(&id, &caller.user_id, req)
        .await?;
    Ok(ApiResponse::ok(comment.into()))
}

/// Delete one of the caller's comments and its replies.
async fn delete(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.delete(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(comment.into()))
}

/// Like a comment.
async fn like(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.like(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(comment.into()))
}

/// Withdraw a like.
async fn unlike(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state.comment_service.unlike(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(comment.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/postId/{id}", get(list_by_post))
        .route("/{id}", patch(update).delete(delete))
        .route("/like/commentId/{id}", post(like))
        .route("/unlike/commentId/{id}", post(unlike))
}
