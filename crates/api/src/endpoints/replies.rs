//! Reply endpoints.

use agora_common::AppResult;
use agora_core::{CounterSetView, CreateReplyInput, UpdateReplyInput};
use agora_db::entities::reply;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use serde::Serialize;

use super::LimitQuery;
use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Reply response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResponse {
    pub id: String,
    pub post_id: String,
    pub comment_id: String,
    pub reply_owner_id: String,
    pub content: String,
    pub like: CounterSetView,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<reply::Model> for ReplyResponse {
    fn from(r: reply::Model) -> Self {
        Self {
            like: CounterSetView::new(r.like_total, &r.like_users),
            id: r.id,
            post_id: r.post_id,
            comment_id: r.comment_id,
            reply_owner_id: r.reply_owner_id,
            content: r.content,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

fn many(replies: Vec<reply::Model>) -> Vec<ReplyResponse> {
    replies.into_iter().map(ReplyResponse::from).collect()
}

/// List every reply.
async fn list_all(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ReplyResponse>>> {
    let replies = state.reply_service.list_all().await?;
    Ok(ApiResponse::ok(many(replies)))
}

/// List the replies of a comment.
async fn list_by_comment(
    AuthUser(_caller): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<ApiResponse<Vec<ReplyResponse>>> {
    let replies = state
        .reply_service
        .list_by_comment(&comment_id, query.limit)
        .await?;
    Ok(ApiResponse::ok(many(replies)))
}

/// Reply to a comment.
async fn create(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateReplyInput>,
) -> AppResult<ApiResponse<ReplyResponse>> {
    let reply = state.reply_service.create(&caller.user_id, req).await?;
    Ok(ApiResponse::created(reply.into()))
}

/// Edit one of the caller's replies.
async fn update(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateReplyInput>,
) -> AppResult<ApiResponse<ReplyResponse>> {
    let reply = state
        .reply_service
        .update(&id, &caller.user_id, req)
        .await?;
    Ok(ApiResponse::ok(reply.into()))
}

/// Delete one of the caller's replies.
async fn delete(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReplyResponse>> {
    let reply = state.reply_service.delete(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(reply.into()))
}

/// Like a reply.
async fn like(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReplyResponse>> {
    let reply = state.reply_service.like(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(reply.into()))
}

/// Withdraw a like.
async fn unlike(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReplyResponse>> {
    let reply = state.reply_service.unlike(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(reply.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/all", get(list_all))
        .route("/commentId/{id}", get(list_by_comment))
        .route("/{id}", patch(update).delete(delete))
        .route("/like/replyId/{id}", post(like))
        .route("/unlike/replyId/{id}", post(unlike))
}
