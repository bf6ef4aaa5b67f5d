//! Post endpoints.

use agora_common::AppResult;
use agora_core::CounterSetView;
use agora_db::entities::{id_list, post};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
};
use serde::Serialize;

use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::ApiResponse,
    upload::MultipartForm,
};

/// Post response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub content: Vec<String>,
    pub post_owner_id: String,
    pub like: CounterSetView,
    pub created_at: String,
}

impl From<post::Model> for PostResponse {
    fn from(p: post::Model) -> Self {
        Self {
            content: id_list(&p.content),
            like: CounterSetView::new(p.like_total, &p.like_users),
            id: p.id,
            post_owner_id: p.post_owner_id,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

fn many(posts: Vec<post::Model>) -> Vec<PostResponse> {
    posts.into_iter().map(PostResponse::from).collect()
}

/// List every post.
async fn list_all(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state.post_service.list_all().await?;
    Ok(ApiResponse::ok(many(posts)))
}

/// List the caller's posts.
async fn list_mine(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state.post_service.list_by_owner(&caller.user_id).await?;
    Ok(ApiResponse::ok(many(posts)))
}

/// Create a post from the uploaded `files`.
async fn create(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<PostResponse>> {
    let mut form = MultipartForm::read(multipart).await?;
    let files = form.take_files(&["files", "files[]", "content"]);

    let post = state.post_service.create(&caller.user_id, files).await?;
    Ok(ApiResponse::created(post.into()))
}

/// Get a post.
async fn show(
    AuthUser(_caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.get_by_id(&id).await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Delete one of the caller's posts.
async fn delete(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.delete(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Like a post.
async fn like(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.like(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(post.into()))
}

/// Withdraw a like.
async fn unlike(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.unlike(&id, &caller.user_id).await?;
    Ok(ApiResponse::ok(post.into()))
}

pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(create)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(list_all),
        )
        .route("/user", get(list_mine))
        .route("/{id}", get(show).delete(delete))
        .route("/like/postId/{id}", post(like))
        .route("/unlike/postId/{id}", post(unlike))
}
