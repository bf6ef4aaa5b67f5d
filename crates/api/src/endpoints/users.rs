//! User endpoints.

use agora_common::{AppError, AppResult};
use agora_core::{CreateUserInput, PublicUser, UpdateUserInput};
use agora_db::entities::user::{Privacy, Role};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
};

use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::ApiResponse,
    upload::MultipartForm,
};

fn parse_privacy(value: &str) -> AppResult<Privacy> {
    match value {
        "public" => Ok(Privacy::Public),
        "private" => Ok(Privacy::Private),
        other => Err(AppError::BadRequest(format!("Unknown privacy mode: {other}"))),
    }
}

/// Register a user from a multipart form.
///
/// Fields: `username`, `email`, `password`, optional `bio`, `privacy` and an
/// `avatar` file. New accounts always get the `user` role.
async fn create(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<PublicUser>> {
    let mut form = MultipartForm::read(multipart).await?;

    let input = CreateUserInput {
        username: form.text_or_empty("username"),
        email: form.text_or_empty("email"),
        password: form.text_or_empty("password"),
        bio: form.text("bio").map(ToString::to_string),
        privacy: form.text("privacy").map(parse_privacy).transpose()?,
    };
    let avatar = form.take_files(&["avatar"]).into_iter().next();

    let user = state.user_service.create(input, avatar, Role::User).await?;
    Ok(ApiResponse::created(user))
}

/// List every user.
async fn list_all(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PublicUser>>> {
    let users = state.user_service.list_all().await?;
    Ok(ApiResponse::ok(users))
}

/// Look a user up by username or email.
async fn search(
    AuthUser(_caller): AuthUser,
    State(state): State<AppState>,
    Path(keyword): Path<String>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state.user_service.search(&keyword).await?;
    Ok(ApiResponse::ok(user))
}

/// Update the caller's own profile.
async fn update(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserInput>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state.user_service.update(&caller.user_id, req).await?;
    Ok(ApiResponse::ok(user))
}

/// Delete the caller's account and everything they posted.
async fn delete(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state.user_service.delete(&caller.user_id).await?;
    Ok(ApiResponse::ok(user))
}

/// Follow a user.
async fn follow(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(target_id): Path<String>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state
        .user_service
        .follow(&caller.user_id, &target_id)
        .await?;
    Ok(ApiResponse::ok(user))
}

/// Unfollow a user.
async fn unfollow(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(target_id): Path<String>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state
        .user_service
        .unfollow(&caller.user_id, &target_id)
        .await?;
    Ok(ApiResponse::ok(user))
}

pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(create)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(list_all)
                .patch(update)
                .delete(delete),
        )
        .route("/username/{keyword}", get(search))
        .route("/follow/userId/{id}", post(follow))
        .route("/unfollow/userId/{id}", post(unfollow))
}
