//! API middleware.

#![allow(missing_docs)]

use agora_core::{AuthService, CommentService, PostService, ReplyService, UserService};
use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub reply_service: ReplyService,
    pub auth_service: AuthService,
}

/// Authentication middleware.
///
/// A valid bearer token puts its [`agora_core::Identity`] into the request
/// extensions. Missing or invalid tokens are left for the extractors to reject.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    if let Some(token) = token {
        match state.auth_service.verify_token(&token) {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring bearer token"),
        }
    }

    next.run(req).await
}
