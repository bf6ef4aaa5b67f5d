//! HTTP API layer for agora.
//!
//! - **Endpoints**: users, posts, comments, replies and login under `/api`
//! - **Extractors**: authenticated and admin callers
//! - **Middleware**: bearer token decoding
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod upload;

pub use endpoints::router;

use axum::{Router, middleware::from_fn_with_state};

use crate::middleware::{AppState, auth_middleware};

/// The API router nested under `/api`, with token decoding applied.
///
/// `upload_limit` is the body limit of the multipart routes; every other route keeps
/// axum's default. Transport layers (tracing, CORS) are left to the caller.
pub fn app(state: AppState, upload_limit: usize) -> Router {
    Router::new()
        .nest("/api", router(upload_limit))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
