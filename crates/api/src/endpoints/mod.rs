//! API endpoints.

mod auth;
mod comments;
mod health;
mod posts;
mod replies;
mod users;

use axum::Router;
use serde::Deserialize;

use crate::middleware::AppState;

/// Create the API router. Multipart routes accept bodies up to `upload_limit` bytes.
pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/user", users::router(upload_limit))
        .nest("/post", posts::router(upload_limit))
        .nest("/comment", comments::router())
        .nest("/reply", replies::router())
        .merge(health::router())
}

/// `?limit=` for bounded listings.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}
