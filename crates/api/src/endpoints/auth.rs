//! Authentication endpoints.

use agora_common::AppResult;
use agora_core::AccessToken;
use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use validator::Validate;

use crate::{middleware::AppState, response::ApiResponse};

/// Login request. `identifier` is a username or an email.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    #[validate(length(min = 1))]
    pub identifier: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Exchange credentials for an access token.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<AccessToken>> {
    req.validate()?;

    let token = state
        .auth_service
        .login(&req.identifier, &req.password)
        .await?;

    Ok(ApiResponse::ok(token))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}
