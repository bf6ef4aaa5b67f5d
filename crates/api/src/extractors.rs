//! Request extractors.

use agora_common::AppError;
use agora_core::Identity;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Authenticated caller of any role.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))
    }
}

/// Authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;

        if identity.is_admin() {
            Ok(Self(identity))
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}
