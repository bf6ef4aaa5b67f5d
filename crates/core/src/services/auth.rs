//! Credential checks and session tokens.

use agora_common::{AppError, AppResult, config::AuthConfig};
use agora_db::entities::user::{self, Role};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::services::UserService;
use crate::services::user::{PublicUser, verify_password};

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&user::Model> for Identity {
    fn from(user: &user::Model) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct AuthService {
    user_service: UserService,
    secret: String,
    token_ttl_secs: i64,
}

impl AuthService {
    /// Create a new auth service.
    #[must_use]
    pub fn new(user_service: UserService, config: &AuthConfig) -> Self {
        Self {
            user_service,
            secret: config.jwt_secret.clone(),
            token_ttl_secs: config.token_ttl_secs,
        }
    }

    /// Check a username-or-email and password pair.
    ///
    /// An unknown identifier and a wrong password fail the same way.
    pub async fn validate_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> AppResult<Identity> {
        let invalid = || AppError::Unauthorized("Invalid Credential".to_string());

        let user = match self.user_service.get_full_info(identifier).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e),
        };

        match verify_password(secret, &user.password) {
            Ok(true) => Ok(Identity::from(&user)),
            Ok(false) => {
                tracing::debug!(user_id = %user.id, "Password mismatch");
                Err(invalid())
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user.id,
                    error = %e,
                    "Stored password hash is unreadable"
                );
                Err(invalid())
            }
        }
    }

    /// Sign a token for `identity`.
    pub fn issue_token(&self, identity: &Identity) -> AppResult<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.user_id.clone(),
            username: identity.username.clone(),
            role: identity.role,
            iat,
            exp: iat + self.token_ttl_secs,
        };

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and recover the identity it was issued for.
    pub fn verify_token(&self, token: &str) -> AppResult<Identity> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        Ok(Identity {
            user_id: data.claims.sub,
            username: data.claims.username,
            role: data.claims.role,
        })
    }

    /// Check credentials and issue a token.
    pub async fn login(&self, identifier: &str, secret: &str) -> AppResult<AccessToken> {
        let identity = self.validate_credentials(identifier, secret).await?;
        let access_token = self.issue_token(&identity)?;
        let user = self.user_service.search(&identity.username).await?;

        tracing::info!(user_id = %identity.user_id, "User logged in");
        Ok(AccessToken { access_token, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agora_db::repositories::{
        CommentRepository, PostRepository, ReplyRepository, UserRepository,
    };
    use agora_db::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};

    use crate::services::user::hash_password;
    use crate::services::{
        CommentService, MediaFile, MediaGateway, MediaUploader, PostService, ReplyService,
        StoredMedia,
    };

    const ALICE: &str = "01hx00000000000000000000a1";

    struct NoMedia;

    #[async_trait::async_trait]
    impl MediaUploader for NoMedia {
        async fn upload(
            &self,
            _folder: &str,
            _files: Vec<MediaFile>,
        ) -> AppResult<Vec<StoredMedia>> {
            Ok(Vec::new())
        }

        async fn discard(&self, _media: &[StoredMedia]) {}
    }

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
        }
    }

    fn service(db: DatabaseConnection) -> AuthService {
        let db = Arc::new(db);
        let media: MediaGateway = Arc::new(NoMedia);
        let replies = ReplyService::new(
            ReplyRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
        );
        let comments = CommentService::new(CommentRepository::new(db.clone()), replies);
        let posts = PostService::new(PostRepository::new(db.clone()), comments, media.clone());
        let users = UserService::new(UserRepository::new(db), posts, media);
        AuthService::new(users, &config())
    }

    fn alice_with_password(password: &str) -> user::Model {
        let mut alice = fixtures::user(ALICE, "alice");
        alice.password = hash_password(password).unwrap();
        alice
    }

    fn identity() -> Identity {
        Identity {
            user_id: ALICE.to_string(),
            username: "alice".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_issued_token_verifies() {
        let auth = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let token = auth.issue_token(&identity()).unwrap();
        let verified = auth.verify_token(&token).unwrap();

        assert_eq!(verified, identity());
        assert!(verified.is_admin());
    }

    #[test]
    fn test_expired_token() {
        let auth = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: ALICE.to_string(),
            username: "alice".to_string(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = auth.verify_token(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Token expired"));
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let auth = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let mut other_config = config();
        other_config.jwt_secret = "another-secret".to_string();
        let other = AuthService::new(auth.user_service.clone(), &other_config);

        let token = other.issue_token(&identity()).unwrap();

        let err = auth.verify_token(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Invalid token"));
        assert!(auth.verify_token("garbage").is_err());
    }

    #[tokio::test]
    async fn test_login() {
        let alice = alice_with_password("correct horse");
        let auth = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice.clone()]])
                .append_query_results([[alice]])
                .into_connection(),
        );

        let token = auth.login("alice@example.com", "correct horse").await.unwrap();

        assert_eq!(token.user.id, ALICE);
        assert_eq!(auth.verify_token(&token.access_token).unwrap().user_id, ALICE);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_alike() {
        let auth = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice_with_password("correct horse")]])
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let wrong = auth
            .validate_credentials("alice", "battery staple")
            .await
            .unwrap_err();
        let unknown = auth
            .validate_credentials("mallory", "battery staple")
            .await
            .unwrap_err();

        assert_eq!(wrong.to_string(), "Invalid Credential");
        assert_eq!(unknown.to_string(), "Invalid Credential");
    }

    #[tokio::test]
    async fn test_corrupt_password_hash_is_invalid_credential() {
        let mut alice = fixtures::user(ALICE, "alice");
        alice.password = "not-a-phc-string".to_string();
        let auth = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice]])
                .into_connection(),
        );

        let err = auth
            .validate_credentials("alice", "correct horse")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Invalid Credential"));
    }
}
