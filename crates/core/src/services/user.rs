//! User service.

use agora_common::{AppError, AppResult, IdGenerator, validate_ids};
use agora_db::{
    entities::{
        id_list,
        user::{self, Privacy, Role},
    },
    repositories::UserRepository,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::services::cascade::Cascade;
use crate::services::media::{MediaFile, MediaGateway};
use crate::services::{CounterSetView, PostService};

/// Input for registering a user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub privacy: Option<Privacy>,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 50))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub privacy: Option<Privacy>,
}

/// A user as returned to clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub privacy: Privacy,
    pub role: Role,
    pub followers: CounterSetView,
    pub followings: CounterSetView,
    pub posts: Vec<String>,
    pub saved_posts: Vec<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl From<user::Model> for PublicUser {
    fn from(user: user::Model) -> Self {
        Self {
            followers: CounterSetView::new(user.followers_total, &user.followers_users),
            followings: CounterSetView::new(user.followings_total, &user.followings_users),
            posts: id_list(&user.posts),
            saved_posts: id_list(&user.saved_posts),
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            avatar: user.avatar,
            privacy: user.privacy,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    post_service: PostService,
    media: MediaGateway,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        post_service: PostService,
        media: MediaGateway,
    ) -> Self {
        Self {
            user_repo,
            post_service,
            media,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user.
    ///
    /// Fails with `Conflict` when the username or the email is already taken.
    pub async fn create(
        &self,
        input: CreateUserInput,
        avatar: Option<MediaFile>,
        role: Role,
    ) -> AppResult<PublicUser> {
        input.validate()?;

        if self
            .user_repo
            .find_conflicting(&input.username, &input.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let id = self.id_gen.generate();

        let avatar = match avatar {
            Some(file) => self
                .media
                .upload(&format!("users/{id}/avatar"), vec![file])
                .await?,
            None => Vec::new(),
        };

        let model = user::ActiveModel {
            id: Set(id),
            username: Set(input.username),
            email: Set(input.email),
            password: Set(password_hash),
            bio: Set(input.bio),
            avatar: Set(avatar.first().map(|m| m.url.clone())),
            privacy: Set(input.privacy.unwrap_or_default()),
            role: Set(role),
            followers_total: Set(0),
            followers_users: Set(json!([])),
            followings_total: Set(0),
            followings_users: Set(json!([])),
            posts: Set(json!([])),
            saved_posts: Set(json!([])),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = match self.user_repo.create(model).await {
            Ok(user) => user,
            Err(e) => {
                self.media.discard(&avatar).await;
                return Err(e);
            }
        };
        tracing::info!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user.into())
    }

    /// Find a user by username or email.
    pub async fn search(&self, term: &str) -> AppResult<PublicUser> {
        self.get_full_info(term).await.map(PublicUser::from)
    }

    /// Find a user by username or email, including the password hash.
    ///
    /// Only for credential checks. Never return this model to a client.
    pub async fn get_full_info(&self, term: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username_or_email(term)
            .await?
            .ok_or_else(|| AppError::NotFound("User doesn't exist".to_string()))
    }

    /// List every user.
    pub async fn list_all(&self) -> AppResult<Vec<PublicUser>> {
        let users = self.user_repo.find_all().await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    /// Apply a partial profile update.
    pub async fn update(&self, user_id: &str, input: UpdateUserInput) -> AppResult<PublicUser> {
        input.validate()?;
        validate_ids(&[user_id])?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User doesn't exist".to_string()))?;

        if input.username.is_some() || input.email.is_some() {
            let username = input.username.as_deref().unwrap_or(&user.username);
            let email = input.email.as_deref().unwrap_or(&user.email);
            let taken = self
                .user_repo
                .find_conflicting(username, email)
                .await?
                .is_some_and(|other| other.id != user.id);
            if taken {
                return Err(AppError::Conflict("User already exists".to_string()));
            }
        }

        let mut active: user::ActiveModel = user.into();

        if let Some(username) = input.username {
            active.username = Set(username);
        }
        if let Some(email) = input.email {
            active.email = Set(email);
        }
        if let Some(password) = input.password {
            active.password = Set(hash_password(&password)?);
        }
        if let Some(bio) = input.bio {
            active.bio = Set(Some(bio));
        }
        if let Some(privacy) = input.privacy {
            active.privacy = Set(privacy);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let user = self.user_repo.update(active).await?;
        tracing::info!(user_id = %user.id, "Updated user");
        Ok(user.into())
    }

    /// Delete a user and everything they posted.
    pub async fn delete(&self, user_id: &str) -> AppResult<PublicUser> {
        validate_ids(&[user_id])?;

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User doesn't exist".to_string()))?;

        let mut cascade = Cascade::new("user", user_id);
        cascade
            .step("posts", self.post_service.delete_all_by_user(user_id))
            .await?;
        cascade.step("user", self.user_repo.delete(user_id)).await?;

        tracing::info!(user_id = %user_id, "Deleted user");
        Ok(user.into())
    }

    /// Make `requester_id` follow `target_id`. Returns the updated requester.
    ///
    /// The requester's followings are updated first; that conditional update is also the
    /// duplicate check. If the target's followers cannot be updated, the first step is
    /// reverted.
    pub async fn follow(&self, requester_id: &str, target_id: &str) -> AppResult<PublicUser> {
        self.check_follow_pair(requester_id, target_id).await?;

        let requester = self
            .user_repo
            .add_following(requester_id, target_id)
            .await?
            .ok_or_else(|| AppError::Conflict("Already follow this user".to_string()))?;

        match self.user_repo.add_follower(target_id, requester_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                if self.user_repo.find_by_id(target_id).await?.is_none() {
                    self.revert_following(requester_id, target_id, true).await;
                    return Err(AppError::NotFound("User doesn't exist".to_string()));
                }
                tracing::warn!(
                    requester_id = %requester_id,
                    target_id = %target_id,
                    "Target already listed the requester as follower"
                );
            }
            Err(e) => {
                self.revert_following(requester_id, target_id, true).await;
                return Err(e);
            }
        }

        tracing::info!(requester_id = %requester_id, target_id = %target_id, "Followed user");
        Ok(requester.into())
    }

    /// Make `requester_id` stop following `target_id`. Returns the updated requester.
    pub async fn unfollow(&self, requester_id: &str, target_id: &str) -> AppResult<PublicUser> {
        self.check_follow_pair(requester_id, target_id).await?;

        let requester = self
            .user_repo
            .remove_following(requester_id, target_id)
            .await?
            .ok_or_else(|| AppError::Conflict("Already unfollow this user".to_string()))?;

        match self.user_repo.remove_follower(target_id, requester_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                if self.user_repo.find_by_id(target_id).await?.is_none() {
                    self.revert_following(requester_id, target_id, false).await;
                    return Err(AppError::NotFound("User doesn't exist".to_string()));
                }
                tracing::warn!(
                    requester_id = %requester_id,
                    target_id = %target_id,
                    "Target did not list the requester as follower"
                );
            }
            Err(e) => {
                self.revert_following(requester_id, target_id, false).await;
                return Err(e);
            }
        }

        tracing::info!(requester_id = %requester_id, target_id = %target_id, "Unfollowed user");
        Ok(requester.into())
    }

    async fn check_follow_pair(&self, requester_id: &str, target_id: &str) -> AppResult<()> {
        validate_ids(&[requester_id, target_id])?;

        if requester_id == target_id {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }
        if self.user_repo.find_by_id(requester_id).await?.is_none() {
            return Err(AppError::NotFound("Request user not found".to_string()));
        }
        if self.user_repo.find_by_id(target_id).await?.is_none() {
            return Err(AppError::NotFound("User doesn't exist".to_string()));
        }
        Ok(())
    }

    /// Undo step one of a follow (`followed == true`) or an unfollow.
    async fn revert_following(&self, requester_id: &str, target_id: &str, followed: bool) {
        let result = if followed {
            self.user_repo.remove_following(requester_id, target_id).await
        } else {
            self.user_repo.add_following(requester_id, target_id).await
        };

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                requester_id = %requester_id,
                target_id = %target_id,
                "Failed to revert followings; follow graph is asymmetric"
            );
        }
    }
}

/// Hash a password using Argon2.
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use agora_db::repositories::{CommentRepository, PostRepository, ReplyRepository};
    use agora_db::test_utils::fixtures;
    use bytes::Bytes;
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};

    use crate::services::{CommentService, MediaUploader, ReplyService, StoredMedia};

    const ALICE: &str = "01hx00000000000000000000a1";
    const BOB: &str = "01hx00000000000000000000b2";

    #[derive(Default)]
    struct RecordingUploader {
        folders: Mutex<Vec<String>>,
        discarded: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl MediaUploader for RecordingUploader {
        async fn upload(
            &self,
            folder: &str,
            files: Vec<MediaFile>,
        ) -> AppResult<Vec<StoredMedia>> {
            self.folders.lock().unwrap().push(folder.to_string());
            Ok(files
                .iter()
                .map(|f| StoredMedia {
                    key: format!("{folder}/{}", f.file_name),
                    url: format!("https://cdn.test/{folder}/{}", f.file_name),
                })
                .collect())
        }

        async fn discard(&self, media: &[StoredMedia]) {
            self.discarded
                .lock()
                .unwrap()
                .extend(media.iter().map(|m| m.key.clone()));
        }
    }

    fn log_of(db: Arc<DatabaseConnection>) -> Vec<String> {
        Arc::try_unwrap(db)
            .ok()
            .unwrap()
            .into_transaction_log()
            .iter()
            .map(|t| format!("{t:?}"))
            .collect()
    }

    fn mock() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn service_with(db: &Arc<DatabaseConnection>, media: MediaGateway) -> UserService {
        let replies = ReplyService::new(
            ReplyRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
        );
        let comments = CommentService::new(CommentRepository::new(db.clone()), replies);
        let posts = PostService::new(PostRepository::new(db.clone()), comments, media.clone());
        UserService::new(UserRepository::new(db.clone()), posts, media)
    }

    fn service(db: &Arc<DatabaseConnection>) -> UserService {
        service_with(db, Arc::new(RecordingUploader::default()))
    }

    fn following(mut user: user::Model, target: &str) -> user::Model {
        user.followings_total = 1;
        user.followings_users = json!([target]);
        user
    }

    fn followed_by(mut user: user::Model, follower: &str) -> user::Model {
        user.followers_total = 1;
        user.followers_users = json!([follower]);
        user
    }

    fn input(username: &str, email: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct horse battery".to_string(),
            bio: None,
            privacy: None,
        }
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_public_user_hides_password() {
        let public = PublicUser::from(following(fixtures::user(ALICE, "alice"), BOB));
        let body = serde_json::to_value(&public).unwrap();

        assert!(body.get("password").is_none());
        assert_eq!(body["followings"]["total"], 1);
        assert_eq!(body["followings"]["users"][0], BOB);
        assert_eq!(body["savedPosts"], json!([]));
        assert_eq!(body["privacy"], "public");
    }

    #[tokio::test]
    async fn test_create_with_taken_email_is_conflict() {
        let db = Arc::new(
            mock()
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .into_connection(),
        );

        let err = service(&db)
            .create(input("someone-new", "bob@example.com"), None, Role::User)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(ref m) if m == "User already exists"));
    }

    #[tokio::test]
    async fn test_create_uploads_avatar() {
        let mut stored = fixtures::user(ALICE, "alice");
        stored.avatar = Some("https://cdn.test/avatar.png".to_string());

        let db = Arc::new(
            mock()
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[stored]])
                .into_connection(),
        );
        let uploader = Arc::new(RecordingUploader::default());
        let avatar = MediaFile::new("me.png", "image/png", Bytes::from_static(b"\x89PNG"));

        let user = service_with(&db, uploader.clone())
            .create(input("alice", "alice@example.com"), Some(avatar), Role::User)
            .await
            .unwrap();

        assert_eq!(user.role, Role::User);
        assert!(user.avatar.is_some());

        let folders = uploader.folders.lock().unwrap();
        assert_eq!(folders.len(), 1);
        assert!(folders[0].starts_with("users/") && folders[0].ends_with("/avatar"));
    }

    #[tokio::test]
    async fn test_create_discards_avatar_when_insert_fails() {
        let db = Arc::new(
            mock()
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );
        let uploader = Arc::new(RecordingUploader::default());
        let avatar = MediaFile::new("me.png", "image/png", Bytes::from_static(b"\x89PNG"));

        let err = service_with(&db, uploader.clone())
            .create(input("alice", "alice@example.com"), Some(avatar), Role::User)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        let discarded = uploader.discarded.lock().unwrap();
        assert_eq!(discarded.len(), 1);
        assert!(discarded[0].ends_with("/avatar/me.png"));
    }

    #[tokio::test]
    async fn test_create_rejects_short_password() {
        let db = Arc::new(mock().into_connection());
        let mut bad = input("alice", "alice@example.com");
        bad.password = "short".to_string();

        let err = service(&db).create(bad, None, Role::User).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_missing_user() {
        let db = Arc::new(
            mock()
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let err = service(&db).search("nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "User doesn't exist"));
    }

    #[tokio::test]
    async fn test_update_to_taken_username_is_conflict() {
        let db = Arc::new(
            mock()
                .append_query_results([[fixtures::user(ALICE, "alice")]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .into_connection(),
        );

        let err = service(&db)
            .update(
                ALICE,
                UpdateUserInput {
                    username: Some("bob".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_bio() {
        let alice = fixtures::user(ALICE, "alice");
        let mut updated = alice.clone();
        updated.bio = Some("hello".to_string());

        let db = Arc::new(
            mock()
                .append_query_results([[alice]])
                .append_query_results([[updated]])
                .into_connection(),
        );

        let user = service(&db)
            .update(
                ALICE,
                UpdateUserInput {
                    bio: Some("hello".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(user.bio.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_delete_cascades_posts_then_user() {
        let db = Arc::new(
            mock()
                .append_query_results([[fixtures::user(ALICE, "alice")]])
                .append_exec_results([exec(2), exec(3), exec(1)])
                .into_connection(),
        );

        let svc = service(&db);
        assert_eq!(svc.delete(ALICE).await.unwrap().id, ALICE);
        drop(svc);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 4);
        assert!(format!("{:?}", log[1]).contains(r#"DELETE FROM \"post\""#));
        assert!(format!("{:?}", log[2]).contains(r#"DELETE FROM \"comment\""#));
        assert!(format!("{:?}", log[3]).contains(r#"DELETE FROM \"user\""#));
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let db = Arc::new(
            mock()
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let err = service(&db).delete(ALICE).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_follow_updates_both_sides() {
        let alice = fixtures::user(ALICE, "alice");
        let bob = fixtures::user(BOB, "bob");

        let db = Arc::new(
            mock()
                .append_query_results([[alice.clone()]])
                .append_query_results([[bob.clone()]])
                .append_query_results([[following(alice, BOB)]])
                .append_query_results([[followed_by(bob, ALICE)]])
                .into_connection(),
        );

        let requester = service(&db).follow(ALICE, BOB).await.unwrap();
        assert_eq!(requester.followings.total, 1);
        assert_eq!(requester.followings.users, vec![BOB]);
    }

    #[tokio::test]
    async fn test_follow_twice_is_conflict() {
        let db = Arc::new(
            mock()
                .append_query_results([[fixtures::user(ALICE, "alice")]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let svc = service(&db);
        let err = svc.follow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Already follow this user"));
        drop(svc);

        // No follower update after a rejected first step.
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_follow_reverts_when_second_step_fails() {
        let alice = fixtures::user(ALICE, "alice");

        let db = Arc::new(
            mock()
                .append_query_results([[alice.clone()]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .append_query_results([[following(alice.clone(), BOB)]])
                .append_query_errors([DbErr::Custom("connection reset".to_string())])
                .append_query_results([[alice]])
                .into_connection(),
        );

        let svc = service(&db);
        let err = svc.follow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        drop(svc);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 5);
        assert!(format!("{:?}", log[4]).contains("GREATEST"));
    }

    #[tokio::test]
    async fn test_follow_reverts_when_target_vanishes() {
        let alice = fixtures::user(ALICE, "alice");

        let db = Arc::new(
            mock()
                .append_query_results([[alice.clone()]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .append_query_results([[following(alice.clone(), BOB)]])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[alice]])
                .into_connection(),
        );

        let svc = service(&db);
        let err = svc.follow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "User doesn't exist"));
        drop(svc);

        let log = log_of(db);
        assert_eq!(log.len(), 6);
        assert!(log[5].contains(r#"GREATEST(\"followings_total\" - 1, 0)"#));
    }

    #[tokio::test]
    async fn test_follow_tolerates_follower_already_listed() {
        let alice = fixtures::user(ALICE, "alice");
        let bob = fixtures::user(BOB, "bob");

        let db = Arc::new(
            mock()
                .append_query_results([[alice.clone()]])
                .append_query_results([[bob.clone()]])
                .append_query_results([[following(alice, BOB)]])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[followed_by(bob, ALICE)]])
                .into_connection(),
        );

        let svc = service(&db);
        let requester = svc.follow(ALICE, BOB).await.unwrap();
        assert_eq!(requester.followings.users, vec![BOB]);
        drop(svc);

        // No revert after the drift check.
        let log = log_of(db);
        assert_eq!(log.len(), 5);
        assert!(!log[4].contains("GREATEST"));
    }

    #[tokio::test]
    async fn test_unfollow_reverts_when_second_step_fails() {
        let alice = fixtures::user(ALICE, "alice");

        let db = Arc::new(
            mock()
                .append_query_results([[alice.clone()]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .append_query_results([[alice.clone()]])
                .append_query_errors([DbErr::Custom("connection reset".to_string())])
                .append_query_results([[following(alice, BOB)]])
                .into_connection(),
        );

        let svc = service(&db);
        let err = svc.unfollow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        drop(svc);

        let log = log_of(db);
        assert_eq!(log.len(), 5);
        assert!(log[4].contains(r#"\"followings_users\" || jsonb_build_array"#));
    }

    #[tokio::test]
    async fn test_unfollow_reverts_when_target_vanishes() {
        let alice = fixtures::user(ALICE, "alice");

        let db = Arc::new(
            mock()
                .append_query_results([[alice.clone()]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .append_query_results([[alice.clone()]])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[following(alice, BOB)]])
                .into_connection(),
        );

        let svc = service(&db);
        let err = svc.unfollow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "User doesn't exist"));
        drop(svc);

        let log = log_of(db);
        assert_eq!(log.len(), 6);
        assert!(log[5].contains(r#"\"followings_users\" || jsonb_build_array"#));
    }

    #[tokio::test]
    async fn test_follow_self_is_rejected() {
        let db = Arc::new(mock().into_connection());

        let err = service(&db).follow(ALICE, ALICE).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Cannot follow yourself"));
    }

    #[tokio::test]
    async fn test_follow_missing_requester() {
        let db = Arc::new(
            mock()
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let err = service(&db).follow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Request user not found"));
    }

    #[tokio::test]
    async fn test_unfollow_without_follow_is_conflict() {
        let db = Arc::new(
            mock()
                .append_query_results([[fixtures::user(ALICE, "alice")]])
                .append_query_results([[fixtures::user(BOB, "bob")]])
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let err = service(&db).unfollow(ALICE, BOB).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Already unfollow this user"));
    }

    #[tokio::test]
    async fn test_unfollow_restores_counters() {
        let alice = fixtures::user(ALICE, "alice");
        let bob = fixtures::user(BOB, "bob");

        let db = Arc::new(
            mock()
                .append_query_results([[following(alice.clone(), BOB)]])
                .append_query_results([[followed_by(bob.clone(), ALICE)]])
                .append_query_results([[alice]])
                .append_query_results([[bob]])
                .into_connection(),
        );

        let requester = service(&db).unfollow(ALICE, BOB).await.unwrap();
        assert_eq!(requester.followings.total, 0);
        assert!(requester.followings.users.is_empty());
    }
}
