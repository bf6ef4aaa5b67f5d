//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `agora_test`)
//!   `TEST_DB_PASSWORD` (default: `agora_test`)
//!   `TEST_DB_NAME` (default: `agora_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use agora_db::entities::{id_list, post};
use agora_db::repositories::PostRepository;
use agora_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;

async fn seed_post(conn: &DatabaseConnection, id: &str, owner: &str) {
    post::ActiveModel {
        id: Set(id.to_string()),
        content: Set(json!(["/files/a.png"])),
        post_owner_id: Set(owner.to_string()),
        like_total: Set(0),
        like_users: Set(json!([])),
        created_at: Set(chrono::Utc::now().into()),
    }
    .insert(conn)
    .await
    .unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    let result = db.cleanup().await;
    assert!(result.is_ok(), "Cleanup failed: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_like_twice_applies_once() {
    let db = TestDatabase::create_unique().await.unwrap();
    seed_post(db.connection(), "01hx0000000000000000000001", "owner").await;

    let conn = Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap());
    let repo = PostRepository::new(conn);

    let first = repo.add_like("01hx0000000000000000000001", "u1").await.unwrap();
    let second = repo.add_like("01hx0000000000000000000001", "u1").await.unwrap();

    let liked = first.unwrap();
    assert_eq!(liked.like_total, 1);
    assert_eq!(id_list(&liked.like_users), vec!["u1"]);
    assert!(second.is_none());

    let undone = repo
        .remove_like("01hx0000000000000000000001", "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(undone.like_total, 0);
    assert!(id_list(&undone.like_users).is_empty());

    drop(repo);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_likes_keep_total_consistent() {
    let db = TestDatabase::create_unique().await.unwrap();
    let post_id = "01hx0000000000000000000002";
    seed_post(db.connection(), post_id, "owner").await;

    let repo = PostRepository::new(Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap()));

    // 20 distinct users plus 20 duplicate attempts from the same user.
    let mut handles = Vec::new();
    for i in 0..20 {
        let distinct = repo.clone();
        handles.push(tokio::spawn(async move {
            distinct.add_like(post_id, &format!("user{i}")).await
        }));
        let same = repo.clone();
        handles.push(tokio::spawn(async move { same.add_like(post_id, "same").await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let post = repo.find_by_id(post_id).await.unwrap().unwrap();
    let members = id_list(&post.like_users);
    assert_eq!(post.like_total, 21);
    assert_eq!(members.len(), 21);
    assert_eq!(members.iter().filter(|m| *m == "same").count(), 1);

    drop(repo);
    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
