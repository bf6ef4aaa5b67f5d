//! Agora server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use agora_api::middleware::AppState;
use agora_common::{Config, LocalStorage, StorageBackend};
use agora_core::{
    AuthService, CommentService, MediaGateway, MediaPolicy, PostService, ReplyService,
    StorageMediaUploader, UserService,
};
use agora_db::repositories::{CommentRepository, PostRepository, ReplyRepository, UserRepository};
use anyhow::Context;
use sea_orm::DatabaseConnection;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Wire repositories into the service chain.
fn build_state(config: &Config, db: Arc<DatabaseConnection>) -> AppState {
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));
    let media: MediaGateway = Arc::new(StorageMediaUploader::new(
        storage,
        MediaPolicy::from(&config.media),
    ));

    let reply_service = ReplyService::new(
        ReplyRepository::new(Arc::clone(&db)),
        CommentRepository::new(Arc::clone(&db)),
    );
    let mut comment_service =
        CommentService::new(CommentRepository::new(Arc::clone(&db)), reply_service.clone());
    comment_service.set_sweep_replies(config.cascade.sweep_replies);
    let post_service = PostService::new(
        PostRepository::new(Arc::clone(&db)),
        comment_service.clone(),
        media.clone(),
    );
    let user_service = UserService::new(UserRepository::new(db), post_service.clone(), media);
    let auth_service = AuthService::new(user_service.clone(), &config.auth);

    AppState {
        user_service,
        post_service,
        comment_service,
        reply_service,
        auth_service,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting agora server...");

    let config = Config::load().context("Failed to load configuration")?;

    let db = agora_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    agora_db::migrate(&db).await?;
    info!("Migrations completed");

    if config.cascade.sweep_replies {
        info!("Bulk comment deletes also remove replies");
    }

    let state = build_state(&config, Arc::new(db));

    let mut app = agora_api::app(state, agora_api::upload::body_limit(&config.media));
    match config.storage.mount_path() {
        Some(path) => {
            info!(path, "Serving uploaded media");
            app = app.nest_service(path, ServeDir::new(&config.storage.base_path));
        }
        None => info!(
            base_url = %config.storage.base_url,
            "Uploaded media is served externally"
        ),
    }

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
