//! Application configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Token signing configuration.
    pub auth: AuthConfig,
    /// Media storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Upload policy.
    #[serde(default)]
    pub media: MediaConfig,
    /// Cascade behaviour.
    #[serde(default)]
    pub cascade: CascadeConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
}

/// Shortest signing secret accepted outside development.
pub const MIN_JWT_SECRET_LEN: usize = 32;

const PLACEHOLDER_SECRETS: [&str; 3] = ["change-me", "changeme", "secret"];

impl AuthConfig {
    /// Reject signing secrets that would let anyone mint tokens.
    ///
    /// An empty secret is always rejected. Outside `development`, well-known placeholders
    /// and secrets shorter than [`MIN_JWT_SECRET_LEN`] bytes are rejected as well.
    pub fn check_secret(&self, environment: &str) -> Result<(), config::ConfigError> {
        let secret = self.jwt_secret.trim();
        if secret.is_empty() {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret must be set".to_string(),
            ));
        }
        if environment == "development" {
            return Ok(());
        }
        if PLACEHOLDER_SECRETS
            .iter()
            .any(|placeholder| secret.eq_ignore_ascii_case(placeholder))
        {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret is still the placeholder value".to_string(),
            ));
        }
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(config::ConfigError::Message(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        Ok(())
    }
}

/// Local media storage.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded files are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// Prefix of the public file URLs. Either a path (`/files`) or an absolute URL when a
    /// CDN sits in front of the storage directory.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
    /// Path this server serves `base_path` under. Defaults to `base_url` when that is a path.
    #[serde(default)]
    pub serve_path: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
            serve_path: None,
        }
    }
}

impl StorageSettings {
    /// Where to mount the storage directory, if this server serves it at all.
    #[must_use]
    pub fn mount_path(&self) -> Option<&str> {
        self.serve_path
            .as_deref()
            .or_else(|| Some(self.base_url.as_str()).filter(|url| url.starts_with('/')))
    }

    fn check(&self) -> Result<(), config::ConfigError> {
        match self.serve_path.as_deref() {
            Some(path) if !path.starts_with('/') || path == "/" => {
                Err(config::ConfigError::Message(format!(
                    "storage.serve_path must be a non-root path starting with '/', got {path:?}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Accepted uploads.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Maximum size of a single file in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Maximum number of files per request.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Accepted MIME types.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            allowed_types: default_allowed_types(),
        }
    }
}

/// Cascade configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CascadeConfig {
    /// Also delete replies when comments are removed in bulk.
    #[serde(default)]
    pub sweep_replies: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_token_ttl() -> i64 {
    7 * 24 * 60 * 60
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

const fn default_max_file_size() -> usize {
    25 * 1024 * 1024
}

const fn default_max_files() -> usize {
    10
}

fn default_allowed_types() -> Vec<String> {
    ["image/png", "image/jpeg", "image/jpg", "video/mp4"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `AGORA_ENV`)
    /// 4. Environment variables with `AGORA_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("AGORA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("AGORA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate(&env)?;
        Ok(config)
    }

    /// Check settings that deserialize fine but cannot be served safely.
    pub fn validate(&self, environment: &str) -> Result<(), config::ConfigError> {
        self.auth.check_secret(environment)?;
        self.storage.check()
    }
}
