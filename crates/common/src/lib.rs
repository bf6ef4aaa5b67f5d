//! Common utilities and shared types for agora.
//!
//! This crate provides foundational components used across all agora crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based identifiers via [`IdGenerator`], checked with [`validate_ids`]
//! - **Storage**: File storage backends for uploaded media
//!
//! # Example
//!
//! ```no_run
//! use agora_common::{AppResult, Config, IdGenerator, validate_ids};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = IdGenerator::new().generate();
//!     validate_ids(&[id.as_str()])?;
//!     println!("{} listening on {}", id, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::{IdGenerator, is_valid_id, validate_ids};
pub use storage::{LocalStorage, StorageBackend, UploadedFile, generate_storage_key};
