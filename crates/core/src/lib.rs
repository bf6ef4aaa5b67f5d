//! Core business logic for agora.
//!
//! Each store is a service: users own posts, posts own comments, comments own replies.
//! Deletes cascade down that chain, never up.

pub mod services;

pub use services::*;
