//! ID generation and validation.

use ulid::Ulid;

use crate::{AppError, AppResult};

/// Length of a ULID in its canonical string form.
pub const ID_LEN: usize = 26;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are:
    /// - Lexicographically sortable
    /// - Monotonically increasing within the same millisecond
    /// - Shorter than UUIDs when represented as strings
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }
}

/// Returns true if `id` has the shape of an identifier produced by [`IdGenerator`].
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && Ulid::from_string(&id.to_ascii_uppercase()).is_ok()
}

/// Reject any malformed identifier before it reaches a query filter.
pub fn validate_ids(ids: &[&str]) -> AppResult<()> {
    if ids.iter().all(|id| is_valid_id(id)) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid object id".to_string()))
    }
}
