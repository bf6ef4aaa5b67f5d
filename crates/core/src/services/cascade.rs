//! Multi-step deletes without cross-table transactions.
//!
//! A [`Cascade`] runs named steps in order and stops at the first failure. It does not
//! roll back: completed steps stay applied. On failure it logs which steps already
//! ran so orphaned rows can be found and swept later.

use std::future::Future;

use agora_common::{AppError, AppResult};

/// An ordered chain of deletion steps rooted at one entity.
#[derive(Debug)]
pub struct Cascade {
    root: &'static str,
    id: String,
    completed: Vec<&'static str>,
}

impl Cascade {
    /// Start a cascade for `root` (e.g. `"post"`) identified by `id`.
    #[must_use]
    pub fn new(root: &'static str, id: &str) -> Self {
        Self {
            root,
            id: id.to_string(),
            completed: Vec::new(),
        }
    }

    /// Run one step.
    pub async fn step<T, F>(&mut self, name: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match fut.await {
            Ok(value) => {
                tracing::debug!(root = self.root, id = %self.id, step = name, "Cascade step done");
                self.completed.push(name);
                Ok(value)
            }
            Err(e) => {
                tracing::error!(
                    root = self.root,
                    id = %self.id,
                    step = name,
                    completed = ?self.completed,
                    error = %e,
                    "Cascade stopped; rows removed by completed steps are not restored"
                );
                Err(e)
            }
        }
    }

    /// Names of the steps that succeeded so far.
    #[must_use]
    pub fn completed(&self) -> &[&'static str] {
        &self.completed
    }
}

/// Collapse a bulk-operation failure into the generic internal error.
///
/// The original cause is logged, never returned.
pub fn collapse_bulk_failure<T>(operation: &'static str, result: AppResult<T>) -> AppResult<T> {
    result.map_err(|e| {
        tracing::error!(operation, error = %e, "Bulk operation failed");
        AppError::generic()
    })
}
