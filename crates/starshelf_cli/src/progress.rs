//! Progress reporting for sync operations.
//!
//! Every engine event becomes a structured log line; item-level successes
//! log at `info`, item failures at `warn`.

use std::sync::Arc;

use starshelf::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Convert to a ProgressCallback for the engine.
    pub fn into_callback(self) -> ProgressCallback {
        let reporter = Arc::new(self);
        Box::new(move |event| reporter.handle(event))
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::PhaseChanged { mode, phase } => {
                tracing::debug!(mode = %mode, phase = %phase, "Sync phase");
            }

            SyncProgress::Fetched { items, pages } => match pages {
                Some(pages) => tracing::info!(items, pages, "Fetched stars and mirror pages"),
                None => tracing::info!(items, "Fetched stars, using cached mirror index"),
            },

            SyncProgress::Inserted { id, name, page_id } => match page_id {
                Some(page_id) => {
                    tracing::info!(id = %id, name = %name, page_id = %page_id, "Saved page")
                }
                None => tracing::info!(id = %id, name = %name, "Would save page"),
            },

            SyncProgress::DuplicateArchived { id, page_id } => {
                tracing::info!(id = %id, page_id = %page_id, "Archived duplicate page");
            }

            SyncProgress::AlreadyPresent { id, name } => {
                tracing::debug!(id = %id, name = %name, "Skip saved page");
            }

            SyncProgress::CatchUpStopped { id, name } => {
                tracing::info!(id = %id, name = %name, "Reached mirrored star, catch-up done");
            }

            SyncProgress::Updated {
                id,
                old_title,
                new_title,
            } => {
                tracing::info!(id = %id, old = %old_title, new = %new_title, "Updated page title");
            }

            SyncProgress::Removed { id, name } => {
                tracing::info!(id = %id, name = %name, "Unstarred repository");
            }

            SyncProgress::ItemFailed {
                id,
                name,
                action,
                error,
            } => {
                tracing::warn!(
                    id = %id,
                    name = %name,
                    action = %action,
                    error = %error,
                    "Item failed"
                );
            }

            SyncProgress::Completed {
                inserted,
                updated,
                removed,
                skipped,
                failed,
            } => {
                tracing::info!(inserted, updated, removed, skipped, failed, "Sync complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
