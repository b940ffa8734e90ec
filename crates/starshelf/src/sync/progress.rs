//! Progress reporting for sync operations.
//!
//! The engine reports every phase change and item decision through an
//! optional callback, leaving presentation to the caller.

use super::types::{SyncAction, SyncMode, SyncPhase};

/// Progress events emitted during a reconciliation run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// The run entered a new phase.
    PhaseChanged {
        /// Strategy being run.
        mode: SyncMode,
        /// Phase just entered.
        phase: SyncPhase,
    },

    /// Both initial fetches completed.
    Fetched {
        /// Source items fetched.
        items: usize,
        /// Mirror pages fetched, or `None` when the cached index was used.
        pages: Option<usize>,
    },

    /// A mirror page was created (or would be, in a dry run).
    Inserted {
        id: String,
        name: String,
        /// Assigned page id; `None` in a dry run.
        page_id: Option<String>,
    },

    /// A duplicate page for an already-mirrored item was archived (or
    /// would be, in a dry run).
    DuplicateArchived {
        /// External id shared with the kept page.
        id: String,
        page_id: String,
    },

    /// An item was already mirrored and left alone.
    AlreadyPresent { id: String, name: String },

    /// Bidirectional catch-up met its first mirrored item and stopped.
    CatchUpStopped {
        /// The first already-mirrored item.
        id: String,
        name: String,
    },

    /// A renamed item's page was rewritten (or would be, in a dry run).
    Updated {
        id: String,
        /// Title stored in the mirror before the update.
        old_title: String,
        new_title: String,
    },

    /// An item was removed from the source (or would be, in a dry run).
    Removed { id: String, name: String },

    /// A mutation failed; the item was skipped or the run aborted.
    ItemFailed {
        id: String,
        name: String,
        action: SyncAction,
        error: String,
    },

    /// The run finished.
    Completed {
        inserted: usize,
        updated: usize,
        removed: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Callback type for progress reporting.
///
/// This is a boxed function that receives progress events.
/// It must be `Send + Sync` to work across async boundaries.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use starshelf::sync::{emit, SyncProgress, ProgressCallback};
///
/// fn report(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, SyncProgress::Fetched { items: 42, pages: None });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
