//! Sync modes, options, results and errors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::platform::PlatformError;

/// Default number of source items pulled by full and bidirectional runs.
pub const DEFAULT_FULL_LIMIT: usize = 2000;

/// Default number of source items pulled by incremental runs.
pub const DEFAULT_LATEST_COUNT: usize = 10;

/// Reconciliation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Mirror every source item that is not mirrored yet.
    Full,
    /// Absorb only the most recent source activity.
    #[default]
    Incremental,
    /// Make both sides agree: insert new items, repair renames, and remove
    /// from the source what was deleted from the mirror.
    Bidirectional,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
            SyncMode::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sync mode '{0}' (expected full, incremental or bidirectional)")]
pub struct ParseSyncModeError(String);

impl FromStr for SyncMode {
    type Err = ParseSyncModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "incremental" | "partial" => Ok(SyncMode::Incremental),
            "bidirectional" | "bi" => Ok(SyncMode::Bidirectional),
            _ => Err(ParseSyncModeError(s.to_string())),
        }
    }
}

/// What to do when a single item's mutation fails for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log the failure, record it in the result, move on to the next item.
    #[default]
    Continue,
    /// Stop the run at the first failure.
    Abort,
}

/// Options for a reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Source items fetched by full and bidirectional runs.
    pub full_limit: usize,
    /// Source items fetched by incremental runs.
    pub latest_count: usize,
    /// Refetch mirror pages even when the cached index is warm.
    pub refresh_index: bool,
    /// Plan the run without issuing any mutation.
    pub dry_run: bool,
    /// Per-item failure policy.
    pub error_policy: ErrorPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            full_limit: DEFAULT_FULL_LIMIT,
            latest_count: DEFAULT_LATEST_COUNT,
            refresh_index: false,
            dry_run: false,
            error_policy: ErrorPolicy::Continue,
        }
    }
}

/// Run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Fetching,
    Reconciling,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncPhase::Fetching => "fetching",
            SyncPhase::Reconciling => "reconciling",
            SyncPhase::Done => "done",
        })
    }
}

/// A mutation issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Create a mirror page.
    Insert,
    /// Rewrite a renamed item's mirror page.
    Update,
    /// Remove an item from the source.
    Remove,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncAction::Insert => "insert",
            SyncAction::Update => "update",
            SyncAction::Remove => "remove",
        })
    }
}

/// One item whose mutation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub display_name: String,
    pub action: SyncAction,
    pub error: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} ({}) failed: {}",
            self.action, self.display_name, self.id, self.error
        )
    }
}

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Strategy that ran.
    pub mode: SyncMode,
    /// Whether mutations were only planned.
    pub dry_run: bool,
    /// Source items fetched.
    pub fetched: usize,
    /// Mirror pages created (or planned).
    pub inserted: usize,
    /// Mirror pages rewritten after a rename (or planned).
    pub updated: usize,
    /// Items removed from the source (or planned).
    pub removed: usize,
    /// Items left alone because they were already mirrored.
    pub skipped: usize,
    /// Duplicate mirror pages archived (or planned).
    pub archived: usize,
    /// Mutations that failed.
    pub failures: Vec<ItemFailure>,
}

impl SyncResult {
    pub fn new(mode: SyncMode, dry_run: bool) -> Self {
        Self {
            mode,
            dry_run,
            ..Self::default()
        }
    }

    /// Whether every attempted mutation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Which side of the sync a fetch failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSide {
    Source,
    Mirror,
}

impl fmt::Display for FetchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchSide::Source => "source feed",
            FetchSide::Mirror => "mirror store",
        })
    }
}

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum SyncError {
    /// One of the initial fetches failed; nothing was mutated.
    #[error("Failed to fetch {side}: {source}")]
    Fetch {
        side: FetchSide,
        source: PlatformError,
    },

    /// A mutation failed under [`ErrorPolicy::Abort`].
    #[error("Sync aborted: {failure}")]
    Aborted {
        failure: ItemFailure,
        /// Work completed before the failure.
        partial: Box<SyncResult>,
    },
}
