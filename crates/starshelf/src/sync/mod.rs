//! Reconciliation between the source feed and the mirror store.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncMode`, `SyncOptions`, `SyncResult`, `SyncError`
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`engine`] - The `SyncEngine` and its three strategies
//!
//! # Example
//!
//! ```ignore
//! use starshelf::sync::{SyncEngine, SyncMode, SyncOptions};
//!
//! let mut engine = SyncEngine::new(github, notion, index, SyncOptions::default());
//! let result = engine.run(SyncMode::Bidirectional).await?;
//! println!("removed {} stars", result.removed);
//! ```

mod engine;
mod progress;
mod types;

pub use engine::SyncEngine;

pub use types::{
    ErrorPolicy, FetchSide, ItemFailure, ParseSyncModeError, SyncAction, SyncError, SyncMode,
    SyncOptions, SyncPhase, SyncResult,
};

pub use types::{DEFAULT_FULL_LIMIT, DEFAULT_LATEST_COUNT};

pub use progress::{ProgressCallback, SyncProgress, emit};
