//! Platform-agnostic model and traits for the two remote collaborators.
//!
//! The reconciliation engine only sees a [`SourceFeed`] (the ordered list of
//! starred repositories) and a [`MirrorStore`] (the database of pages kept in
//! sync with it). Concrete clients live in [`crate::github`] and
//! [`crate::notion`]; tests substitute in-memory doubles.
//!
//! # Example
//!
//! ```ignore
//! use starshelf::platform::{SourceFeed, RemoteItem};
//!
//! async fn newest<S: SourceFeed>(source: &S) -> Result<Option<RemoteItem>, PlatformError> {
//!     Ok(source.fetch_latest(1).await?.into_iter().next())
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use types::{MirrorPage, MirrorSnapshot, MirrorStore, RemoteItem, RepoFlags, SourceFeed};
