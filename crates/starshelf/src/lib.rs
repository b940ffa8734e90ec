//! Starshelf - keep a Notion database in sync with your GitHub stars.
//!
//! The library is split along the collaborators of a sync run:
//!
//! - [`github`] - the source feed (starred repositories, newest first)
//! - [`notion`] - the mirror store (one database page per repository)
//! - [`index`] - the local view of which items are mirrored, persisted
//!   through a [`cache::CacheStore`]
//! - [`sync`] - the reconciliation engine tying them together
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use starshelf::{FileCache, GitHubClient, MirrorIndex, NotionClient, SyncEngine, SyncMode};
//!
//! let github = GitHubClient::new(&github_token, Default::default())?;
//! let notion = NotionClient::new(&notion_key, &database_id, Default::default())?;
//! let index = MirrorIndex::load(Arc::new(FileCache::new(cache_dir)), DEFAULT_INDEX_KEY);
//!
//! let mut engine = SyncEngine::new(github, notion, index, Default::default());
//! let result = engine.run(SyncMode::Full).await?;
//! ```

pub mod cache;
pub mod github;
pub mod http;
pub mod index;
pub mod notion;
pub mod platform;
pub mod retry;
pub mod sync;

pub use cache::{CacheError, CacheStore, FileCache, MemoryCache};
pub use github::{GitHubClient, GitHubOptions};
pub use index::{DEFAULT_INDEX_KEY, IndexEntry, MirrorIndex};
pub use notion::{NotionClient, NotionOptions};
pub use platform::{
    ApiRateLimiter, MirrorPage, MirrorSnapshot, MirrorStore, PlatformError, RemoteItem, RepoFlags,
    SourceFeed, rate_limits,
};
pub use retry::RetryConfig;
pub use sync::{ErrorPolicy, SyncEngine, SyncError, SyncMode, SyncOptions, SyncResult};
