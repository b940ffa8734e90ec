use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::Result;

/// Boolean attributes carried by a starred repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFlags {
    pub fork: bool,
    pub archived: bool,
    pub private: bool,
    pub mirror: bool,
    pub locked: bool,
    pub empty: bool,
    pub disabled: bool,
}

impl RepoFlags {
    /// Names of the flags that are set, in a stable order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.fork, "fork"),
            (self.archived, "archived"),
            (self.private, "private"),
            (self.mirror, "mirror"),
            (self.locked, "locked"),
            (self.empty, "empty"),
            (self.disabled, "disabled"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

/// One entry of the source-of-truth list (a starred repository).
///
/// `id` is the only field usable for identity; `display_name` changes when
/// the repository is renamed or transferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Stable opaque identifier (GitHub node id).
    pub id: String,
    /// `owner/name` at fetch time.
    pub display_name: String,
    /// Repository URL.
    pub url: String,
    /// Repository description.
    pub description: Option<String>,
    /// Repository topics, deduplicated, in platform order.
    pub topics: Vec<String>,
    /// Primary programming language.
    pub language: Option<String>,
    /// Fork/archived/private/... attributes.
    pub flags: RepoFlags,
    /// When the item was added to the list (starred).
    pub added_at: DateTime<Utc>,
    /// When the repository was last updated.
    pub last_updated_at: DateTime<Utc>,
}

/// One entry of the mirror store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPage {
    /// Identifier assigned by the mirror store.
    pub page_id: String,
    /// Copy of [`RemoteItem::id`].
    pub external_id: String,
    /// Copy of [`RemoteItem::display_name`] at last write.
    pub title: String,
}

/// Every live page of a mirror store, as seen by one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSnapshot {
    /// First page seen for each external id.
    pub pages: HashMap<String, MirrorPage>,
    /// Later pages carrying an external id already in `pages`.
    pub duplicates: Vec<MirrorPage>,
}

/// The authoritative, ordered list that the mirror follows.
///
/// Every fetch returns items newest-first by `added_at`.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Fetch up to `limit` items, paginating as needed.
    async fn fetch_all(&self, limit: usize) -> Result<Vec<RemoteItem>>;

    /// Fetch the `count` most recently added items.
    async fn fetch_latest(&self, count: usize) -> Result<Vec<RemoteItem>>;

    /// Remove an item from the list. Failures are returned, never retried here.
    async fn remove(&self, item: &RemoteItem) -> Result<()>;
}

/// The store being kept in sync with a [`SourceFeed`].
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Fetch every live page keyed by external id.
    ///
    /// Duplicates are reported, not touched; archiving them is up to the caller.
    async fn fetch_all_pages(&self) -> Result<MirrorSnapshot>;

    /// Create a page for `item`. Callers are responsible for idempotency.
    async fn insert(&self, item: &RemoteItem) -> Result<MirrorPage>;

    /// Overwrite the title and metadata of an existing page.
    async fn update(&self, page_id: &str, item: &RemoteItem) -> Result<MirrorPage>;

    /// Soft-delete a page.
    async fn archive(&self, page_id: &str) -> Result<()>;
}

#[async_trait]
impl<T: SourceFeed + ?Sized> SourceFeed for std::sync::Arc<T> {
    async fn fetch_all(&self, limit: usize) -> Result<Vec<RemoteItem>> {
        (**self).fetch_all(limit).await
    }

    async fn fetch_latest(&self, count: usize) -> Result<Vec<RemoteItem>> {
        (**self).fetch_latest(count).await
    }

    async fn remove(&self, item: &RemoteItem) -> Result<()> {
        (**self).remove(item).await
    }
}

#[async_trait]
impl<T: MirrorStore + ?Sized> MirrorStore for std::sync::Arc<T> {
    async fn fetch_all_pages(&self) -> Result<MirrorSnapshot> {
        (**self).fetch_all_pages().await
    }

    async fn insert(&self, item: &RemoteItem) -> Result<MirrorPage> {
        (**self).insert(item).await
    }

    async fn update(&self, page_id: &str, item: &RemoteItem) -> Result<MirrorPage> {
        (**self).update(page_id, item).await
    }

    async fn archive(&self, page_id: &str) -> Result<()> {
        (**self).archive(page_id).await
    }
}
