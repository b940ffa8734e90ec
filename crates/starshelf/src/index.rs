//! Local materialized view of the mirror store.
//!
//! Maps external id → `{pageId, title}`. The index only changes after a
//! mirror mutation succeeds, and is written back to the cache store after
//! every change, so the persisted copy is never ahead of the remote.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::platform::MirrorPage;

/// Cache key under which the index is persisted.
pub const DEFAULT_INDEX_KEY: &str = "notion-page";

/// What the index remembers about one mirrored page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub page_id: String,
    pub title: String,
}

impl From<&MirrorPage> for IndexEntry {
    fn from(page: &MirrorPage) -> Self {
        Self {
            page_id: page.page_id.clone(),
            title: page.title.clone(),
        }
    }
}

/// In-memory index of mirrored pages, backed by a [`CacheStore`].
pub struct MirrorIndex {
    entries: BTreeMap<String, IndexEntry>,
    store: Arc<dyn CacheStore>,
    key: String,
    read_only: bool,
}

impl MirrorIndex {
    /// Restore the index from `store`, starting empty if nothing usable is cached.
    pub fn load(store: Arc<dyn CacheStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let entries: BTreeMap<String, IndexEntry> = store.get(&key, BTreeMap::new());
        tracing::info!(count = entries.len(), key = %key, "Restored mirror index from cache");

        Self {
            entries,
            store,
            key,
            read_only: false,
        }
    }

    /// An empty index that persists to `store` under `key`.
    pub fn empty(store: Arc<dyn CacheStore>, key: impl Into<String>) -> Self {
        Self {
            entries: BTreeMap::new(),
            store,
            key: key.into(),
            read_only: false,
        }
    }

    /// Keep later changes in memory only; used by dry runs.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get(&self, external_id: &str) -> Option<&IndexEntry> {
        self.entries.get(external_id)
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.entries.contains_key(external_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    /// Record a page after a successful insert or update, then persist.
    pub fn record(&mut self, page: &MirrorPage) {
        self.entries
            .insert(page.external_id.clone(), IndexEntry::from(page));
        self.persist();
    }

    /// Replace every entry with a freshly fetched set of pages, then persist.
    pub fn replace_all(&mut self, pages: HashMap<String, MirrorPage>) {
        self.entries = pages
            .into_iter()
            .map(|(external_id, page)| (external_id, IndexEntry::from(&page)))
            .collect();
        self.persist();
    }

    /// Forget every entry and persist the empty index.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    /// Write the index to the cache store.
    ///
    /// Failures are logged; the in-memory view stays authoritative for the run.
    /// Does nothing while the index is read-only.
    pub fn persist(&self) {
        if self.read_only {
            return;
        }
        if let Err(e) = self.store.put(&self.key, &self.entries) {
            tracing::warn!(key = %self.key, error = %e, "Failed to persist mirror index");
        }
    }
}

impl std::fmt::Debug for MirrorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorIndex")
            .field("key", &self.key)
            .field("len", &self.entries.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}
