//! The `index` command: inspect or reset the local mirror index.

use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;

use starshelf::{CacheStore, DEFAULT_INDEX_KEY, FileCache, MirrorIndex};

use crate::config::Config;

/// Index subcommands.
#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Show how many stars the local index believes are mirrored
    Stats,
    /// Forget the local index; the next sync refetches the Notion database
    Clear,
}

/// Handle index commands.
pub fn handle_index(
    action: IndexAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache_dir = config.cache_dir()?;
    let cache = FileCache::new(&cache_dir);
    let path = cache.path_for(DEFAULT_INDEX_KEY);

    match action {
        IndexAction::Stats => {
            let index = open_index(cache);
            println!("{}", stats_line(&index, &path));
        }
        IndexAction::Clear => {
            let mut index = open_index(cache);
            let forgotten = index.len();
            index.clear();
            tracing::info!(entries = forgotten, path = %path.display(), "Cleared mirror index");
            println!("Cleared {} entries from {}", forgotten, path.display());
        }
    }

    Ok(())
}

fn open_index(cache: FileCache) -> MirrorIndex {
    let store: Arc<dyn CacheStore> = Arc::new(cache);
    MirrorIndex::load(store, DEFAULT_INDEX_KEY)
}

fn stats_line(index: &MirrorIndex, path: &Path) -> String {
    if index.is_empty() {
        format!("Mirror index at {} is empty", path.display())
    } else {
        format!("{} stars mirrored (index at {})", index.len(), path.display())
    }
}
