//! The `sync` command: reconcile GitHub stars with the Notion database.

use std::sync::Arc;

use clap::{Args, ValueEnum};

use starshelf::{
    ApiRateLimiter, CacheStore, DEFAULT_INDEX_KEY, ErrorPolicy, FileCache, GitHubClient,
    GitHubOptions, MirrorIndex, NotionClient, NotionOptions, SyncEngine, SyncError, SyncMode,
    SyncOptions, SyncResult,
};

use crate::config::Config;
use crate::progress::LoggingReporter;

/// Reconciliation strategy as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Mirror every star, oldest first
    Full,
    /// Mirror only the most recent stars
    Incremental,
    /// Catch up on new stars, then push renames and deletions back
    Bidirectional,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => SyncMode::Full,
            ModeArg::Incremental => SyncMode::Incremental,
            ModeArg::Bidirectional => SyncMode::Bidirectional,
        }
    }
}

/// Options for the sync command.
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Strategy to run [default: FULL_SYNC / BI_SYNC env, else incremental]
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Log planned changes without touching either service
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Refetch the Notion database even when the local index is warm
    #[arg(short, long)]
    pub refresh: bool,

    /// Maximum stars fetched by full and bidirectional runs
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Stars fetched by incremental runs
    #[arg(long)]
    pub latest: Option<usize>,

    /// Stop at the first failed page write or unstar
    #[arg(long)]
    pub fail_fast: bool,
}

/// Pick the strategy: flag, then the legacy `FULL_SYNC` / `BI_SYNC`
/// variables, then incremental.
pub(crate) fn resolve_mode(
    flag: Option<ModeArg>,
    lookup: impl Fn(&str) -> Option<String>,
) -> SyncMode {
    if let Some(mode) = flag {
        return mode.into();
    }

    let set = |name: &str| lookup(name).is_some_and(|v| !v.is_empty());
    if set("FULL_SYNC") {
        SyncMode::Full
    } else if set("BI_SYNC") {
        SyncMode::Bidirectional
    } else {
        SyncMode::Incremental
    }
}

pub(crate) fn sync_options(args: &SyncArgs, config: &Config) -> SyncOptions {
    SyncOptions {
        full_limit: args.limit.unwrap_or_else(|| config.full_limit()),
        latest_count: args.latest.unwrap_or_else(|| config.latest_count()),
        refresh_index: args.refresh,
        dry_run: args.dry_run,
        error_policy: if args.fail_fast {
            ErrorPolicy::Abort
        } else {
            ErrorPolicy::Continue
        },
    }
}

/// Handle the sync command.
pub async fn handle_sync(
    args: SyncArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = config.validate()?;
    let mode = resolve_mode(args.mode, |name| std::env::var(name).ok());
    let options = sync_options(&args, config);

    let cache_dir = config.cache_dir()?;
    let cache: Arc<dyn CacheStore> = Arc::new(FileCache::new(&cache_dir));
    let index = MirrorIndex::load(cache, DEFAULT_INDEX_KEY);

    let github = GitHubClient::new(
        &credentials.github_token,
        GitHubOptions {
            topics_limit: config.topics_limit(),
            ..GitHubOptions::default()
        },
    )?;
    let notion = NotionClient::new(
        &credentials.notion_api_key,
        &credentials.notion_database_id,
        NotionOptions {
            rate_limiter: Some(ApiRateLimiter::with_min_interval(config.min_interval())),
            ..NotionOptions::default()
        },
    )?;

    tracing::info!(
        mode = %mode,
        dry_run = options.dry_run,
        indexed = index.len(),
        cache = %cache_dir.display(),
        "Starting sync"
    );

    let mut engine = SyncEngine::new(github, notion, index, options)
        .with_progress(LoggingReporter::new().into_callback());

    match engine.run(mode).await {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(SyncError::Aborted { failure, partial }) => {
            print_summary(&partial);
            Err(SyncError::Aborted { failure, partial }.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_summary(result: &SyncResult) {
    let verb = if result.dry_run { "Planned" } else { "Finished" };
    println!(
        "{} {} sync of {} stars: {} inserted, {} updated, {} removed, {} skipped, {} failed",
        verb,
        result.mode,
        result.fetched,
        result.inserted,
        result.updated,
        result.removed,
        result.skipped,
        result.failures.len()
    );
    if result.archived > 0 {
        let done = if result.dry_run { "to archive" } else { "archived" };
        println!("  {} duplicate pages {}", result.archived, done);
    }

    for failure in &result.failures {
        println!("  - {}", failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_flag_wins_over_env() {
        let mode = resolve_mode(Some(ModeArg::Incremental), env(&[("FULL_SYNC", "1")]));
        assert_eq!(mode, SyncMode::Incremental);
    }

    #[test]
    fn test_full_sync_env_beats_bi_sync() {
        let mode = resolve_mode(None, env(&[("FULL_SYNC", "true"), ("BI_SYNC", "true")]));
        assert_eq!(mode, SyncMode::Full);
    }

    #[test]
    fn test_bi_sync_env() {
        assert_eq!(
            resolve_mode(None, env(&[("BI_SYNC", "yes")])),
            SyncMode::Bidirectional
        );
    }

    #[test]
    fn test_empty_env_means_incremental() {
        assert_eq!(
            resolve_mode(None, env(&[("FULL_SYNC", ""), ("BI_SYNC", "")])),
            SyncMode::Incremental
        );
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.sync.full_limit = Some(400);
        config.sync.latest_count = Some(4);

        let options = sync_options(&SyncArgs::default(), &config);
        assert_eq!(options.full_limit, 400);
        assert_eq!(options.latest_count, 4);
        assert_eq!(options.error_policy, ErrorPolicy::Continue);
        assert!(!options.dry_run);

        let args = SyncArgs {
            limit: Some(50),
            latest: Some(2),
            dry_run: true,
            refresh: true,
            fail_fast: true,
            ..SyncArgs::default()
        };
        let options = sync_options(&args, &config);
        assert_eq!(options.full_limit, 50);
        assert_eq!(options.latest_count, 2);
        assert!(options.dry_run);
        assert!(options.refresh_index);
        assert_eq!(options.error_policy, ErrorPolicy::Abort);
    }
}
