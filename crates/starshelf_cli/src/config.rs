//! Configuration file support for starshelf.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables prefixed with `STARSHELF_`, with `__` between
//!    section and key (e.g., `STARSHELF_NOTION__DATABASE_ID`)
//! 3. Local config file (./starshelf.toml)
//! 4. XDG config file (~/.config/starshelf/config.toml)
//! 5. Legacy environment variables, for values still unset
//! 6. Built-in defaults
//!
//! The mirror index cache defaults to `~/.local/state/starshelf/` on Linux.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."        # or TOKEN_OF_GITHUB
//! topics_limit = 50        # or REPO_TOPICS_LIMIT
//!
//! [notion]
//! api_key = "secret_..."   # or NOTION_API_KEY
//! database_id = "..."      # or NOTION_DATABASE_ID
//!
//! [sync]
//! full_limit = 2000        # or FULLSYNC_LIMIT
//! latest_count = 10        # or PARTIALSYNC_LIMIT
//! min_interval_ms = 100
//!
//! [cache]
//! dir = "/var/lib/starshelf"
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use starshelf::github::DEFAULT_TOPICS_LIMIT;
use starshelf::rate_limits;
use starshelf::sync::{DEFAULT_FULL_LIMIT, DEFAULT_LATEST_COUNT};

/// Errors raised when the configuration cannot drive a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting has no value in any source.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// No cache directory is configured and the platform offers none.
    #[error("no cache directory available; set `cache.dir`")]
    NoCacheDir,
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Notion configuration.
    pub notion: NotionConfig,
    /// Default sync options.
    pub sync: SyncConfig,
    /// Mirror index cache.
    pub cache: CacheConfig,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Personal access token with permission to read and change stars.
    pub token: Option<String>,
    /// Topics fetched per repository.
    pub topics_limit: Option<u32>,
}

/// Notion configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Integration secret.
    pub api_key: Option<String>,
    /// Target database, shared with the integration.
    pub database_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on stars fetched by full and bidirectional runs.
    pub full_limit: Option<usize>,
    /// Stars fetched by incremental runs.
    pub latest_count: Option<usize>,
    /// Minimum spacing between Notion calls, in milliseconds.
    pub min_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: Option<PathBuf>,
}

/// Secrets required to talk to both services.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub github_token: String,
    pub notion_api_key: String,
    pub notion_database_id: String,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/starshelf/config.toml)
    /// 3. Local config file (./starshelf.toml)
    /// 4. Environment variables with STARSHELF_ prefix
    ///
    /// Legacy environment variables are applied last, and only fill values
    /// that are still unset.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("starshelf.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./starshelf.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // STARSHELF_NOTION__DATABASE_ID -> notion.database_id
        builder = builder.add_source(
            Environment::with_prefix("STARSHELF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config = match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        };

        config.apply_legacy_env(|name| std::env::var(name).ok());
        config
    }

    /// Fill unset values from the legacy environment variable names.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.notion.api_key.is_none() {
            self.notion.api_key = text("NOTION_API_KEY");
        }
        if self.notion.database_id.is_none() {
            self.notion.database_id = text("NOTION_DATABASE_ID");
        }
        if self.github.token.is_none() {
            self.github.token = text("TOKEN_OF_GITHUB");
        }

        if self.sync.full_limit.is_none() {
            self.sync.full_limit = parse_legacy("FULLSYNC_LIMIT", text("FULLSYNC_LIMIT"));
        }
        if self.sync.latest_count.is_none() {
            self.sync.latest_count = parse_legacy("PARTIALSYNC_LIMIT", text("PARTIALSYNC_LIMIT"));
        }
        if self.github.topics_limit.is_none() {
            self.github.topics_limit =
                parse_legacy("REPO_TOPICS_LIMIT", text("REPO_TOPICS_LIMIT"));
        }
    }

    /// Check that every secret is present.
    ///
    /// Reports the first missing setting; empty strings count as missing.
    pub fn validate(&self) -> Result<Credentials, ConfigError> {
        let required = |value: &Option<String>, name: &'static str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Credentials {
            notion_api_key: required(&self.notion.api_key, "notion.api_key")?,
            notion_database_id: required(&self.notion.database_id, "notion.database_id")?,
            github_token: required(&self.github.token, "github.token")?,
        })
    }

    pub fn full_limit(&self) -> usize {
        self.sync.full_limit.unwrap_or(DEFAULT_FULL_LIMIT)
    }

    pub fn latest_count(&self) -> usize {
        self.sync.latest_count.unwrap_or(DEFAULT_LATEST_COUNT)
    }

    pub fn topics_limit(&self) -> u32 {
        self.github.topics_limit.unwrap_or(DEFAULT_TOPICS_LIMIT)
    }

    /// Spacing enforced between Notion calls.
    pub fn min_interval(&self) -> Duration {
        self.sync
            .min_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(rate_limits::NOTION_MIN_INTERVAL)
    }

    /// Directory holding the mirror index, falling back to the state directory.
    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        self.cache
            .dir
            .clone()
            .or_else(Self::default_state_dir)
            .ok_or(ConfigError::NoCacheDir)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "starshelf").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/starshelf` or `~/.local/state/starshelf`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "starshelf").map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn parse_legacy<T: FromStr>(name: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(variable = name, value = %value, "Ignoring non-numeric setting");
            None
        }
    }
}
