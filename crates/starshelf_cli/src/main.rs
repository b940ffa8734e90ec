//! Starshelf CLI - mirror GitHub stars into a Notion database.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::index::IndexAction;
use crate::commands::sync::SyncArgs;

#[derive(Parser)]
#[command(name = "starshelf")]
#[command(version)]
#[command(about = "Mirror your GitHub stars into a Notion database")]
#[command(
    long_about = "Starshelf keeps one Notion database page per starred GitHub repository. \
Full and incremental runs copy new stars across; bidirectional runs also push \
renames and deletions made in Notion back to GitHub. Running without a \
subcommand performs `sync`."
)]
#[command(after_long_help = r#"EXAMPLES
    Mirror the ten most recent stars:
        $ starshelf sync

    Mirror every star, oldest first:
        $ starshelf sync --mode full

    Preview what a bidirectional run would change:
        $ starshelf sync --mode bidirectional --dry-run

    Rebuild the local index from Notion:
        $ starshelf index clear && starshelf sync --mode full

CONFIGURATION
    Starshelf reads configuration from:
      1. ~/.config/starshelf/config.toml (or $XDG_CONFIG_HOME/starshelf/config.toml)
      2. ./starshelf.toml
      3. Environment variables (STARSHELF_* prefix, `__` between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    STARSHELF_GITHUB__TOKEN        GitHub personal access token
    STARSHELF_NOTION__API_KEY      Notion integration secret
    STARSHELF_NOTION__DATABASE_ID  Notion database id
    STARSHELF_CACHE__DIR           Index directory (default: ~/.local/state/starshelf)

    Legacy names are honored when the settings above are unset:
    TOKEN_OF_GITHUB, NOTION_API_KEY, NOTION_DATABASE_ID, FULLSYNC_LIMIT,
    PARTIALSYNC_LIMIT, REPO_TOPICS_LIMIT, and FULL_SYNC / BI_SYNC to pick the mode.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile GitHub stars with the Notion database
    Sync(SyncArgs),
    /// Inspect or reset the local mirror index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("starshelf=info,starshelf_cli=info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    shutdown::setup_shutdown_handler();

    // Config file -> env vars -> legacy env vars -> defaults
    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Sync(SyncArgs::default())) {
        Commands::Sync(args) => commands::sync::handle_sync(args, &config).await?,
        Commands::Index { action } => commands::index::handle_index(action, &config)?,
    }

    Ok(())
}
