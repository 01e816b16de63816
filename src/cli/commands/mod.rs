//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod item;
mod status;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{load_settings, Settings};

#[derive(Parser)]
#[command(name = "shelfcrawl")]
#[command(about = "Resumable catalog crawler for JavaScript-rendered storefronts")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a category tree, resuming from an existing store
    Crawl {
        /// Seed category URL (falls back to `seed_url` in the config file)
        seed_url: Option<String>,
        /// Store file to append to
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Stop after extracting this many items (0 = unlimited)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Extract a single item page and print it as JSON
    Item {
        /// Item detail page URL
        url: String,
        /// Fill the first empty category level with "Other"
        #[arg(long)]
        from_parent_panel: bool,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Summarize the contents of a store
    Status {
        /// Store file to inspect
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut settings, config) = load_settings(cli.config.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Crawl {
            seed_url,
            output,
            limit,
            headed,
        } => {
            if let Some(ref output) = output {
                override_store(&mut settings, output)?;
            }
            if let Some(limit) = limit {
                settings.crawl.max_items = limit;
            }
            if headed {
                settings.browser.headless = false;
            }
            let seed = seed_url.or(config.seed_url).ok_or_else(|| {
                anyhow::anyhow!("No seed URL given and none configured (set `seed_url`)")
            })?;
            crawl::cmd_crawl(&settings, &seed).await
        }
        Commands::Item {
            url,
            from_parent_panel,
            headed,
        } => {
            if headed {
                settings.browser.headless = false;
            }
            item::cmd_item(&settings, &url, from_parent_panel).await
        }
        Commands::Status { output } => {
            if let Some(ref output) = output {
                override_store(&mut settings, output)?;
            }
            status::cmd_status(&settings)
        }
    }
}

/// Point the settings at a store given on the command line.
///
/// Relative paths are taken from the working directory, not the config file.
fn override_store(settings: &mut Settings, output: &Path) -> anyhow::Result<()> {
    let path = if output.is_absolute() {
        output.to_path_buf()
    } else {
        std::env::current_dir()?.join(output)
    };
    settings.store_filename = path.to_string_lossy().to_string();
    Ok(())
}
