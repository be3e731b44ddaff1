//! pagesync CLI
//!
//! One-shot and watch-mode synchronization between a remote page tree and
//! a local Markdown tree.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagesync::error::Result;
use pagesync::remote::{ApiClient, Retrying, DEFAULT_BASE_URL};
use pagesync::types::SyncConfig;
use pagesync::SyncEngine;

#[derive(Parser)]
#[command(name = "pagesync")]
#[command(about = "Sync a remote page tree with local Markdown files")]
#[command(version)]
struct Cli {
    /// Remote API token
    #[arg(long, env = "PAGESYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Remote API base URL
    #[arg(long, env = "PAGESYNC_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Remote identifier of the root page
    #[arg(long, env = "PAGESYNC_ROOT_PAGE_ID")]
    root_page_id: String,

    /// Local directory mirroring the root page
    #[arg(long, env = "PAGESYNC_ROOT_DIR", default_value = "./pages")]
    root_dir: String,

    /// Directories scanned for outbound sync (comma-separated; defaults to
    /// the root dir)
    #[arg(long, env = "PAGESYNC_SCAN_DIRS")]
    scan_dirs: Option<String>,

    /// Glob patterns excluded from scans and watch events (comma-separated)
    #[arg(
        long,
        env = "PAGESYNC_EXCLUDE",
        default_value = "node_modules/**,.git/**,**/*.test.md,**/README.md"
    )]
    exclude: String,

    /// Keep watching the local tree after the one-shot sync
    #[arg(long, env = "PAGESYNC_WATCH")]
    watch: bool,

    /// Per-path debounce for watch events, in milliseconds
    #[arg(long, env = "PAGESYNC_DEBOUNCE_MS", default_value = "500")]
    debounce_ms: u64,

    /// Maximum retries for retryable remote errors
    #[arg(long, env = "PAGESYNC_MAX_RETRIES", default_value = "3")]
    max_retries: u32,

    /// Base delay between retries, in milliseconds
    #[arg(long, env = "PAGESYNC_RETRY_DELAY", default_value = "1000")]
    retry_delay_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run synchronization
    Sync {
        /// Sync only this page into the root dir
        #[arg(short, long)]
        page_id: Option<String>,
    },
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Expand ~ in paths
    let root_dir = PathBuf::from(shellexpand::tilde(&cli.root_dir).to_string());
    let scan_dirs: Vec<PathBuf> = match &cli.scan_dirs {
        Some(raw) => split_list(raw)
            .iter()
            .map(|d| PathBuf::from(shellexpand::tilde(d).to_string()))
            .collect(),
        None => vec![root_dir.clone()],
    };

    let config = SyncConfig {
        root_page_id: cli.root_page_id.clone(),
        root_dir,
        scan_dirs,
        excluded_patterns: split_list(&cli.exclude),
        watch_mode: cli.watch,
        watch_debounce_ms: cli.debounce_ms,
        max_retries: cli.max_retries,
        retry_delay_ms: cli.retry_delay_ms,
    };

    let client = ApiClient::with_base_url(cli.token.clone(), cli.base_url.clone());
    let store = Arc::new(Retrying::new(client, &config));
    let engine = SyncEngine::new(config.clone(), store)?;

    match cli.command {
        Commands::Sync { page_id: Some(id) } => {
            let report = engine.sync_single_page(&id, &config.root_dir).await?;
            tracing::info!("Synced {} pages", report.pages_synced);
        }
        Commands::Sync { page_id: None } => {
            let remote = engine.sync_from_remote().await?;
            let local = engine.sync_from_local().await?;
            tracing::info!(
                "Synced {} pages, {} files",
                remote.pages_synced,
                local.files_synced
            );

            if config.watch_mode {
                engine.start_watching()?;
                tokio::signal::ctrl_c().await?;
                engine.stop().await?;
            }
        }
    }

    Ok(())
}
