//! DJ Sync Server
//!
//! Mirrors Spotify playlists into a local DJ library: audio is fetched with
//! yt-dlp, tagged, and listed in Serato crates, M3U playlists and a
//! Rekordbox XML library. The `djs` CLI drives it over TCP.

mod config;
mod events;
mod probe;
mod server;
mod spotify;
mod sync;
mod tagger;
mod youtube;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use config::{Config, Settings};
use events::TracingSink;
use youtube::YtDlp;

#[derive(Parser)]
#[command(name = "djsync-server")]
#[command(about = "Mirror Spotify playlists into a Serato and Rekordbox library")]
struct Cli {
    /// Path to the JSON settings file
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    /// Library root, overrides dj_library_directory
    #[arg(short, long)]
    drive: Option<PathBuf>,

    /// Address for CLI communication
    #[arg(long, default_value = "127.0.0.1:7878")]
    bind: String,

    /// Run one sync and exit (don't start server)
    #[arg(long)]
    sync_now: bool,

    /// Concurrent downloads per playlist
    #[arg(long)]
    max_workers: Option<usize>,

    /// Directory for daily log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Console plus a daily rolling file; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let file_appender = tracing_appender::rolling::daily(&cli.log_dir, "djsync.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()?;

    info!("DJ Sync Server starting");

    let mut settings = Settings::load(&cli.settings)?;
    if let Some(drive) = cli.drive {
        settings.dj_library_directory = drive;
    }
    if let Some(max_workers) = cli.max_workers {
        settings.max_workers = max_workers;
    }

    let config = Config {
        settings,
        bind_addr: cli.bind,
        log_dir: cli.log_dir,
    };
    info!("Library directory: {:?}", config.library_dir());
    info!("Playlists configured: {}", config.settings.total_playlists());

    match YtDlp::new(config.tracks_dir()).version().await {
        Ok(version) => info!("Using yt-dlp {}", version),
        Err(e) => warn!("yt-dlp is not available, downloads will fail: {}", e),
    }

    if cli.sync_now {
        // One-shot sync
        let summary = sync::run_sync(&config, &TracingSink).await?;
        info!(
            "Synced {} playlists: {} downloaded, {} skipped, {} failed",
            summary.playlists, summary.downloaded, summary.skipped, summary.failed
        );
    } else {
        // Run as server
        server::run(config).await?;
    }

    Ok(())
}
