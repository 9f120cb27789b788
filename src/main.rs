//! Hikkoshi CLI - syncs MangaDex follows to an AniList list.

use anyhow::{Context, Result};
use clap::Parser;
use hikkoshi::catalog::{AniListClient, MangaDexClient};
use hikkoshi::config::Config;
use hikkoshi::console::Console;
use hikkoshi::http::HttpTransport;
use hikkoshi::retry::TokioSleeper;
use hikkoshi::store::{JsonProgressStore, StatusSnapshotCache, write_non_matched_report};
use hikkoshi::sync::{SyncEngine, SyncReport, load_status_table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sync your MangaDex reading list to AniList.
#[derive(Parser, Debug)]
#[command(name = "hikkoshi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Refetch the follow list instead of using the cached snapshot.
    #[arg(long)]
    force_refresh: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Use this config file instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    dotenvy::dotenv().ok();

    console.section("Hikkoshi - MangaDex to AniList");

    console.step("Loading configuration...");
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path).context("Failed to load configuration")?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = config.validate() {
        console.warning(&format!("{}", e));
        console.info(&format!(
            "Set your credentials in {} or in a .env file and run again.",
            config_path.display()
        ));
        return Err(e).context("Invalid configuration");
    }

    init_tracing(&config.logging.level);
    console.success("Configuration loaded");

    let transport = Arc::new(HttpTransport::new().context("Failed to build HTTP client")?);
    let sleeper = Arc::new(TokioSleeper);
    let policy = config.retry.policy();

    let mut mangadex = MangaDexClient::new(
        config.mangadex.clone(),
        transport.clone(),
        policy,
        sleeper.clone(),
    );
    let anilist = AniListClient::new(config.anilist.clone(), transport, policy, sleeper.clone());

    let cache = StatusSnapshotCache::new(config.statuses_path());
    let statuses = load_status_table(&mut mangadex, &cache, args.force_refresh, &console)
        .await
        .context("Failed to load the follow list")?;

    let store = JsonProgressStore::new(config.progress_path());
    let mut engine = SyncEngine::new(anilist, store, sleeper, Console::new())
        .with_pacing(config.sync.pacing_delay());

    let report = engine
        .run(&mut mangadex, &statuses)
        .await
        .context("Sync aborted; progress was saved, run again to resume")?;

    let report_path = config.non_matched_path();
    write_non_matched_report(&report_path, engine.checkpoint())
        .context("Failed to write the manual review list")?;
    print_summary(&console, &report, engine.checkpoint().non_matched().len(), &report_path);

    Ok(())
}

/// Installs the tracing subscriber. `RUST_LOG` wins over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_summary(console: &Console, report: &SyncReport, review_total: usize, report_path: &Path) {
    console.section("Done!");
    console.summary_line("Follows", report.total);
    console.summary_line("Synced earlier", report.previously_processed);
    console.summary_line("Matched", report.matched);
    console.summary_line("Not found", report.not_found);
    console.summary_line("No title", report.extract_failed);
    console.summary_line("Bad search response", report.search_errors);
    console.summary_line("Skipped (will retry)", report.skipped);

    if review_total > 0 {
        console.warning(&format!(
            "{} manga need manual review, see {}",
            console.count(review_total),
            report_path.display()
        ));
    }
}
