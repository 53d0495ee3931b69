/// Refresh the menu snapshot and mail every user their search results.
/// Run periodically (e.g., via cron job: 0 9 * * 1-5 /app/update-and-notify)
///
/// Usage: update-and-notify [--skip-update]
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mensanotify::config::Config;
use mensanotify::services::{
    digest, email::EmailService, menu_cache::MenuCache, record_store::RecordStore,
    scraper::MenuScraper, search::SearchEngine,
};

#[derive(Parser)]
#[command(name = "update-and-notify", about = "Refresh menus and send search digests")]
struct Args {
    /// Use the existing snapshot instead of scraping first
    #[arg(long)]
    skip_update: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let email = EmailService::new(&config).context("SMTP is not configured")?;
    let users = RecordStore::open(config.users_dir())?;
    let cache = Arc::new(MenuCache::new(
        &config.data_root,
        MenuScraper::new(config.menu_url.clone()),
        config.cafeterias.clone(),
    ));

    if args.skip_update {
        tracing::info!("Skipping menu update");
    } else {
        let report = cache.update().await?;
        if !report.failed.is_empty() {
            tracing::warn!("Menu update failed for {:?}", report.failed);
        }
    }

    let report = digest::send_all(&users, &SearchEngine::new(cache), &email).await?;
    tracing::info!(
        "Done: {} digest(s) sent, {} failed",
        report.sent,
        report.failed
    );

    Ok(())
}
