use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mensanotify::config::Config;
use mensanotify::services::{
    accounts::AccountService, email::EmailService, menu_cache::MenuCache, menu_scheduler, metrics,
    record_store::RecordStore, scraper::MenuScraper, search::SearchEngine,
};
use mensanotify::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let users = RecordStore::open(config.users_dir())?;
    info!("User records under {}", users.root().display());

    let cache = Arc::new(MenuCache::new(
        &config.data_root,
        MenuScraper::new(config.menu_url.clone()),
        config.cafeterias.clone(),
    ));

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, login and deletion links cannot be mailed");
    }

    menu_scheduler::start(cache.clone(), config.menu_refresh_secs);
    metrics::start(users.clone());

    let state = AppState {
        config: config.clone(),
        accounts: AccountService::new(users),
        search: SearchEngine::new(cache),
        email,
    };

    let app = mensanotify::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("mensanotify API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
