use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};

use std::path::Path;

use crate::config::{Config, DEFAULT_MENU_URL};
use crate::models::cafeteria::Cafeteria;
use crate::services::accounts::AccountService;
use crate::services::menu_cache::MenuCache;
use crate::services::record_store::RecordStore;
use crate::services::scraper::MenuScraper;
use crate::services::search::SearchEngine;
use crate::AppState;

#[derive(Default)]
struct SiteState {
    pages: Mutex<HashMap<(String, String), String>>,
    failing: Mutex<HashSet<String>>,
    hits: AtomicUsize,
}

/// Local stand-in for the Studentenwerk menu site.
pub struct FakeMenuSite {
    url: String,
    state: Arc<SiteState>,
}

async fn speiseplan(
    State(state): State<Arc<SiteState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let mensa = params.get("selectmensa").cloned().unwrap_or_default();
    let push = params.get("push").cloned().unwrap_or_default();
    if state.failing.lock().unwrap().contains(&mensa) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(state
        .pages
        .lock()
        .unwrap()
        .get(&(mensa, push))
        .cloned()
        .unwrap_or_else(|| "<html><body></body></html>".to_string()))
}

impl FakeMenuSite {
    pub async fn start() -> Self {
        let state = Arc::new(SiteState::default());
        let app = Router::new()
            .route("/speiseplan.html", get(speiseplan))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{addr}/speiseplan.html"),
            state,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn set_page(&self, cafeteria: Cafeteria, next_week: bool, html: String) {
        let push = if next_week { "1" } else { "0" };
        self.state
            .pages
            .lock()
            .unwrap()
            .insert((cafeteria.name().to_string(), push.to_string()), html);
    }

    pub fn fail(&self, cafeteria: Cafeteria) {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(cafeteria.name().to_string());
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn nordmensa_page() -> String {
        crate::services::scraper::tests::NORDMENSA_PAGE.to_string()
    }
}

/// Configuration rooted at `data_root`, without SMTP.
pub fn test_config(data_root: &Path) -> Config {
    Config {
        data_root: data_root.to_path_buf(),
        menu_url: DEFAULT_MENU_URL.into(),
        cafeterias: Cafeteria::ALL.to_vec(),
        menu_refresh_secs: 60,
        host: "127.0.0.1".into(),
        port: 8080,
        app_base_url: "https://mensa.example.org/".into(),
        smtp_host: None,
        smtp_port: None,
        smtp_username: None,
        smtp_password: None,
        smtp_from: None,
    }
}

/// Application state backed by `site` and a store under `data_root`.
pub fn test_state(site: &FakeMenuSite, data_root: &Path) -> AppState {
    let mut config = test_config(data_root);
    config.menu_url = site.url();
    let users = RecordStore::open(config.users_dir()).unwrap();
    let cache = MenuCache::new(
        &config.data_root,
        MenuScraper::new(config.menu_url.clone()),
        config.cafeterias.clone(),
    );
    AppState {
        config: Arc::new(config),
        accounts: AccountService::new(users),
        search: SearchEngine::new(Arc::new(cache)),
        email: None,
    }
}
