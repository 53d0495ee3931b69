pub mod config;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use config::Config;
use services::accounts::AccountService;
use services::email::EmailService;
use services::search::SearchEngine;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: AccountService,
    pub search: SearchEngine,
    pub email: Option<Arc<EmailService>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Search
        .route("/json", get(routes::search::all))
        .route("/json/{cafeterias}", get(routes::search::by_cafeterias))
        .route("/json/{cafeterias}/{*queries}", get(routes::search::by_queries))
        .route("/today/{cafeterias}", get(routes::search::today))
        .route("/tomorrow/{cafeterias}", get(routes::search::tomorrow))
        // Accounts
        .route("/register", post(routes::accounts::register))
        .route("/login/{email}/{key}", get(routes::accounts::login))
        .route("/edit/{email}/{key}", put(routes::accounts::edit))
        .route(
            "/del/{email}/{key}",
            post(routes::accounts::request_deletion).get(routes::accounts::confirm_deletion),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
