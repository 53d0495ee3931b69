use std::sync::Arc;

use tracing::{info, warn};

use crate::services::menu_cache::MenuCache;

/// Spawn a background task that re-scrapes the menu every `refresh_secs`.
/// The first refresh runs immediately.
pub fn start(cache: Arc<MenuCache>, refresh_secs: u64) {
    tokio::spawn(async move {
        loop {
            match cache.update().await {
                Ok(report) if report.failed.is_empty() => {
                    info!("Menu scheduler: {} cafeteria(s) refreshed", report.refreshed.len())
                }
                Ok(report) => warn!(
                    "Menu scheduler: refresh failed for {:?}, previous entries kept",
                    report.failed
                ),
                Err(e) => warn!("Menu scheduler: update error: {}", e),
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(refresh_secs.max(60))).await;
        }
    });
}
