use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec};
use tracing::{info, warn};

use crate::services::record_store::RecordStore;

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref MENU_FETCH_COUNTER: CounterVec = register_counter_vec!(
        "menu_page_fetches_total",
        "Weekly menu page fetches by cafeteria and status",
        &["cafeteria", "status"]
    ).unwrap();

    pub static ref MENU_ROWS_SKIPPED_COUNTER: CounterVec = register_counter_vec!(
        "menu_rows_skipped_total",
        "Malformed menu rows or day headings skipped while scraping",
        &["cafeteria"]
    ).unwrap();

    pub static ref DIGEST_EMAILS_COUNTER: CounterVec = register_counter_vec!(
        "digest_emails_total",
        "Digest emails by status",
        &["status"]
    ).unwrap();

    // ── Snapshot / store metrics ────────────────────────────────────────────
    pub static ref MENU_ITEMS_GAUGE: GaugeVec = register_gauge_vec!(
        "menu_items_current",
        "Items in the current menu snapshot by cafeteria",
        &["cafeteria"]
    ).unwrap();

    pub static ref USERS_GAUGE: Gauge = register_gauge!(
        "registered_users_total",
        "Registered user records"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(users: RecordStore) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = collect(&users) {
                warn!("Metrics: collection failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
        }
    });
}

fn collect(users: &RecordStore) -> anyhow::Result<()> {
    let count = users.keys()?.len();
    USERS_GAUGE.set(count as f64);
    info!("Metrics: {} registered user(s)", count);
    Ok(())
}
