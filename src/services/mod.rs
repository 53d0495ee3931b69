pub mod accounts;
pub mod atomic_file;
pub mod date;
pub mod digest;
pub mod email;
pub mod menu_cache;
pub mod menu_scheduler;
pub mod metrics;
pub mod record_store;
pub mod scraper;
pub mod search;
