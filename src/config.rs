use std::env;
use std::path::PathBuf;

use crate::models::cafeteria::{self, Cafeteria};

pub const DEFAULT_MENU_URL: &str = "http://www.studentenwerk-goettingen.de/speiseplan.html";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_root: PathBuf,
    pub menu_url: String,
    pub cafeterias: Vec<Cafeteria>,
    pub menu_refresh_secs: u64,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            data_root: env::var("DATA_ROOT").unwrap_or_else(|_| "./data".into()).into(),
            menu_url: env::var("MENU_URL").unwrap_or_else(|_| DEFAULT_MENU_URL.into()),
            cafeterias: cafeteria::decode_list(&env::var("CAFETERIAS").unwrap_or_default())?,
            menu_refresh_secs: env::var("MENU_REFRESH_SECS")
                .unwrap_or_else(|_| "21600".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_root.join("users")
    }
}
