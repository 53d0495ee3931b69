use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::models::cafeteria::Cafeteria;
use crate::models::menu::{DayMenu, MenuCorpus};
use crate::services::atomic_file::atomic_write;
use crate::services::metrics::MENU_ITEMS_GAUGE;
use crate::services::scraper::MenuScraper;

pub const SNAPSHOT_FILE: &str = "mensa_data.json";

#[derive(Debug, thiserror::Error)]
pub enum MenuCacheError {
    #[error("could not access menu snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("menu snapshot {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Outcome of one `update()` cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub refreshed: Vec<Cafeteria>,
    /// Fetch failed; the previous snapshot entry (if any) was kept.
    pub failed: Vec<Cafeteria>,
}

#[derive(Default)]
struct Snapshot {
    corpus: Arc<MenuCorpus>,
    mtime: Option<SystemTime>,
}

/// On-disk menu snapshot with an in-memory copy that is reloaded whenever the
/// file's modification time changes.
pub struct MenuCache {
    path: PathBuf,
    scraper: MenuScraper,
    cafeterias: Vec<Cafeteria>,
    snapshot: RwLock<Snapshot>,
    // Serializes writers; readers only take `snapshot`.
    updating: tokio::sync::Mutex<()>,
}

impl MenuCache {
    pub fn new(data_root: &Path, scraper: MenuScraper, cafeterias: Vec<Cafeteria>) -> Self {
        Self {
            path: data_root.join(SNAPSHOT_FILE),
            scraper,
            cafeterias,
            snapshot: RwLock::new(Snapshot::default()),
            updating: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cafeterias(&self) -> &[Cafeteria] {
        &self.cafeterias
    }

    fn io_error(&self, source: std::io::Error) -> MenuCacheError {
        MenuCacheError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn current(&self) -> Arc<MenuCorpus> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .corpus
            .clone()
    }

    fn install(&self, corpus: MenuCorpus, mtime: SystemTime) -> Arc<MenuCorpus> {
        let corpus = Arc::new(corpus);
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.corpus = corpus.clone();
        snapshot.mtime = Some(mtime);
        corpus
    }

    fn read_disk(&self) -> Result<(MenuCorpus, SystemTime), MenuCacheError> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let mtime = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| self.io_error(e))?;
        let corpus = serde_json::from_str(&text).map_err(|source| MenuCacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok((corpus, mtime))
    }

    /// Current corpus. Reloads from disk when the snapshot changed since it was
    /// last read, and scrapes synchronously when no snapshot exists yet.
    pub async fn get(&self) -> Result<Arc<MenuCorpus>, MenuCacheError> {
        let on_disk = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let guard = self.updating.lock().await;
                // Another caller may have written it while we waited.
                if !self.path.exists() {
                    info!("No menu snapshot at {}, scraping now", self.path.display());
                    self.refresh().await?;
                    return Ok(self.current());
                }
                drop(guard);
                let (corpus, mtime) = self.read_disk()?;
                return Ok(self.install(corpus, mtime));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let seen = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .mtime;
        if seen == Some(on_disk) {
            return Ok(self.current());
        }

        let (corpus, mtime) = self.read_disk()?;
        Ok(self.install(corpus, mtime))
    }

    /// Re-scrape every configured cafeteria and replace the snapshot wholesale.
    ///
    /// A cafeteria whose page cannot be fetched keeps its entry from the previous
    /// snapshot instead of failing the whole cycle.
    pub async fn update(&self) -> Result<UpdateReport, MenuCacheError> {
        let _guard = self.updating.lock().await;
        self.refresh().await
    }

    // Caller holds `updating`.
    async fn refresh(&self) -> Result<UpdateReport, MenuCacheError> {
        let previous = match self.read_disk() {
            Ok((corpus, _)) => Arc::new(corpus),
            Err(_) => self.current(),
        };

        let results = join_all(self.cafeterias.iter().map(|&cafeteria| async move {
            (cafeteria, self.scraper.fetch_weeks(cafeteria).await)
        }))
        .await;

        let mut report = UpdateReport::default();
        let mut corpus = MenuCorpus::new();
        for (cafeteria, result) in results {
            match result {
                Ok(days) => {
                    let menu: DayMenu = days.into_iter().collect();
                    corpus.insert(cafeteria.name().to_string(), menu);
                    report.refreshed.push(cafeteria);
                }
                Err(e) => {
                    warn!("Menu update: {e}; keeping previous snapshot entry");
                    if let Some(menu) = previous.get(cafeteria.name()) {
                        corpus.insert(cafeteria.name().to_string(), menu.clone());
                    }
                    report.failed.push(cafeteria);
                }
            }
        }

        for cafeteria in &self.cafeterias {
            let items: usize = corpus
                .get(cafeteria.name())
                .map(|days| days.values().map(Vec::len).sum())
                .unwrap_or(0);
            MENU_ITEMS_GAUGE
                .with_label_values(&[cafeteria.name()])
                .set(items as f64);
        }

        let body = serde_json::to_vec(&corpus).map_err(|source| MenuCacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        atomic_write(&self.path, &body).map_err(|e| self.io_error(e))?;
        let mtime = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| self.io_error(e))?;
        self.install(corpus, mtime);

        info!(
            "Menu update: {} cafeteria(s) refreshed, {} failed",
            report.refreshed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
