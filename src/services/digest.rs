use std::future::Future;

use tracing::{info, warn};

use crate::models::menu::MenuCorpus;
use crate::models::user::UserRecord;
use crate::services::metrics::DIGEST_EMAILS_COUNTER;
use crate::services::record_store::RecordStore;
use crate::services::search::SearchEngine;

pub const SUBJECT: &str = "Mensa search results";

/// Delivers one user's search results.
pub trait DigestMailer {
    fn send_results(
        &self,
        email: &str,
        results: &MenuCorpus,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Plain-text body listing every matched item, grouped by cafeteria and day.
pub fn compose(email: &str, results: &MenuCorpus) -> String {
    let mut text = format!("Hello {email}, here are your results:\n\n");
    for (cafeteria, week) in results {
        text.push_str(&format!("{cafeteria}:\n"));
        for (day, items) in week {
            text.push_str(&format!("  {day}\n"));
            for item in items {
                text.push_str(&format!("    {} ({})\n", item.name, item.description));
            }
        }
    }
    text
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub sent: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Run every stored user's saved queries and mail the non-empty results.
pub async fn send_all<M: DigestMailer>(
    users: &RecordStore,
    search: &SearchEngine,
    mailer: &M,
) -> anyhow::Result<DigestReport> {
    let mut report = DigestReport::default();

    for email in users.keys()? {
        let prefs = match users
            .get(&email)
            .map(UserRecord::new)
            .and_then(|user| user.preferences())
        {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Digest: skipping {}: {}", email, e);
                report.failed += 1;
                DIGEST_EMAILS_COUNTER.with_label_values(&["error"]).inc();
                continue;
            }
        };
        if prefs.queries.is_empty() {
            continue;
        }

        let results = search
            .search_many(Some(prefs.queries.as_slice()), &prefs.cafeterias)
            .await?;
        if results.is_empty() {
            report.empty += 1;
            DIGEST_EMAILS_COUNTER.with_label_values(&["empty"]).inc();
            continue;
        }

        match mailer.send_results(&email, &results).await {
            Ok(()) => {
                report.sent += 1;
                DIGEST_EMAILS_COUNTER.with_label_values(&["sent"]).inc();
            }
            Err(e) => {
                warn!("Digest: failed to mail {}: {}", email, e);
                report.failed += 1;
                DIGEST_EMAILS_COUNTER.with_label_values(&["error"]).inc();
            }
        }
    }

    info!(
        "Digest: {} sent, {} without matches, {} failed",
        report.sent, report.empty, report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cafeteria::Cafeteria;
    use crate::models::menu::{DayMenu, MenuItem};
    use crate::services::menu_cache::MenuCache;
    use crate::services::scraper::MenuScraper;
    use crate::test_support::FakeMenuSite;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, MenuCorpus)>>,
        reject: Option<String>,
    }

    impl DigestMailer for RecordingMailer {
        async fn send_results(&self, email: &str, results: &MenuCorpus) -> anyhow::Result<()> {
            if self.reject.as_deref() == Some(email) {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), results.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_compose_layout() {
        let mut day = DayMenu::new();
        day.insert(
            "2024-10-14".into(),
            vec![MenuItem {
                category: "Tagesgericht".into(),
                name: "Spaghetti".into(),
                description: "mit Tomatensauce".into(),
            }],
        );
        let mut results = MenuCorpus::new();
        results.insert("Nordmensa".into(), day);

        assert_eq!(
            compose("alice@example.com", &results),
            "Hello alice@example.com, here are your results:\n\
             \n\
             Nordmensa:\n  2024-10-14\n    Spaghetti (mit Tomatensauce)\n"
        );
    }

    fn add_user(users: &RecordStore, email: &str, queries: &[&str]) {
        let user = UserRecord::new(users.get(email).unwrap());
        user.set_key("k").unwrap();
        user.set_del_key("").unwrap();
        user.set_cafeterias(&[Cafeteria::Nordmensa]).unwrap();
        let queries: Vec<String> = queries.iter().map(|q| q.to_string()).collect();
        user.set_queries(&queries).unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_record_is_counted_not_fatal() {
        let site = FakeMenuSite::start().await;
        site.set_page(Cafeteria::Nordmensa, false, FakeMenuSite::nordmensa_page());
        let tmp = TempDir::new().unwrap();
        let cache = MenuCache::new(tmp.path(), MenuScraper::new(site.url()), vec![Cafeteria::Nordmensa]);
        let search = SearchEngine::new(Arc::new(cache));
        let users = RecordStore::open(tmp.path().join("users")).unwrap();

        // a record without preferences
        users.get("bare@example.com").unwrap().set("key", "k").unwrap();
        add_user(&users, "zed@example.com", &["spaghetti"]);

        let mailer = RecordingMailer::default();
        let report = send_all(&users, &search, &mailer).await.unwrap();
        assert_eq!(report, DigestReport { sent: 1, empty: 0, failed: 1 });
        assert_eq!(mailer.sent.lock().unwrap()[0].0, "zed@example.com");
    }

    #[tokio::test]
    async fn test_send_all() {
        let site = FakeMenuSite::start().await;
        site.set_page(Cafeteria::Nordmensa, false, FakeMenuSite::nordmensa_page());
        let tmp = TempDir::new().unwrap();
        let cache = MenuCache::new(tmp.path(), MenuScraper::new(site.url()), vec![Cafeteria::Nordmensa]);
        let search = SearchEngine::new(Arc::new(cache));
        let users = RecordStore::open(tmp.path().join("users")).unwrap();

        add_user(&users, "alice@example.com", &["spaghetti"]);
        add_user(&users, "bob@example.com", &["sushi"]);
        add_user(&users, "carol@example.com", &[]);
        add_user(&users, "dave@example.com", &["curry"]);
        // not a record; must not stop the run
        std::fs::write(users.root().join("stray\\file"), "{}").unwrap();
        add_user(&users, "zed@example.com", &["spaghetti"]);

        let mailer = RecordingMailer {
            reject: Some("dave@example.com".into()),
            ..Default::default()
        };
        let report = send_all(&users, &search, &mailer).await.unwrap();
        assert_eq!(report, DigestReport { sent: 2, empty: 1, failed: 1 });

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "alice@example.com");
        assert_eq!(sent[1].0, "zed@example.com");
        assert_eq!(sent[0].1["Nordmensa"]["2024-10-14"][0].name, "Spaghetti");
    }
}
