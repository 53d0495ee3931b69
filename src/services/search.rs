use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::models::cafeteria::Cafeteria;
use crate::models::menu::{DayMenu, MenuCorpus, MenuItem};
use crate::services::menu_cache::{MenuCache, MenuCacheError};

// Matches as a lowercase substring or as a case-insensitive regex. An invalid
// regex leaves only the substring half.
struct CompiledQuery {
    needle: String,
    pattern: Option<Regex>,
}

impl CompiledQuery {
    fn new(query: &str) -> Self {
        let pattern = match RegexBuilder::new(query).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                debug!("Query {query:?} is not a valid regex, matching as text only: {e}");
                None
            }
        };
        Self {
            needle: query.to_lowercase(),
            pattern,
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        haystack.contains(&self.needle) || self.pattern.as_ref().is_some_and(|re| re.is_match(haystack))
    }
}

/// `corpus` restricted to `cafeterias`, leaving out cafeterias with no days.
pub fn overview(corpus: &MenuCorpus, cafeterias: &[Cafeteria]) -> MenuCorpus {
    cafeterias
        .iter()
        .filter_map(|c| {
            let days = corpus.get(c.name())?;
            (!days.is_empty()).then(|| (c.name().to_string(), days.clone()))
        })
        .collect()
}

/// Items of `cafeterias` matching any of `queries`. No queries means the overview.
pub fn search_many(corpus: &MenuCorpus, queries: &[String], cafeterias: &[Cafeteria]) -> MenuCorpus {
    let data = overview(corpus, cafeterias);
    if queries.is_empty() {
        return data;
    }

    let compiled: Vec<CompiledQuery> = queries.iter().map(|q| CompiledQuery::new(q)).collect();
    let keep = |item: &MenuItem| {
        let haystack = item.haystack();
        compiled.iter().any(|q| q.matches(&haystack))
    };

    let mut result = MenuCorpus::new();
    for (cafeteria, week) in data {
        let found: DayMenu = week
            .into_iter()
            .filter_map(|(day, menu)| {
                let items: Vec<MenuItem> = menu.into_iter().filter(|item| keep(item)).collect();
                (!items.is_empty()).then_some((day, items))
            })
            .collect();
        if !found.is_empty() {
            result.insert(cafeteria, found);
        }
    }
    result
}

/// `corpus` reduced to a single ISO date, dropping cafeterias without it.
pub fn on_day(corpus: &MenuCorpus, iso_date: &str) -> MenuCorpus {
    corpus
        .iter()
        .filter_map(|(cafeteria, week)| {
            let items = week.get(iso_date)?;
            let day: DayMenu = [(iso_date.to_string(), items.clone())].into_iter().collect();
            Some((cafeteria.clone(), day))
        })
        .collect()
}

/// Read-only query surface over the menu cache.
#[derive(Clone)]
pub struct SearchEngine {
    cache: Arc<MenuCache>,
}

impl SearchEngine {
    pub fn new(cache: Arc<MenuCache>) -> Self {
        Self { cache }
    }

    pub async fn overview(&self, cafeterias: &[Cafeteria]) -> Result<MenuCorpus, MenuCacheError> {
        Ok(overview(&*self.cache.get().await?, cafeterias))
    }

    pub async fn search_many(
        &self,
        queries: Option<&[String]>,
        cafeterias: &[Cafeteria],
    ) -> Result<MenuCorpus, MenuCacheError> {
        let corpus = self.cache.get().await?;
        Ok(search_many(&corpus, queries.unwrap_or_default(), cafeterias))
    }

    pub async fn search(&self, query: &str, cafeterias: &[Cafeteria]) -> Result<MenuCorpus, MenuCacheError> {
        let queries = [query.to_string()];
        self.search_many(Some(&queries[..]), cafeterias).await
    }
}
