use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One dish as scraped from a weekly menu page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub category: String,
    pub name: String,
    pub description: String,
}

impl MenuItem {
    /// Lowercased name + description, the text that queries match against.
    pub fn haystack(&self) -> String {
        format!("{}{}", self.name, self.description).to_lowercase()
    }
}

/// ISO date (`YYYY-MM-DD`) → items in scraped order.
pub type DayMenu = BTreeMap<String, Vec<MenuItem>>;

/// Cafeteria display name → its days.
pub type MenuCorpus = BTreeMap<String, DayMenu>;

/// One day heading of a weekly page together with its surviving items.
pub type DayEntry = (String, Vec<MenuItem>);

