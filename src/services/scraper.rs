use lazy_static::lazy_static;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::models::cafeteria::Cafeteria;
use crate::models::menu::{DayEntry, MenuItem};
use crate::services::date::{self, Locale, HEADING_FORMAT};
use crate::services::metrics::{MENU_FETCH_COUNTER, MENU_ROWS_SKIPPED_COUNTER};

/// Marks semester-break notices, which replace the whole menu.
const BREAK_MARKER: &str = "vorlesungsfrei";

/// Fixed boilerplate entries that are not dishes.
const BLACKLIST: &[&str] = &[
    "Im täglichen Wechsel:",
    "Außerdem bieten wir Ihnen ein Salatbuffet in Selbstbedienung",
    "Verschiedene Salat- und Nudelvariationen, in Selbstbedienung!",
];

lazy_static! {
    static ref DAY_HEADING: Selector = Selector::parse("div.speise-tblhead").unwrap();
    static ref STRONG: Selector = Selector::parse("strong").unwrap();
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("failed to fetch menu page for {cafeteria}: {source}")]
    Fetch {
        cafeteria: Cafeteria,
        #[source]
        source: reqwest::Error,
    },
}

/// Result of parsing one weekly page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScrapedWeek {
    pub days: Vec<DayEntry>,
    /// Rows and day headings dropped because they did not have the expected shape.
    pub skipped: usize,
}

fn blacklisted_name(name: &str) -> bool {
    name.is_empty() || name.contains(BREAK_MARKER) || BLACKLIST.contains(&name)
}

fn blacklisted_description(description: &str) -> bool {
    description.contains(BREAK_MARKER) || BLACKLIST.iter().any(|b| description.contains(b))
}

fn first_child_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.children().find_map(ElementRef::wrap)
}

fn child_elements(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Rows of a day table, looking through the implicit `tbody` the HTML parser inserts.
fn rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match child.value().name() {
            "tbody" | "thead" | "tfoot" => rows.extend(child_elements(child)),
            _ => rows.push(child),
        }
    }
    rows
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outcome of a single table row.
enum Row {
    Item(MenuItem),
    Dropped,
    Malformed,
}

fn parse_row(row: ElementRef<'_>) -> Row {
    let cells: Vec<ElementRef<'_>> = child_elements(row)
        .filter_map(first_child_element)
        .take(2)
        .collect();
    let [category, item] = cells.as_slice() else {
        return Row::Malformed;
    };

    let mut emphasized = item.select(&STRONG);
    let (Some(name_el), None) = (emphasized.next(), emphasized.next()) else {
        return Row::Malformed;
    };

    let name = collapse(&name_el.text().collect::<String>());
    if name.is_empty() {
        return Row::Dropped;
    }

    let description = name_el
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|t| collapse(t)))
        .unwrap_or_default();

    if blacklisted_name(&name) || blacklisted_description(&description) {
        return Row::Dropped;
    }

    Row::Item(MenuItem {
        category: collapse(&category.text().collect::<String>()),
        name,
        description,
    })
}

/// Parse a weekly page into `(iso date, items)` pairs in page order.
///
/// Each `div.speise-tblhead` heading is followed by a `category | dish` table;
/// the dish name is the cell's `<strong>`, the description the text after it.
/// Rows of any other shape are skipped and counted.
pub fn parse_week(html: &str) -> ScrapedWeek {
    let document = Html::parse_document(html);

    let mut week = ScrapedWeek::default();
    for head in document.select(&DAY_HEADING) {
        let text = head.text().collect::<String>();
        let date = match date::normalize(&collapse(&text), HEADING_FORMAT, Locale::German) {
            Ok(d) => d,
            Err(e) => {
                debug!("Skipping day heading: {e}");
                week.skipped += 1;
                continue;
            }
        };

        let Some(table) = head.next_siblings().find_map(ElementRef::wrap) else {
            week.skipped += 1;
            continue;
        };

        let mut menu = Vec::new();
        for row in rows(table) {
            match parse_row(row) {
                Row::Item(item) => menu.push(item),
                Row::Dropped => {}
                Row::Malformed => week.skipped += 1,
            }
        }

        if !menu.is_empty() {
            week.days.push((date, menu));
        }
    }
    week
}

/// Fetches weekly menu pages from the Studentenwerk site.
#[derive(Clone)]
pub struct MenuScraper {
    client: Client,
    base_url: String,
}

impl MenuScraper {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch and parse the current (or next) week of one cafeteria.
    /// Every call goes to the network.
    pub async fn fetch_week(
        &self,
        cafeteria: Cafeteria,
        next_week: bool,
    ) -> Result<Vec<DayEntry>, ScrapeError> {
        let push = if next_week { "1" } else { "0" };
        let body = self
            .client
            .get(&self.base_url)
            .query(&[
                ("no_cache", "1"),
                ("selectmensa", cafeteria.name()),
                ("day", "7"),
                ("push", push),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let body = match body {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };

        let body = body.map_err(|source| {
            MENU_FETCH_COUNTER
                .with_label_values(&[cafeteria.name(), "error"])
                .inc();
            ScrapeError::Fetch { cafeteria, source }
        })?;

        let week = parse_week(&body);
        MENU_FETCH_COUNTER
            .with_label_values(&[cafeteria.name(), "ok"])
            .inc();
        if week.skipped > 0 {
            warn!(
                "{}: skipped {} malformed row(s) (next_week={})",
                cafeteria, week.skipped, next_week
            );
            MENU_ROWS_SKIPPED_COUNTER
                .with_label_values(&[cafeteria.name()])
                .inc_by(week.skipped as f64);
        }
        Ok(week.days)
    }

    /// Current week followed by next week.
    pub async fn fetch_weeks(&self, cafeteria: Cafeteria) -> Result<Vec<DayEntry>, ScrapeError> {
        let mut days = self.fetch_week(cafeteria, false).await?;
        days.extend(self.fetch_week(cafeteria, true).await?);
        Ok(days)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const NORDMENSA_PAGE: &str = r#"<html><body>
<div class="speise-tblhead">Montag, 14. Oktober 2024</div>
<table class="speise-tbl">
  <tr><td><span>Tagesgericht</span></td><td><p><strong>Spaghetti</strong> mit Tomatensauce</p></td></tr>
  <tr><td><span>Beilage</span></td><td><p><strong>Im täglichen Wechsel:</strong></p></td></tr>
  <tr><td><span>Salat</span></td><td><p><strong>Salat</strong> Außerdem bieten wir Ihnen ein Salatbuffet in Selbstbedienung</p></td></tr>
  <tr><td colspan="2">Allergene siehe Aushang</td></tr>
</table>
<div class="speise-tblhead">Dienstag, 15. Oktober 2024</div>
<table class="speise-tbl">
  <tr><td><span>Hinweis</span></td><td><p><strong>vorlesungsfrei</strong></p></td></tr>
</table>
<div class="speise-tblhead">Mittwoch, 16. Oktober 2024</div>
<table class="speise-tbl">
  <tr><td><span>Vegetarisch</span></td><td><p><strong>Gemüsecurry</strong> mit Reis</p></td></tr>
  <tr><td><span>Dessert</span></td><td><p><strong></strong>leer</p></td></tr>
  <tr><td><span>Aktion</span></td><td><p><strong>Pasta</strong></p></td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_parse_week() {
        let week = parse_week(NORDMENSA_PAGE);
        assert_eq!(
            week.days,
            vec![
                (
                    "2024-10-14".to_string(),
                    vec![MenuItem {
                        category: "Tagesgericht".into(),
                        name: "Spaghetti".into(),
                        description: "mit Tomatensauce".into(),
                    }]
                ),
                (
                    "2024-10-16".to_string(),
                    vec![
                        MenuItem {
                            category: "Vegetarisch".into(),
                            name: "Gemüsecurry".into(),
                            description: "mit Reis".into(),
                        },
                        MenuItem {
                            category: "Aktion".into(),
                            name: "Pasta".into(),
                            description: String::new(),
                        },
                    ]
                ),
            ]
        );
        // only the single-cell notice row is malformed
        assert_eq!(week.skipped, 1);
    }

    #[test]
    fn test_no_empty_days_and_no_blacklisted_items() {
        let week = parse_week(NORDMENSA_PAGE);
        for (_, items) in &week.days {
            assert!(!items.is_empty());
            for item in items {
                assert!(!blacklisted_name(&item.name));
                assert!(!blacklisted_description(&item.description));
            }
        }
    }

    #[test]
    fn test_unparsable_heading_is_skipped() {
        let html = r#"<div class="speise-tblhead">Heute</div>
<table><tr><td><b>Tagesgericht</b></td><td><p><strong>Suppe</strong></p></td></tr></table>"#;
        let week = parse_week(html);
        assert!(week.days.is_empty());
        assert_eq!(week.skipped, 1);
    }

    #[test]
    fn test_row_with_two_strongs_is_skipped() {
        let html = r#"<div class="speise-tblhead">Montag, 14. Oktober 2024</div>
<table>
<tr><td><b>A</b></td><td><p><strong>Eins</strong> und <strong>Zwei</strong></p></td></tr>
<tr><td><b>B</b></td><td><p><strong>Drei</strong> dazu Brot</p></td></tr>
</table>"#;
        let week = parse_week(html);
        assert_eq!(week.skipped, 1);
        assert_eq!(week.days.len(), 1);
        assert_eq!(week.days[0].1[0].name, "Drei");
        assert_eq!(week.days[0].1[0].description, "dazu Brot");
    }

    #[test]
    fn test_blacklist() {
        assert!(blacklisted_name(""));
        assert!(blacklisted_name("heute vorlesungsfrei"));
        assert!(blacklisted_name("Im täglichen Wechsel:"));
        assert!(!blacklisted_name("Im täglichen Wechsel: Suppe"));
        assert!(!blacklisted_description(""));
        assert!(blacklisted_description(
            "Verschiedene Salat- und Nudelvariationen, in Selbstbedienung!"
        ));
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(parse_week("<html></html>"), ScrapedWeek::default());
    }
}
