use chrono::{Datelike, Duration, Local, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// Format of the day headings on the weekly menu pages.
pub const HEADING_FORMAT: &str = "%A, %d. %B %Y";

const EN_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const EN_WEEKDAYS: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

const DE_MONTHS: [&str; 12] = [
    "Januar", "Februar", "März", "April", "Mai", "Juni", "Juli", "August", "September",
    "Oktober", "November", "Dezember",
];

const DE_MONTH_ABBREVS: [(&str, usize); 14] = [
    ("jan", 0), ("feb", 1), ("mär", 2), ("mrz", 2), ("apr", 3), ("mai", 4), ("jun", 5),
    ("jul", 6), ("aug", 7), ("sep", 8), ("sept", 8), ("okt", 9), ("nov", 10), ("dez", 11),
];

const DE_WEEKDAYS: [&str; 7] = [
    "Montag", "Dienstag", "Mittwoch", "Donnerstag", "Freitag", "Samstag", "Sonntag",
];

const DE_WEEKDAY_ABBREVS: [(&str, usize); 8] = [
    ("mo", 0), ("di", 1), ("mi", 2), ("do", 3), ("fr", 4), ("sa", 5), ("sonnabend", 5), ("so", 6),
];

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\p{L}+").expect("static regex");
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DateError {
    #[error("'{text}' does not match date format '{format}'")]
    Parse { text: String, format: String },
    #[error("unsupported locale '{0}'")]
    UnknownLocale(String),
}

/// Language of month and weekday names. Localized words are mapped onto the
/// English names before chrono parses, so no process locale is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    German,
    English,
}

impl std::str::FromStr for Locale {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "de", "de_DE", "de_DE.UTF-8" and the like.
        let lang = s.split(['_', '-', '.']).next().unwrap_or_default();
        match lang.to_ascii_lowercase().as_str() {
            "de" => Ok(Locale::German),
            "en" | "c" => Ok(Locale::English),
            _ => Err(DateError::UnknownLocale(s.to_string())),
        }
    }
}

impl Locale {
    fn month_index(self, word: &str) -> Option<usize> {
        let names: &[&str; 12] = match self {
            Locale::German => &DE_MONTHS,
            Locale::English => &EN_MONTHS,
        };
        if let Some(i) = names.iter().position(|m| m.to_lowercase() == word) {
            return Some(i);
        }
        match self {
            Locale::German => DE_MONTH_ABBREVS.iter().find(|(a, _)| *a == word).map(|(_, i)| *i),
            Locale::English => None,
        }
    }

    fn weekday_index(self, word: &str) -> Option<usize> {
        let names: &[&str; 7] = match self {
            Locale::German => &DE_WEEKDAYS,
            Locale::English => &EN_WEEKDAYS,
        };
        if let Some(i) = names.iter().position(|d| d.to_lowercase() == word) {
            return Some(i);
        }
        match self {
            Locale::German => DE_WEEKDAY_ABBREVS.iter().find(|(a, _)| *a == word).map(|(_, i)| *i),
            Locale::English => None,
        }
    }

    fn weekday_name(self, index: usize) -> &'static str {
        match self {
            Locale::German => DE_WEEKDAYS[index],
            Locale::English => EN_WEEKDAYS[index],
        }
    }

    /// Rewrite every localized month/weekday word into its English form.
    fn anglicize(self, text: &str) -> String {
        WORD.replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            let lower = word.to_lowercase();
            if let Some(i) = self.month_index(&lower) {
                EN_MONTHS[i].to_string()
            } else if let Some(i) = self.weekday_index(&lower) {
                EN_WEEKDAYS[i].to_string()
            } else {
                word.to_string()
            }
        })
        .into_owned()
    }
}

/// Parse `text` with `format` under `locale`'s names into `YYYY-MM-DD`.
pub fn normalize(text: &str, format: &str, locale: Locale) -> Result<String, DateError> {
    let english = locale.anglicize(text.trim());
    NaiveDate::parse_from_str(&english, format)
        .map(from_date)
        .map_err(|_| DateError::Parse {
            text: text.to_string(),
            format: format.to_string(),
        })
}

fn parse_iso(iso_date: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(iso_date, ISO_FORMAT).map_err(|_| DateError::Parse {
        text: iso_date.to_string(),
        format: ISO_FORMAT.to_string(),
    })
}

/// English weekday name of an ISO date.
pub fn to_weekday(iso_date: &str) -> Result<String, DateError> {
    to_weekday_in(iso_date, Locale::English)
}

pub fn to_weekday_in(iso_date: &str, locale: Locale) -> Result<String, DateError> {
    let date = parse_iso(iso_date)?;
    let index = date.weekday().num_days_from_monday() as usize;
    Ok(locale.weekday_name(index).to_string())
}

pub fn from_date(date: NaiveDate) -> String {
    date.format(ISO_FORMAT).to_string()
}

pub fn today() -> String {
    from_date(Local::now().date_naive())
}

pub fn tomorrow() -> String {
    from_date(Local::now().date_naive() + Duration::days(1))
}
