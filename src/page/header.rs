//! Page header metadata.
//!
//! Known keys go through an explicit setter table; everything else is kept
//! verbatim in `other` under its lower-cased key.
//!
//! | key     | kind   | notes                                      |
//! |---------|--------|--------------------------------------------|
//! | `title` | text   |                                            |
//! | `tags`  | list   | comma separated, trimmed, de-duplicated    |
//! | `date`  | date   | see [`parse_date`]                         |
//! | `hide`  | bool   | false only for `false`/`False`/`FALSE`/`f` |

use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageHeader {
    pub title: String,
    pub tags: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub date: Option<DateTime<FixedOffset>>,
    pub hide: bool,
    pub other: BTreeMap<String, String>,
}

/// A header value before it is assigned to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Text(String),
    List(Vec<String>),
    Bool(bool),
}

impl HeaderValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::List(items) => items.join(", "),
            Self::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Tags,
    Date,
    Hide,
}

fn field(key: &str) -> Option<Field> {
    match key {
        "title" => Some(Field::Title),
        "tags" => Some(Field::Tags),
        "date" => Some(Field::Date),
        "hide" => Some(Field::Hide),
        _ => None,
    }
}

impl PageHeader {
    /// Assign one header entry.
    pub fn set(&mut self, key: &str, value: HeaderValue) -> Result<()> {
        let key = key.trim().to_ascii_lowercase();
        match field(&key) {
            Some(Field::Title) => self.title = value.into_text(),
            Some(Field::Tags) => {
                let tags = match value {
                    HeaderValue::List(items) => items,
                    other => split_tags(&other.into_text()),
                };
                self.add_tags(tags);
            }
            Some(Field::Date) => {
                let text = value.into_text();
                let date = parse_date(&text).ok_or_else(|| anyhow!("invalid date `{text}`"))?;
                self.date = Some(date);
            }
            Some(Field::Hide) => {
                self.hide = match value {
                    HeaderValue::Bool(b) => b,
                    other => parse_bool(&other.into_text()),
                };
            }
            None => {
                self.other.insert(key, value.into_text());
            }
        }
        Ok(())
    }

    /// Parse `key: value` lines. Lines without a colon are reported and skipped.
    pub fn parse_lines(&mut self, text: &str) -> Result<()> {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.split_once(':') {
                Some((key, value)) => self.set(key, HeaderValue::Text(value.trim().to_owned()))?,
                None => crate::log!("warn"; "skipping header line `{line}`"),
            }
        }
        Ok(())
    }

    pub fn add_tags(&mut self, tags: impl IntoIterator<Item = String>) {
        for tag in tags {
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}

fn split_tags(text: &str) -> Vec<String> {
    text.split(',').map(|t| t.trim().to_owned()).collect()
}

fn parse_bool(text: &str) -> bool {
    !matches!(text.trim(), "false" | "False" | "FALSE" | "f")
}

fn serialize_date<S: Serializer>(
    date: &Option<DateTime<FixedOffset>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => s.serialize_some(&d.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// Dates
// ============================================================================

const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %#z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a header date. Dates without a zone are taken as UTC.
///
/// Accepted, in order: RFC3339, `2006-01-02 15:04:05 -0700`,
/// `2006-01-02 15:04:05 -07`, `2006-01-02T15:04:05Z`, `2006-01-02 15:04:05`,
/// `2006-01-02 15:04`, `2006-01-02 15`, `2006-01-02`, `06-01-02`.
pub fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date);
    }
    if let Some(date) = ZONED_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(date);
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(naive.and_utc().fixed_offset());
    }

    // `2006-01-02 15`: chrono wants minutes, so the hour is handled here
    if let Some((day, hour)) = text.split_once(' ') {
        let hour: u32 = hour.parse().ok()?;
        let naive = parse_day(day)?.and_hms_opt(hour, 0, 0)?;
        return Some(naive.and_utc().fixed_offset());
    }

    let naive = parse_day(text)?.and_hms_opt(0, 0, 0)?;
    Some(naive.and_utc().fixed_offset())
}

/// `2006-01-02` or `06-01-02`.
fn parse_day(text: &str) -> Option<NaiveDate> {
    let year_len = text.split('-').next().map_or(0, str::len);
    let fmt = match year_len {
        4 => "%Y-%m-%d",
        2 => "%y-%m-%d",
        _ => return None,
    };
    NaiveDate::parse_from_str(text, fmt).ok()
}

// ============================================================================
// Tests
// ============================================================================
