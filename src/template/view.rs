use crate::page::Page;
use chrono::{DateTime, FixedOffset};
use minijinja::{
    Value,
    value::{Enumerator, Object},
};
use std::{collections::BTreeMap, sync::Arc};

/// A page as templates see it.
///
/// Content is shared with the page, so handing every page of the site to
/// every template costs a few small allocations per page, not a copy.
#[derive(Debug)]
pub struct PageView {
    pub source: String,
    pub path: String,
    /// Root-absolute: `/blog/a/`
    pub url: String,
    pub name: String,
    pub title: String,
    pub tags: Vec<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub hide: bool,
    pub other: BTreeMap<String, String>,
    pub raw: Arc<str>,
    pub content: Arc<str>,
}

const FIELDS: &[&str] = &[
    "source", "path", "url", "name", "title", "tags", "date", "hide", "other", "raw", "content",
];

impl PageView {
    pub fn new(page: &Page, raw: Arc<str>, content: Arc<str>) -> Self {
        Self {
            source: page.source.clone(),
            path: page.path.clone(),
            url: format!("/{}", page.url()),
            name: page.name().to_owned(),
            title: page.header.title.clone(),
            tags: page.header.tags.clone(),
            date: page.header.date,
            hide: page.header.hide,
            other: page.header.other.clone(),
            raw,
            content,
        }
    }

    pub fn into_value(self) -> Value {
        Value::from_object(self)
    }
}

impl Object for PageView {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let value = match key.as_str()? {
            "source" => Value::from(self.source.as_str()),
            "path" => Value::from(self.path.as_str()),
            "url" => Value::from(self.url.as_str()),
            "name" => Value::from(self.name.as_str()),
            "title" => Value::from(self.title.as_str()),
            "tags" => Value::from(self.tags.clone()),
            "date" => self
                .date
                .map_or(Value::from(()), |d| Value::from(d.to_rfc3339())),
            "hide" => Value::from(self.hide),
            "other" => Value::from_serialize(&self.other),
            "raw" => Value::from(Arc::clone(&self.raw)),
            "content" => Value::from(Arc::clone(&self.content)),
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(FIELDS)
    }
}
