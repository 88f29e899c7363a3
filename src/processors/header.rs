//! Header processors: split metadata off the top of a page.
//!
//! ```text
//! config, front-matter style    config, classic style     yaml
//!
//! ---                           title: Hello              ---
//! title: Hello                  tags: a, b                title: Hello
//! ---                           ----                      tags: [a, b]
//! body                          body                      ---
//!                                                         body
//! ```
//!
//! Parsed entries are merged into the existing header, so values set
//! before (a synthetic page's title) survive unless overridden. A page
//! without a separator keeps its content and header as they are.

use super::{Mode, Processor};
use crate::{
    page::{HeaderValue, PageHeader, PageId},
    site::Site,
};
use anyhow::{Context, Result};
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

/// `---` or `----` on a line of its own.
static SHORT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^----?\r?\n").unwrap());

/// Exactly `----` on a line of its own.
static CLASSIC_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^----\r?\n").unwrap());

static YAML_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?sm)\A---\r?\n(.*?)^---\r?\n(.*)\z").unwrap());

// ============================================================================
// config
// ============================================================================

pub struct Config;

impl Processor for Config {
    fn description(&self) -> &'static str {
        "read `key: value` header from content (separated by '----')"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let content = site.page(page).content_handle()?;
        let Some((header, body)) = split_config(&content) else {
            return Ok(());
        };

        let page = site.page_mut(page);
        page.header.parse_lines(header)?;
        page.set_content(body);
        Ok(())
    }
}

/// Split into `(header, body)`, or `None` when there is no header.
fn split_config(content: &str) -> Option<(&str, &str)> {
    match SHORT_SEPARATOR.find(content) {
        Some(open) if open.start() == 0 => {
            let rest = &content[open.end()..];
            let close = SHORT_SEPARATOR.find(rest)?;
            Some((&rest[..close.start()], &rest[close.end()..]))
        }
        _ => {
            let sep = CLASSIC_SEPARATOR.find(content)?;
            Some((&content[..sep.start()], &content[sep.end()..]))
        }
    }
}

// ============================================================================
// yaml
// ============================================================================

pub struct Yaml;

impl Processor for Yaml {
    fn description(&self) -> &'static str {
        "read YAML header from content (between '---' lines)"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let content = site.page(page).content_handle()?;
        let Some(caps) = YAML_BLOCK.captures(&content) else {
            return Ok(());
        };
        let (header, body) = (&caps[1], &caps[2]);

        let page = site.page_mut(page);
        apply_yaml(&mut page.header, header)?;
        page.set_content(body);
        Ok(())
    }
}

fn apply_yaml(header: &mut PageHeader, text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }
    let doc: Value = serde_yaml::from_str(text).context("Invalid YAML header")?;
    let Value::Mapping(map) = doc else {
        // An empty block parses as null
        return Ok(());
    };

    for (key, value) in map {
        let key = scalar(key).context("YAML header keys must be scalars")?;
        header.set(&key, header_value(value)?)?;
    }
    Ok(())
}

fn header_value(value: Value) -> Result<HeaderValue> {
    Ok(match value {
        Value::Bool(b) => HeaderValue::Bool(b),
        Value::Sequence(items) => {
            HeaderValue::List(items.into_iter().filter_map(scalar).collect())
        }
        Value::Mapping(_) | Value::Tagged(_) => {
            HeaderValue::Text(serde_yaml::to_string(&value)?.trim_end().to_owned())
        }
        other => HeaderValue::Text(scalar(other).unwrap_or_default()),
    })
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_split_front_matter() {
        let (header, body) = split_config("---\ntitle: A\n---\nbody\n").unwrap();
        assert_eq!(header, "title: A\n");
        assert_eq!(body, "body\n");
    }

    #[test]
    fn test_split_front_matter_four_dashes() {
        let (header, body) = split_config("----\ntitle: A\n----\nbody").unwrap();
        assert_eq!(header, "title: A\n");
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_classic() {
        let (header, body) = split_config("title: A\ntags: x\n----\nbody\n---\nmore").unwrap();
        assert_eq!(header, "title: A\ntags: x\n");
        assert_eq!(body, "body\n---\nmore");
    }

    #[test]
    fn test_split_crlf() {
        let (header, body) = split_config("title: A\r\n----\r\nbody").unwrap();
        assert_eq!(header, "title: A\r\n");
        assert_eq!(body, "body");
    }

    #[test]
    fn test_no_separator() {
        assert!(split_config("just a body\n").is_none());
        // Three dashes are only a separator in front-matter position
        assert!(split_config("title: A\n---\nbody").is_none());
        // An unclosed front matter is no header at all
        assert!(split_config("---\ntitle: A\nbody").is_none());
    }

    #[test]
    fn test_yaml_block() {
        let caps = YAML_BLOCK.captures("---\ntitle: A\n---\nbody\n---\nrule\n").unwrap();
        assert_eq!(&caps[1], "title: A\n");
        assert_eq!(&caps[2], "body\n---\nrule\n");
        assert!(YAML_BLOCK.captures("title: A\n---\nbody").is_none());
    }

    #[test]
    fn test_apply_yaml() {
        let mut header = PageHeader::default();
        apply_yaml(
            &mut header,
            "title: Hello\ntags: [rust, web]\ndate: 2021-03-04\nhide: false\nAuthor: me\nweight: 3\n",
        )
        .unwrap();

        assert_eq!(header.title, "Hello");
        assert_eq!(header.tags, vec!["rust", "web"]);
        assert_eq!(header.date.unwrap().month(), 3);
        assert!(!header.hide);
        assert_eq!(header.other["author"], "me");
        assert_eq!(header.other["weight"], "3");
    }

    #[test]
    fn test_apply_yaml_comma_tags() {
        let mut header = PageHeader::default();
        apply_yaml(&mut header, "tags: a, b\n").unwrap();
        assert_eq!(header.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_apply_yaml_merges() {
        let mut header = PageHeader {
            title: "kept".into(),
            ..PageHeader::default()
        };
        apply_yaml(&mut header, "").unwrap();
        apply_yaml(&mut header, "tags: [x]\n").unwrap();
        assert_eq!(header.title, "kept");
        assert_eq!(header.tags, vec!["x"]);
    }

    #[test]
    fn test_apply_yaml_invalid() {
        let mut header = PageHeader::default();
        assert!(apply_yaml(&mut header, "title: [unclosed\n").is_err());
    }
}
