//! Template filters.
//!
//! | filter                  | effect                                        |
//! |-------------------------|-----------------------------------------------|
//! | `markdown`              | render Markdown                               |
//! | `strip_html`            | drop tags                                     |
//! | `strip_newlines`        | drop `\r` and `\n`                            |
//! | `excerpt(n)`            | first `n` words, `[...]` if cut               |
//! | `word_count`            | whitespace separated words                    |
//! | `reading_time`          | minutes at 200 words per minute               |
//! | `truncate(n)`           | first `n` characters                          |
//! | `cut(begin, end)`       | text between two regexes                      |
//! | `replace_re(re, repl)`  | regex replace (`$1` style groups)             |
//! | `matches(re)`           | regex test                                    |
//! | `refind(re)`            | first group of the first match, else match    |
//! | `hash`                  | 16 hex chars of blake3                        |
//! | `slugify`               | URL slug                                      |
//! | `date(fmt)`             | strftime; default `%Y-%m-%d`                  |
//! | `absurl(prefix)`        | resolve against a base URL                    |
//! | `dirname`, `basename`   | path components                               |
//! | `children(prefix)`      | visible pages below a URL                     |
//! | `with_tag(tag)`         | visible pages carrying a tag                  |
//! | `glob_source(pattern)`  | pages whose source matches a glob             |
//! | `by_title`              | pages sorted by title                         |

use super::PageView;
use crate::{
    config::rules::MATCH_OPTIONS,
    page::header::parse_date,
    utils::{markdown, slug},
};
use chrono::format::{Item, StrftimeItems};
use minijinja::{Environment, Error, ErrorKind, Value};
use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

const WORDS_PER_MINUTE: usize = 200;

pub fn register(env: &mut Environment<'static>) {
    env.add_filter("markdown", markdown_filter);
    env.add_filter("strip_html", strip_html);
    env.add_filter("strip_newlines", strip_newlines);
    env.add_filter("excerpt", excerpt);
    env.add_filter("word_count", word_count);
    env.add_filter("reading_time", reading_time);
    env.add_filter("truncate", truncate);
    env.add_filter("cut", cut);
    env.add_filter("replace_re", replace_re);
    env.add_filter("matches", matches);
    env.add_filter("refind", refind);
    env.add_filter("hash", hash);
    env.add_filter("slugify", slugify);
    env.add_filter("date", date);
    env.add_filter("absurl", absurl);
    env.add_filter("dirname", dirname);
    env.add_filter("basename", basename);
    env.add_filter("children", children);
    env.add_filter("with_tag", with_tag);
    env.add_filter("glob_source", glob_source);
    env.add_filter("by_title", by_title);
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOperation, msg.into())
}

fn compile(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|e| invalid(format!("invalid regex `{pattern}`: {e}")))
}

// ============================================================================
// Text
// ============================================================================

fn markdown_filter(text: &str) -> Value {
    Value::from_safe_string(markdown::to_html(text))
}

fn strip_html(text: &str) -> String {
    HTML_TAG.replace_all(text, "").into_owned()
}

fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

fn excerpt(text: &str, words: usize) -> String {
    if words == 0 {
        return String::new();
    }
    let all: Vec<&str> = text.split_whitespace().collect();
    if words >= all.len() {
        return text.trim().to_owned();
    }
    format!("{} [...]", all[..words].join(" "))
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn reading_time(text: &str) -> usize {
    word_count(text).div_ceil(WORDS_PER_MINUTE)
}

fn truncate(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Text after the first `begin` match, up to the next `end` match.
fn cut(text: &str, begin: &str, end: &str) -> Result<String, Error> {
    let (begin, end) = (compile(begin)?, compile(end)?);
    let Some(start) = begin.find(text) else {
        return Ok(String::new());
    };
    let rest = &text[start.end()..];
    Ok(end
        .find(rest)
        .map(|stop| rest[..stop.start()].to_owned())
        .unwrap_or_default())
}

fn replace_re(text: &str, pattern: &str, replacement: &str) -> Result<String, Error> {
    Ok(compile(pattern)?.replace_all(text, replacement).into_owned())
}

fn matches(text: &str, pattern: &str) -> Result<bool, Error> {
    Ok(compile(pattern)?.is_match(text))
}

fn refind(text: &str, pattern: &str) -> Result<String, Error> {
    let re = compile(pattern)?;
    let Some(caps) = re.captures(text) else {
        return Ok(String::new());
    };
    let found = caps.get(1).or_else(|| caps.get(0));
    Ok(found.map(|m| m.as_str().to_owned()).unwrap_or_default())
}

fn hash(text: &str) -> String {
    let digest = blake3::hash(text.as_bytes());
    hex::encode(&digest.as_bytes()[..8])
}

fn slugify(text: &str) -> String {
    slug::slugify(text)
}

// ============================================================================
// Dates and URLs
// ============================================================================

fn date(value: &str, format: Option<&str>) -> Result<String, Error> {
    let format = format.unwrap_or("%Y-%m-%d");
    let parsed = parse_date(value).ok_or_else(|| invalid(format!("cannot parse date `{value}`")))?;

    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid(format!("invalid date format `{format}`")));
    }
    Ok(parsed.format_with_items(items.into_iter()).to_string())
}

/// `"/feed.atom" | absurl("https://example.com/blog/")` gives
/// `https://example.com/feed.atom`; relative paths resolve below the prefix.
fn absurl(path: &str, prefix: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    let origin = origin(prefix);
    if let Some(rooted) = path.strip_prefix('/') {
        return format!("{origin}/{rooted}");
    }
    match prefix[origin.len()..].rfind('/') {
        Some(i) => format!("{}{path}", &prefix[..=origin.len() + i]),
        None => format!("{origin}/{path}"),
    }
}

/// `scheme://host` part of a URL, or the whole string if it has none.
fn origin(url: &str) -> &str {
    let Some(scheme_end) = url.find("://") else {
        return url.trim_end_matches('/');
    };
    let host_start = scheme_end + 3;
    match url[host_start..].find('/') {
        Some(i) => &url[..host_start + i],
        None => url,
    }
}

fn dirname(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_owned(),
        Some(i) => trimmed[..i].to_owned(),
        None => ".".to_owned(),
    }
}

fn basename(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed).to_owned()
}

// ============================================================================
// Page lists
// ============================================================================

/// Keep the page views of `pages` for which `keep` holds.
fn filter_pages(pages: &Value, keep: impl Fn(&PageView) -> bool) -> Result<Value, Error> {
    let mut kept = Vec::new();
    for item in pages.try_iter()? {
        if item.downcast_object_ref::<PageView>().is_some_and(&keep) {
            kept.push(item);
        }
    }
    Ok(Value::from(kept))
}

fn children(pages: &Value, prefix: &str) -> Result<Value, Error> {
    let prefix = format!("/{}", prefix.trim_start_matches('/'));
    filter_pages(pages, |p| !p.hide && p.url.starts_with(&prefix) && p.url != prefix)
}

fn with_tag(pages: &Value, tag: &str) -> Result<Value, Error> {
    filter_pages(pages, |p| !p.hide && p.tags.iter().any(|t| t == tag))
}

fn glob_source(pages: &Value, pattern: &str) -> Result<Value, Error> {
    let glob = glob::Pattern::new(pattern)
        .map_err(|e| invalid(format!("invalid glob `{pattern}`: {e}")))?;
    filter_pages(pages, |p| glob.matches_with(&p.source, MATCH_OPTIONS))
}

fn by_title(pages: &Value) -> Result<Value, Error> {
    let mut items: Vec<Value> = pages.try_iter()?.collect();
    items.sort_by_cached_key(|item| {
        item.downcast_object_ref::<PageView>()
            .map(|p| p.title.clone())
            .unwrap_or_default()
    });
    Ok(Value::from(items))
}

// ============================================================================
// Tests
// ============================================================================
