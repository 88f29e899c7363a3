//! Page: one build unit.
//!
//! ```text
//!            peek (PRE commands)          process (other commands)
//! Unprocessed ──────────────────▶ PeekDone ────────────────────────▶ Processed
//! ```
//!
//! A page reads its source lazily. Once a processor sets the content, the
//! disk copy is never consulted again.

pub mod header;

pub use header::{HeaderValue, PageHeader};

use crate::config::Rule;
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    cell::OnceCell,
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

/// Index into the site's page arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub usize);

/// Memoized staleness of a page within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ChangeState {
    #[default]
    Unknown,
    Changed,
    Unchanged,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Unprocessed,
    PeekDone,
    Processed,
}

#[derive(Debug)]
pub struct Page {
    /// Path relative to the source root, `/`-separated. Never changes.
    pub source: String,
    /// Output path relative to the output root. Settled by the end of peek.
    pub path: String,
    pub header: PageHeader,
    pub pattern: Option<String>,
    pub rule: Option<Arc<Rule>>,
    pub deps: Vec<PageId>,
    pub mod_time: SystemTime,
    pub(crate) state: ProcessingState,
    pub(crate) change: ChangeState,
    /// How many injections separate this page from a real source file
    pub(crate) generation: u32,
    full_path: PathBuf,
    raw: OnceCell<Arc<str>>,
    content: Option<Arc<str>>,
}

impl Page {
    /// A page backed by a file under the source root.
    pub fn new(
        source: String,
        full_path: PathBuf,
        mod_time: SystemTime,
        matched: Option<(&str, Arc<Rule>)>,
    ) -> Self {
        let (pattern, rule) = match matched {
            Some((pattern, rule)) => (Some(pattern.to_owned()), Some(rule)),
            None => (None, None),
        };
        Self {
            path: source.clone(),
            source,
            header: PageHeader::default(),
            pattern,
            rule,
            deps: Vec::new(),
            mod_time,
            state: ProcessingState::Unprocessed,
            change: ChangeState::Unknown,
            generation: 0,
            full_path,
            raw: OnceCell::new(),
            content: None,
        }
    }

    /// A page with no file behind it. It starts out already read and empty.
    pub fn synthetic(
        source: String,
        title: String,
        mod_time: SystemTime,
        pattern: &str,
        rule: Arc<Rule>,
    ) -> Self {
        let mut page = Self::new(source, PathBuf::new(), mod_time, Some((pattern, rule)));
        page.header.title = title;
        page.raw = OnceCell::from(Arc::from(""));
        page
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    /// Source text, read from disk on first access.
    pub fn raw(&self) -> Result<&str> {
        if self.raw.get().is_none() {
            let text = fs::read_to_string(&self.full_path)
                .with_context(|| format!("Failed to read {}", self.full_path.display()))?;
            // Cannot be filled in between: `Page` is not `Sync`
            let _ = self.raw.set(Arc::from(text));
        }
        Ok(self.raw.get().map(AsRef::as_ref).unwrap_or_default())
    }

    /// Current content: whatever a processor set, else the raw text.
    pub fn content(&self) -> Result<&str> {
        match &self.content {
            Some(content) => Ok(content),
            None => self.raw(),
        }
    }

    /// Shared handle to the current content, for template contexts.
    pub fn content_handle(&self) -> Result<Arc<str>> {
        match &self.content {
            Some(content) => Ok(Arc::clone(content)),
            None => {
                self.raw()?;
                Ok(self.raw.get().map(Arc::clone).unwrap_or_else(|| Arc::from("")))
            }
        }
    }

    pub fn raw_handle(&self) -> Result<Arc<str>> {
        self.raw()?;
        Ok(self.raw.get().map(Arc::clone).unwrap_or_else(|| Arc::from("")))
    }

    pub fn set_content(&mut self, content: impl Into<Arc<str>>) {
        self.content = Some(content.into());
    }

    /// After peek, the content left by the PRE processors becomes the raw text.
    pub(crate) fn settle_raw(&mut self) {
        if let Some(content) = &self.content {
            self.raw = OnceCell::from(Arc::clone(content));
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// No rule matched: the file is copied as-is.
    pub fn is_static(&self) -> bool {
        self.rule.is_none()
    }

    pub fn is_ignored(&self) -> bool {
        self.change == ChangeState::Ignored
    }

    pub fn ignore(&mut self) {
        self.change = ChangeState::Ignored;
    }

    pub fn change_state(&self) -> ChangeState {
        self.change
    }

    pub fn is_processed(&self) -> bool {
        self.state == ProcessingState::Processed
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.path)
    }

    // ------------------------------------------------------------------------
    // URLs
    // ------------------------------------------------------------------------

    /// Output path as a URL relative to the site root, without `index.html`.
    ///
    /// `blog/a/index.html` → `blog/a/`, `index.html` → ``.
    pub fn url(&self) -> &str {
        if self.path == "index.html" {
            return "";
        }
        self.path
            .strip_suffix("index.html")
            .filter(|rest| rest.ends_with('/'))
            .unwrap_or(self.path.as_str())
    }

    /// Last component of the URL.
    pub fn name(&self) -> &str {
        let url = self.url().trim_end_matches('/');
        url.rsplit('/').next().unwrap_or(url)
    }

    /// Prefix leading from this page back to the site root.
    pub fn root_prefix(&self) -> String {
        relative_root(self.url())
    }
}

/// `../` for each directory level in `url`, or `./` at the top level.
pub fn relative_root(url: &str) -> String {
    match url.matches('/').count() {
        0 => "./".to_owned(),
        depth => "../".repeat(depth),
    }
}

/// Site order: newest first, ties broken by path, descending.
pub fn site_order(a: &Page, b: &Page) -> Ordering {
    b.header
        .date
        .cmp(&a.header.date)
        .then_with(|| b.path.cmp(&a.path))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::header::parse_date;
    use tempfile::TempDir;

    fn page_at(path: &str) -> Page {
        let mut page = Page::new(path.into(), PathBuf::new(), SystemTime::UNIX_EPOCH, None);
        page.raw = OnceCell::from(Arc::from(""));
        page
    }

    // ------------------------------------------------------------------------
    // URLs
    // ------------------------------------------------------------------------

    #[test]
    fn test_url_strips_index() {
        assert_eq!(page_at("index.html").url(), "");
        assert_eq!(page_at("blog/a/index.html").url(), "blog/a/");
        assert_eq!(page_at("blog/feed.atom").url(), "blog/feed.atom");
        assert_eq!(page_at("notindex.html").url(), "notindex.html");
    }

    #[test]
    fn test_name() {
        assert_eq!(page_at("blog/a/index.html").name(), "a");
        assert_eq!(page_at("blog/2014-05-06-hi.md").name(), "2014-05-06-hi.md");
    }

    #[test]
    fn test_root_prefix() {
        assert_eq!(page_at("about.html").root_prefix(), "./");
        assert_eq!(page_at("blog/a/index.html").root_prefix(), "../../");
        assert_eq!(page_at("blog/a.html").root_prefix(), "../");
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    #[test]
    fn test_raw_is_lazy() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.md");
        fs::write(&file, "hello").unwrap();

        let page = Page::new("a.md".into(), file.clone(), SystemTime::now(), None);
        fs::write(&file, "changed before first read").unwrap();
        assert_eq!(page.raw().unwrap(), "changed before first read");

        fs::write(&file, "changed after").unwrap();
        assert_eq!(page.raw().unwrap(), "changed before first read");
    }

    #[test]
    fn test_set_content_wins_over_disk() {
        let mut page = Page::new(
            "gone.md".into(),
            PathBuf::from("/does/not/exist"),
            SystemTime::now(),
            None,
        );
        page.set_content(String::new());
        assert_eq!(page.content().unwrap(), "");
    }

    #[test]
    fn test_missing_file_is_error() {
        let page = Page::new("x".into(), PathBuf::from("/does/not/exist"), SystemTime::now(), None);
        assert!(page.content().is_err());
    }

    #[test]
    fn test_synthetic_page_never_reads() {
        let page = Page::synthetic(
            "tags/rust.tag".into(),
            "rust".into(),
            SystemTime::UNIX_EPOCH,
            "*.tag",
            Arc::new(Rule::default()),
        );
        assert_eq!(page.content().unwrap(), "");
        assert_eq!(page.header.title, "rust");
        assert!(!page.is_static());
    }

    #[test]
    fn test_settle_raw() {
        let mut page = page_at("a.md");
        page.set_content("body only");
        page.settle_raw();
        assert_eq!(page.raw().unwrap(), "body only");
    }

    // ------------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------------

    #[test]
    fn test_site_order_newest_first() {
        let mut a = page_at("a");
        a.header.date = parse_date("2020-01-02");
        let mut b = page_at("b");
        b.header.date = parse_date("2020-01-03");
        let undated = page_at("z");

        let mut pages = vec![&a, &undated, &b];
        pages.sort_by(|x, y| site_order(x, y));
        let order: Vec<_> = pages.iter().map(|p| p.source.as_str()).collect();
        assert_eq!(order, ["b", "a", "z"]);
    }

    #[test]
    fn test_site_order_ties_by_path_descending() {
        let a = page_at("a");
        let b = page_at("b");
        assert_eq!(site_order(&a, &b), Ordering::Greater);
    }
}
