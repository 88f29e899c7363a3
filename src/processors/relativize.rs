use super::Processor;
use crate::{page::PageId, site::Site};
use anyhow::Result;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `href="/..."` or `src='/...'`, but not protocol-relative `//host` URLs.
static ROOT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(href|src)=["']/([^"']*)["']"#).unwrap());

/// Rewrites root-absolute links so the site works from any subdirectory.
pub struct Relativize;

impl Processor for Relativize {
    fn description(&self) -> &'static str {
        "make all root-bound URLs relative (allows deploying the site in a subdirectory)"
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let current = site.page(page);
        let text = relativize(current.content()?, &current.root_prefix());
        site.page_mut(page).set_content(text);
        Ok(())
    }
}

fn relativize(html: &str, root: &str) -> String {
    ROOT_URL
        .replace_all(html, |caps: &Captures<'_>| {
            if caps[2].starts_with('/') {
                return caps[0].to_owned();
            }
            format!(r#"{}="{root}{}""#, &caps[1], &caps[2])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relativize_nested() {
        let html = r#"<a href="/blog/">b</a><img src='/img/x.png'>"#;
        assert_eq!(
            relativize(html, "../../"),
            r#"<a href="../../blog/">b</a><img src="../../img/x.png">"#
        );
    }

    #[test]
    fn test_relativize_top_level() {
        assert_eq!(relativize(r#"<a href="/">home</a>"#, "./"), r#"<a href="./">home</a>"#);
    }

    #[test]
    fn test_relativize_skips_other_urls() {
        let html = r#"<script src="//cdn.example.com/x.js"></script><a href="https://x.org/">x</a><a href="rel.html">r</a>"#;
        assert_eq!(relativize(html, "../"), html);
    }
}
