//! Markdown to HTML.
//!
//! CommonMark plus tables, footnotes, strikethrough, task lists and
//! `{#id .class}` heading attributes. Headings without an explicit id get
//! one from their text, de-duplicated with a `-N` suffix.

use crate::utils::slug::slugify;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashMap;

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Render Markdown text to an HTML fragment.
pub fn to_html(text: &str) -> String {
    let mut events: Vec<Event<'_>> = Parser::new_ext(text, parser_options()).collect();
    assign_heading_ids(&mut events);

    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut used: FxHashMap<String, usize> = FxHashMap::default();

    for i in 0..events.len() {
        let Event::Start(Tag::Heading { id, .. }) = &events[i] else {
            continue;
        };
        if let Some(id) = id {
            used.entry(id.to_string()).or_default();
            continue;
        }

        let text = heading_text(&events[i + 1..]);
        let slug = unique(&mut used, slugify(&text));
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
    }
}

/// Plain text of a heading, up to its end tag.
fn heading_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    text
}

fn unique(used: &mut FxHashMap<String, usize>, slug: String) -> String {
    let slug = if slug.is_empty() { "section".to_owned() } else { slug };
    let seen = used.entry(slug.clone()).or_default();
    *seen += 1;
    match *seen {
        1 => slug,
        n => format!("{slug}-{}", n - 1),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_and_emphasis() {
        assert_eq!(to_html("Hello *world*"), "<p>Hello <em>world</em></p>\n");
    }

    #[test]
    fn test_heading_ids() {
        let html = to_html("# Getting Started\n\n## Getting Started\n");
        assert!(html.contains(r#"<h1 id="getting-started">"#), "{html}");
        assert!(html.contains(r#"<h2 id="getting-started-1">"#), "{html}");
    }

    #[test]
    fn test_explicit_heading_id_kept() {
        let html = to_html("# Intro {#custom}\n");
        assert!(html.contains(r#"id="custom""#), "{html}");
    }

    #[test]
    fn test_heading_with_code() {
        let html = to_html("## The `render` call\n");
        assert!(html.contains(r#"id="the-render-call""#), "{html}");
    }

    #[test]
    fn test_tables_and_strikethrough() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = to_html("<div class=\"x\">kept</div>\n");
        assert!(html.contains("<div class=\"x\">kept</div>"));
    }
}
