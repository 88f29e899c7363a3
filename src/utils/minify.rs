//! Minification for HTML, XML and JSON output.
//!
//! The method is picked from the output path's extension; anything that
//! is not recognised passes through untouched.

use std::borrow::Cow;

// ============================================================================
// Types
// ============================================================================

/// Content type for minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyType {
    Html,
    /// XML and XML-based formats (svg, atom, rss)
    Xml,
    Json,
}

impl MinifyType {
    /// Pick a minifier from the extension of an output path.
    pub fn for_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(Self::Html),
            "xml" | "svg" | "atom" | "rss" => Some(Self::Xml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Unified Minify Function
// ============================================================================

/// Minify `content` as the type implied by `path`.
///
/// Returns `Cow::Borrowed` when the type is unknown or the content could
/// not be minified (invalid JSON is left as it is).
pub fn minify<'a>(path: &str, content: &'a str) -> Cow<'a, str> {
    match MinifyType::for_path(path) {
        Some(MinifyType::Html) => Cow::Owned(minify_html_inner(content)),
        Some(MinifyType::Xml) => Cow::Owned(minify_xml_inner(content)),
        Some(MinifyType::Json) => {
            minify_json_inner(content).map_or(Cow::Borrowed(content), Cow::Owned)
        }
        None => Cow::Borrowed(content),
    }
}

// ============================================================================
// Internal Implementation
// ============================================================================

/// Minify HTML content using `minify_html` crate.
fn minify_html_inner(html: &str) -> String {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    String::from_utf8_lossy(&minify_html::minify(html.as_bytes(), &cfg)).into_owned()
}

/// Minify XML by removing unnecessary whitespace.
fn minify_xml_inner(xml: &str) -> String {
    xml.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

fn minify_json_inner(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    serde_json::to_string(&value).ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_path() {
        assert_eq!(MinifyType::for_path("blog/a/index.html"), Some(MinifyType::Html));
        assert_eq!(MinifyType::for_path("page.HTM"), Some(MinifyType::Html));
        assert_eq!(MinifyType::for_path("blog.atom"), Some(MinifyType::Xml));
        assert_eq!(MinifyType::for_path("img/logo.svg"), Some(MinifyType::Xml));
        assert_eq!(MinifyType::for_path("data.json"), Some(MinifyType::Json));
        assert_eq!(MinifyType::for_path("style.css"), None);
        assert_eq!(MinifyType::for_path("some.dir/README"), None);
    }

    // HTML minification tests

    #[test]
    fn test_minify_html_basic() {
        let html = "<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let result = minify("index.html", html);

        assert!(!result.contains("\n  "));
        assert!(result.contains("<p>Hello</p>"));
        assert!(result.len() < html.len());
    }

    #[test]
    fn test_minify_html_preserves_content() {
        let result = minify("a.html", "<p>Hello World</p>");
        assert!(result.contains("Hello World"));
    }

    // XML minification tests

    #[test]
    fn test_minify_xml_basic() {
        let xml = r#"<?xml version="1.0"?>
<root>
  <item>Hello</item>
</root>"#;
        assert_eq!(
            minify("feed.xml", xml),
            r#"<?xml version="1.0"?><root><item>Hello</item></root>"#
        );
    }

    #[test]
    fn test_minify_xml_keeps_inner_spaces() {
        assert_eq!(minify("a.rss", "  <tag>  content  </tag>  "), "<tag>  content  </tag>");
    }

    #[test]
    fn test_minify_xml_removes_empty_lines() {
        assert_eq!(minify("a.atom", "<root>\n\n  <item/>\n\n</root>"), "<root><item/></root>");
    }

    // JSON and passthrough

    #[test]
    fn test_minify_json() {
        let json = "{\n  \"a\": [1, 2],\n  \"b\": \"x y\"\n}\n";
        assert_eq!(minify("data.json", json), r#"{"a":[1,2],"b":"x y"}"#);
    }

    #[test]
    fn test_invalid_json_untouched() {
        let text = "{ not json";
        assert!(matches!(minify("data.json", text), Cow::Borrowed(t) if t == text));
    }

    #[test]
    fn test_unknown_extension_untouched() {
        let css = "body {\n  color: red;\n}\n";
        assert!(matches!(minify("style.css", css), Cow::Borrowed(t) if t == css));
    }
}
