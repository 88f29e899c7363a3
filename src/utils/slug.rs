//! URL slugification.
//!
//! Non-ASCII text is transliterated first (`deunicode`), so `Grüße` becomes
//! `grusse` rather than disappearing.

use deunicode::deunicode;

/// Lower-case, `-`-separated, ASCII-only form of `text`.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("  --Rust & Go!--  "), "rust-go");
    }

    #[test]
    fn test_slugify_transliterates() {
        assert_eq!(slugify("Grüße aus Köln"), "grusse-aus-koln");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_keeps_digits() {
        assert_eq!(slugify("Release 1.2.3"), "release-1-2-3");
    }
}
