//! Site initialization.
//!
//! Writes a small working site: a blog with tag pages, an index and an
//! Atom feed.

use crate::{config::CONFIG_FILE, log};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Example site, embedded at compile time
const SITE_FILES: &[(&str, &str)] = &[
    (CONFIG_FILE, include_str!("embed/init/site.conf")),
    ("templates/page.tmpl", include_str!("embed/init/templates/page.tmpl")),
    ("templates/post.tmpl", include_str!("embed/init/templates/post.tmpl")),
    ("templates/tag.tmpl", include_str!("embed/init/templates/tag.tmpl")),
    ("templates/atom.tmpl", include_str!("embed/init/templates/atom.tmpl")),
    ("src/index.html", include_str!("embed/init/src/index.html")),
    ("src/blog.atom", include_str!("embed/init/src/blog.atom")),
    ("src/blog/first-post.md", include_str!("embed/init/src/blog/first-post.md")),
    ("src/static/style.css", include_str!("embed/init/src/static/style.css")),
];

/// Build output stays out of version control
const GITIGNORE: &str = "/site/\n";

/// Write the example site into `root`, which must be empty or missing.
pub fn new_site(root: &Path) -> Result<()> {
    if !is_dir_empty(root)? {
        bail!(
            "`{}` is not empty. Use `rulesite init <DIR>` to create the site in a new directory.",
            root.display()
        );
    }

    for (path, content) in SITE_FILES {
        write_file(&root.join(path), content)?;
    }
    write_file(&root.join(".gitignore"), GITIGNORE)?;

    log!("init"; "created site in {}", root.display());
    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .next()
        .is_none())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::BuildOptions, site::Site};
    use tempfile::TempDir;

    #[test]
    fn test_refuses_non_empty_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let err = new_site(dir.path()).unwrap_err();
        assert!(err.to_string().contains("is not empty"));
    }

    #[test]
    fn test_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blog");
        new_site(&root).unwrap();
        assert!(root.join(CONFIG_FILE).is_file());
        assert!(root.join("src/blog/first-post.md").is_file());
        assert_eq!(fs::read_to_string(root.join(".gitignore")).unwrap(), GITIGNORE);
    }

    #[test]
    fn test_example_site_builds() {
        let dir = TempDir::new().unwrap();
        new_site(dir.path()).unwrap();

        let mut site = Site::load(&dir.path().join(CONFIG_FILE), BuildOptions::default()).unwrap();
        site.build().unwrap();

        let out = dir.path().join("site");
        let post = fs::read_to_string(out.join("blog/first-post/index.html")).unwrap();
        assert!(post.contains("<h1>First post</h1>"), "{post}");
        assert!(post.contains(r#"href="../../static/style.css""#), "{post}");

        let tag = fs::read_to_string(out.join("tags/hello/index.html")).unwrap();
        assert!(tag.contains("First post"), "{tag}");
        assert!(out.join("tags/notes/index.html").is_file());

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains(r#"href="./blog/first-post/""#), "{index}");

        let feed = fs::read_to_string(out.join("blog.atom")).unwrap();
        assert!(feed.contains("<link href=\"https://example.com/blog/first-post/\"/>"), "{feed}");
        assert!(feed.contains("<p>Welcome!"), "{feed}");

        assert_eq!(
            fs::read(out.join("static/style.css")).unwrap(),
            fs::read(dir.path().join("src/static/style.css")).unwrap()
        );
    }
}
