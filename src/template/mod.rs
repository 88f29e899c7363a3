//! Template set for one build.
//!
//! Every file listed in `TEMPLATES` is registered under its file stem
//! (`post.tmpl` → `post`). Templates can `include`/`extend` each other by
//! that name. Output is never auto-escaped: content is HTML already.
//!
//! # Context
//!
//! | name        | value                                                |
//! |-------------|------------------------------------------------------|
//! | `page`      | the page being rendered (see [`PageView`])           |
//! | `content`   | `page.content`                                       |
//! | `site`      | `pages` in site order, `vars`, `source`, `output`    |
//! | `paginator` | list pages only: `number`, `total`, `pages`, `prev`, `next` |

mod filters;
mod view;

pub use view::PageView;

use crate::page::relative_root;
use anyhow::{Context, Result, anyhow, bail};
use minijinja::{AutoEscape, Environment, State, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

pub struct Templates {
    env: Environment<'static>,
    /// Newest mtime among the template files
    changed_at: SystemTime,
}

impl Templates {
    /// An empty set with all filters and functions registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        filters::register(&mut env);
        register_functions(&mut env);

        Self {
            env,
            changed_at: SystemTime::UNIX_EPOCH,
        }
    }

    /// Load template files, each under its file stem.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut templates = Self::new();
        let mut seen: FxHashMap<String, &Path> = FxHashMap::default();

        for path in paths {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow!("Invalid template file name: {}", path.display()))?
                .to_owned();
            if let Some(first) = seen.insert(name.clone(), path) {
                bail!(
                    "template name '{name}' is used by both {} and {}",
                    first.display(),
                    path.display()
                );
            }

            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            let mtime = fs::metadata(path)
                .and_then(|m| m.modified())
                .with_context(|| format!("Failed to stat template {}", path.display()))?;
            templates.changed_at = templates.changed_at.max(mtime);

            templates.add(name, source).with_context(|| format!("in {}", path.display()))?;
        }
        Ok(templates)
    }

    /// Register a template from a string.
    pub fn add(&mut self, name: String, source: String) -> Result<()> {
        self.env
            .add_template_owned(name, source)
            .map_err(|e| anyhow!("{e:#}"))
    }

    pub fn changed_at(&self) -> SystemTime {
        self.changed_at
    }

    /// Render the named template.
    pub fn render(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| anyhow!("template '{name}' not found"))?;
        template.render(ctx).map_err(|e| anyhow!("{e:#}"))
    }

    /// Render `source` as a one-off template; `name` shows up in errors.
    pub fn render_str(&self, name: &str, source: &str, ctx: Value) -> Result<String> {
        self.env
            .render_named_str(name, source, ctx)
            .map_err(|e| anyhow!("{e:#}"))
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Functions
// ============================================================================

fn register_functions(env: &mut Environment<'static>) {
    env.add_function("rel", rel);
    env.add_function("now", now);

    // Memo for `changed`; lives exactly as long as this build's templates
    let memo: Arc<Mutex<FxHashMap<String, String>>> = Arc::default();
    env.add_function("changed", move |name: String, value: Value| {
        has_changed(&memo, name, &value)
    });
}

/// `rel("/css/site.css")` from `blog/a/` gives `../../css/site.css`.
fn rel(state: &State, path: &str) -> String {
    let url = state
        .lookup("page")
        .and_then(|page| page.get_attr("url").ok())
        .and_then(|url| url.as_str().map(str::to_owned))
        .unwrap_or_default();
    let url = url.strip_prefix('/').unwrap_or(&url);
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}{path}", relative_root(url))
}

fn now() -> String {
    chrono::Local::now().to_rfc3339()
}

/// True the first time `name` is seen with `value`, false on repeats.
fn has_changed(memo: &Mutex<FxHashMap<String, String>>, name: String, value: &Value) -> bool {
    let value = value.to_string();
    let mut memo = memo.lock();
    if memo.get(&name) == Some(&value) {
        return false;
    }
    memo.insert(name, value);
    true
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use tempfile::TempDir;

    fn with(name: &str, source: &str) -> Templates {
        let mut t = Templates::new();
        t.add(name.into(), source.into()).unwrap();
        t
    }

    #[test]
    fn test_render_named() {
        let t = with("post", "<h1>{{ page.title }}</h1>{{ content }}\n");
        let out = t
            .render("post", context! { page => context! { title => "Hi" }, content => "<p>x</p>" })
            .unwrap();
        // No auto-escaping and the trailing newline is kept
        assert_eq!(out, "<h1>Hi</h1><p>x</p>\n");
    }

    #[test]
    fn test_render_missing_template() {
        let err = Templates::new().render("nope", context! {}).unwrap_err();
        assert_eq!(err.to_string(), "template 'nope' not found");
    }

    #[test]
    fn test_render_str_can_include() {
        let t = with("footer", "(c) {{ site.vars.AUTHOR }}");
        let out = t
            .render_str(
                "index.html",
                "{% include 'footer' %}",
                context! { site => context! { vars => context! { AUTHOR => "me" } } },
            )
            .unwrap();
        assert_eq!(out, "(c) me");
    }

    #[test]
    fn test_render_error_is_reported() {
        let t = Templates::new();
        let err = t.render_str("bad.html", "{{ 1 + }}", context! {}).unwrap_err();
        assert!(err.to_string().contains("syntax error"), "{err}");
    }

    #[test]
    fn test_rel_function() {
        let t = with("t", "{{ rel('/css/site.css') }}|{{ rel('feed.atom') }}");
        let nested = t.render("t", context! { page => context! { url => "/blog/a/" } }).unwrap();
        assert_eq!(nested, "../../css/site.css|../../feed.atom");
        let top = t.render("t", context! { page => context! { url => "/about.html" } }).unwrap();
        assert_eq!(top, "./css/site.css|./feed.atom");
    }

    #[test]
    fn test_changed_function() {
        let t = with(
            "t",
            "{% for y in [2020, 2020, 2021, 2021, 2020] %}{% if changed('year', y) %}{{ y }};{% endif %}{% endfor %}",
        );
        assert_eq!(t.render("t", context! {}).unwrap(), "2020;2021;2020;");
    }

    #[test]
    fn test_load_by_stem() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("page.tmpl");
        fs::write(&page, "[{{ content }}]").unwrap();

        let t = Templates::load(&[page]).unwrap();
        assert!(t.env.get_template("page").is_ok());
        assert!(t.changed_at() > SystemTime::UNIX_EPOCH);
        assert_eq!(t.render("page", context! { content => "x" }).unwrap(), "[x]");
    }

    #[test]
    fn test_load_duplicate_stem() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        let first = dir.path().join("a/post.tmpl");
        let second = dir.path().join("b/post.html");
        fs::write(&first, "").unwrap();
        fs::write(&second, "").unwrap();

        let err = Templates::load(&[first, second]).err().unwrap();
        assert!(err.to_string().contains("template name 'post'"), "{err}");
    }
}
