//! Dependency resolution and change detection.
//!
//! A page is stale on its own when its output is missing or older than its
//! source or the config and templates. It is changed when it, or anything
//! reachable through its dependencies, is stale.

use super::Site;
use crate::{
    page::{ChangeState, Page, PageId},
    utils::fs::mtime,
};
use rustc_hash::FxHashSet;

impl Site {
    /// Point every page with a rule at the pages its dependency globs match.
    pub fn find_deps(&mut self) {
        for idx in 0..self.pages.len() {
            let Some(rule) = self.pages[idx].rule.clone() else {
                continue;
            };
            if rule.deps.is_empty() {
                continue;
            }

            let deps: Vec<PageId> = self
                .pages
                .iter()
                .enumerate()
                .filter(|&(other, page)| {
                    other != idx && !page.is_ignored() && rule.depends_on(&page.source)
                })
                .map(|(other, _)| PageId(other))
                .collect();
            self.pages[idx].deps = deps;
        }
    }

    /// Does this page need to be written in this build? Memoized.
    pub fn changed(&mut self, id: PageId) -> bool {
        if self.options.force {
            let page = &mut self.pages[id.0];
            if page.change != ChangeState::Ignored {
                page.change = ChangeState::Changed;
            }
            return true;
        }

        match self.pages[id.0].change {
            ChangeState::Changed => return true,
            ChangeState::Unchanged | ChangeState::Ignored => return false,
            ChangeState::Unknown => {}
        }

        let changed = self.reaches_stale(id);
        self.pages[id.0].change = if changed {
            ChangeState::Changed
        } else {
            ChangeState::Unchanged
        };
        changed
    }

    /// Walk the dependency graph from `start` looking for a stale page.
    /// Each page is visited once, so cycles end.
    fn reaches_stale(&self, start: PageId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let page = &self.pages[id.0];
            match page.change {
                ChangeState::Changed => return true,
                ChangeState::Unchanged | ChangeState::Ignored if id != start => continue,
                _ => {}
            }
            if self.is_stale(page) {
                return true;
            }
            stack.extend(page.deps.iter().copied());
        }
        false
    }

    fn is_stale(&self, page: &Page) -> bool {
        match mtime(&page.output_path(&self.config.output)) {
            None => true,
            Some(output) => output < page.mod_time || output < self.changed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BuildOptions, CONFIG_FILE, SiteConfig},
        template::Templates,
    };
    use std::{
        fs,
        time::{Duration, SystemTime},
    };
    use tempfile::TempDir;

    /// `a.md` depends on every `*.txt`, which depend on each other.
    fn site(dir: &TempDir) -> Site {
        write_sources(dir);
        load(dir, Templates::new())
    }

    fn write_sources(dir: &TempDir) {
        fs::write(
            dir.path().join(CONFIG_FILE),
            "OUTPUT = out\n*.md: *.txt\n    config\n*.txt: *.txt\n    config\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        for name in ["a.md", "x.txt", "y.txt"] {
            fs::write(dir.path().join("src").join(name), "").unwrap();
        }
    }

    fn load(dir: &TempDir, templates: Templates) -> Site {
        let config = SiteConfig::from_path(&dir.path().join(CONFIG_FILE)).unwrap();
        let mut site = Site::new(config, templates, BuildOptions::default()).unwrap();
        site.collect().unwrap();
        site.find_deps();
        site
    }

    /// Write every output with an mtime far in the future.
    fn fresh_outputs(dir: &TempDir, site: &Site) {
        let future = SystemTime::now() + Duration::from_secs(3600);
        for page in &site.pages {
            let path = page.output_path(&dir.path().join("out"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let file = fs::File::create(&path).unwrap();
            file.set_modified(future).unwrap();
        }
    }

    fn touch(path: &std::path::Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    fn later() -> SystemTime {
        SystemTime::now() + Duration::from_secs(7200)
    }

    fn id(site: &Site, source: &str) -> PageId {
        site.find_source(source).unwrap()
    }

    #[test]
    fn test_find_deps() {
        let dir = TempDir::new().unwrap();
        let site = site(&dir);
        let a = site.page(id(&site, "a.md"));
        assert_eq!(a.deps, vec![id(&site, "x.txt"), id(&site, "y.txt")]);
        // Never depends on itself
        assert_eq!(site.page(id(&site, "x.txt")).deps, vec![id(&site, "y.txt")]);
    }

    #[test]
    fn test_missing_output_is_changed() {
        let dir = TempDir::new().unwrap();
        let mut site = site(&dir);
        let a = id(&site, "a.md");
        assert!(site.changed(a));
        assert_eq!(site.page(a).change_state(), ChangeState::Changed);
    }

    #[test]
    fn test_fresh_outputs_unchanged_despite_cycle() {
        let dir = TempDir::new().unwrap();
        let mut probe = site(&dir);
        fresh_outputs(&dir, &probe);
        // x.txt and y.txt depend on each other
        let x = id(&probe, "x.txt");
        assert!(!probe.changed(x));
        assert!(!probe.changed(id(&probe, "a.md")));
    }

    #[test]
    fn test_stale_dependency_propagates() {
        let dir = TempDir::new().unwrap();
        let probe = site(&dir);
        fresh_outputs(&dir, &probe);
        fs::remove_file(dir.path().join("out/y.txt")).unwrap();

        let mut site = site(&dir);
        assert!(site.changed(id(&site, "a.md")));
        // Through the x <-> y cycle
        assert!(site.changed(id(&site, "x.txt")));
    }

    #[test]
    fn test_ignored_never_changed() {
        let dir = TempDir::new().unwrap();
        let mut site = site(&dir);
        let a = id(&site, "a.md");
        site.page_mut(a).ignore();
        assert!(!site.changed(a));
    }

    #[test]
    fn test_force() {
        let dir = TempDir::new().unwrap();
        let mut site = site(&dir);
        fresh_outputs(&dir, &site);
        site.options.force = true;
        assert!(site.changed(id(&site, "a.md")));
    }

    // ------------------------------------------------------------------------
    // Staleness
    // ------------------------------------------------------------------------

    #[test]
    fn test_output_older_than_source() {
        let dir = TempDir::new().unwrap();
        let probe = site(&dir);
        fresh_outputs(&dir, &probe);
        touch(&dir.path().join("src/x.txt"), later());

        let mut site = load(&dir, Templates::new());
        let x = id(&site, "x.txt");
        let y = id(&site, "y.txt");
        assert!(site.is_stale(site.page(x)));
        assert!(!site.is_stale(site.page(y)));
        assert!(site.changed(x));
        // a.md depends on x.txt
        assert!(site.changed(id(&site, "a.md")));
    }

    #[test]
    fn test_config_touched_changes_everything() {
        let dir = TempDir::new().unwrap();
        let probe = site(&dir);
        fresh_outputs(&dir, &probe);
        touch(&dir.path().join(CONFIG_FILE), later());

        let mut site = load(&dir, Templates::new());
        for source in ["a.md", "x.txt", "y.txt"] {
            let page = id(&site, source);
            assert!(site.is_stale(site.page(page)), "{source}");
            assert!(site.changed(page), "{source}");
        }
    }

    #[test]
    fn test_template_touched_changes_everything() {
        let dir = TempDir::new().unwrap();
        let probe = site(&dir);
        let template = dir.path().join("page.tmpl");
        fs::write(&template, "{{ content }}").unwrap();
        fresh_outputs(&dir, &probe);

        let mut site = load(&dir, Templates::load(&[template.clone()]).unwrap());
        assert!(!site.changed(id(&site, "a.md")));

        touch(&template, later());
        let mut site = load(&dir, Templates::load(&[template]).unwrap());
        for source in ["a.md", "x.txt", "y.txt"] {
            assert!(site.changed(id(&site, source)), "{source}");
        }
    }
}
