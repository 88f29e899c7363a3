//! Site orchestration.
//!
//! # Build Flow
//!
//! ```text
//! collect() ──► find_deps() ──► render()
//!    │              │              │
//!    ▼              ▼              ▼
//!  walk + peek   rule deps    changed? → process → write
//!  (+ injected)
//! ```
//!
//! Everything lives in one [`Site`] per build: the page arena, the lookup
//! by source path, pagination groups and the template set. A rebuild makes
//! a new `Site` from scratch.

mod context;
mod deps;
mod pagination;

use crate::{
    config::{BuildOptions, ConfigError, RuleTable, SiteConfig},
    debug, log,
    page::{Page, PageId, ProcessingState, site_order},
    processors::{Mode, Processor, ProcessorMap},
    template::Templates,
    utils::fs::{copy_file, ensure_parent, walk_sources},
};
use anyhow::{Context, Result, anyhow, bail};
use pagination::Paginations;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::{
    collections::VecDeque,
    fs,
    io::Write,
    path::{Component, Path},
    sync::Arc,
    time::{Duration, SystemTime},
};

/// Injected pages may themselves inject pages, but not forever.
pub const MAX_INJECTION_DEPTH: u32 = 8;

pub struct Site {
    config: SiteConfig,
    templates: Templates,
    processors: ProcessorMap,
    options: BuildOptions,
    /// Newest of the config and template mtimes
    changed_at: SystemTime,
    pages: Vec<Page>,
    by_source: FxHashMap<String, PageId>,
    /// Injected pages waiting for their peek
    pending: VecDeque<PageId>,
    /// Non-ignored pages in site order, settled by `collect`
    order: Vec<PageId>,
    paginations: Paginations,
    /// Generated tag page → pages carrying that tag
    tagged: FxHashMap<PageId, Vec<PageId>>,
}

impl Site {
    pub fn new(
        config: SiteConfig,
        templates: Templates,
        options: BuildOptions,
    ) -> Result<Self, ConfigError> {
        Self::with_processors(config, templates, options, ProcessorMap::default())
    }

    /// Every command of every rule must name a known processor.
    pub fn with_processors(
        config: SiteConfig,
        templates: Templates,
        options: BuildOptions,
        processors: ProcessorMap,
    ) -> Result<Self, ConfigError> {
        for (pattern, rule) in config.rules.iter() {
            if let Some(cmd) = rule.commands.iter().find(|c| !processors.contains(&c.name)) {
                return Err(ConfigError::UnknownProcessor {
                    pattern: pattern.to_owned(),
                    name: cmd.name.clone(),
                });
            }
        }

        let changed_at = config.changed_at.max(templates.changed_at());
        Ok(Self {
            config,
            templates,
            processors,
            options,
            changed_at,
            pages: Vec::new(),
            by_source: FxHashMap::default(),
            pending: VecDeque::new(),
            order: Vec::new(),
            paginations: Paginations::default(),
            tagged: FxHashMap::default(),
        })
    }

    /// Read the config file and its templates.
    pub fn load(config_path: &Path, options: BuildOptions) -> Result<Self> {
        let config = SiteConfig::from_path(config_path)?;
        let templates = Templates::load(&config.templates)?;
        Ok(Self::new(config, templates, options)?)
    }

    /// Collect, resolve dependencies and render. Returns the number of
    /// pages written.
    pub fn build(&mut self) -> Result<usize> {
        self.collect()?;
        self.find_deps();
        self.render()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn page(&self, id: PageId) -> &Page {
        &self.pages[id.0]
    }

    pub fn page_mut(&mut self, id: PageId) -> &mut Page {
        &mut self.pages[id.0]
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.config.rules
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.options.timeout(&self.config)
    }

    /// Non-ignored pages in site order.
    pub fn order(&self) -> &[PageId] {
        &self.order
    }

    pub fn find_source(&self, source: &str) -> Option<PageId> {
        self.by_source.get(source).copied()
    }

    /// Look a page up by source path, or by output path or URL.
    pub fn find(&self, query: &str) -> Option<PageId> {
        let query = query.strip_prefix('/').unwrap_or(query);
        self.find_source(query).or_else(|| {
            self.pages
                .iter()
                .position(|p| p.path == query || (!query.is_empty() && p.url() == query))
                .map(PageId)
        })
    }

    fn processor(&self, name: &str) -> Result<Arc<dyn Processor>> {
        self.processors
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown processor '{name}'"))
    }

    // ------------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------------

    fn register(&mut self, page: Page) -> PageId {
        let id = PageId(self.pages.len());
        self.by_source.insert(page.source.clone(), id);
        self.pages.push(page);
        id
    }

    /// Add a page that has no source file, on behalf of `parent`.
    ///
    /// Returns the existing page if one with the same source is known. The
    /// new page is peeked once the current peek finishes.
    pub fn inject(&mut self, parent: PageId, mut page: Page) -> Result<PageId> {
        if let Some(existing) = self.find_source(&page.source) {
            return Ok(existing);
        }

        let generation = self.pages[parent.0].generation + 1;
        if generation > MAX_INJECTION_DEPTH {
            bail!(
                "page injection did not converge: '{}' requested by '{}'",
                page.source,
                self.pages[parent.0].source
            );
        }
        page.generation = generation;

        debug!("inject"; "{} (from {})", page.source, self.pages[parent.0].source);
        let id = self.register(page);
        self.pending.push_back(id);
        Ok(id)
    }

    /// Make sure the page for `tag` exists, generating it from `pattern`
    /// (its first `*` replaced by the tag) unless a file already has that
    /// source.
    pub fn add_tag(&mut self, page: PageId, pattern: &str, tag: &str) -> Result<()> {
        if tag.contains(['/', '\\']) || tag == "." || tag == ".." {
            bail!("tag '{tag}' cannot be used in a path");
        }

        let source = pattern.replacen('*', tag, 1);
        if let Some(existing) = self.find_source(&source) {
            if let Some(carriers) = self.tagged.get_mut(&existing) {
                carriers.push(page);
            }
            return Ok(());
        }

        let (matched, rule) = self
            .rules()
            .matches(&source)
            .map(|(p, rule)| (p.to_owned(), rule))
            .ok_or_else(|| anyhow!("tag path '{source}' does not match any rule"))?;
        let tag_page = Page::synthetic(source, tag.to_owned(), SystemTime::UNIX_EPOCH, &matched, rule);
        let id = self.inject(page, tag_page)?;
        self.tagged.insert(id, vec![page]);
        Ok(())
    }

    /// Ignore generated pages nobody asked for in the end. A page can add
    /// itself to a pagination group or a tag and be ignored by a later
    /// PRE command of its rule.
    fn drop_orphans(&mut self) {
        for list in self.paginations.surplus_lists(&self.pages) {
            debug!("ignore"; "{} (no pages left)", self.pages[list.0].source);
            self.pages[list.0].ignore();
        }

        let orphans: Vec<PageId> = self
            .tagged
            .iter()
            .filter(|(_, carriers)| carriers.iter().all(|id| self.pages[id.0].is_ignored()))
            .map(|(&id, _)| id)
            .collect();
        for id in orphans {
            debug!("ignore"; "{} (no pages left)", self.pages[id.0].source);
            self.pages[id.0].ignore();
        }
    }

    /// Run the PRE commands of a page's rule, once.
    pub fn peek(&mut self, id: PageId) -> Result<()> {
        if self.pages[id.0].state != ProcessingState::Unprocessed {
            return Ok(());
        }
        self.pages[id.0].state = ProcessingState::PeekDone;

        let Some(rule) = self.pages[id.0].rule.clone() else {
            return Ok(());
        };
        for cmd in &rule.commands {
            let processor = self.processor(&cmd.name)?;
            if !processor.mode().contains(Mode::PRE) {
                continue;
            }
            if self.pages[id.0].is_ignored() {
                break;
            }
            processor
                .process(self, id, &cmd.args)
                .with_context(|| format!("{}: {cmd}", self.pages[id.0].source))?;
        }

        let page = &mut self.pages[id.0];
        page.settle_raw();
        debug!("peek"; "{} -> {}", page.source, page.path);
        Ok(())
    }

    fn drain_pending(&mut self) -> Result<()> {
        while let Some(id) = self.pending.pop_front() {
            self.peek(id)?;
        }
        Ok(())
    }

    /// Run the remaining commands of a page's rule, once.
    ///
    /// Dependencies are processed first so templates see their final
    /// content. The output path is fixed from here on.
    pub fn process(&mut self, id: PageId) -> Result<()> {
        self.peek(id)?;
        if self.pages[id.0].is_processed() {
            return Ok(());
        }
        self.pages[id.0].state = ProcessingState::Processed;

        for dep in self.pages[id.0].deps.clone() {
            self.process(dep)?;
        }

        let Some(rule) = self.pages[id.0].rule.clone() else {
            return Ok(());
        };
        for cmd in &rule.commands {
            let processor = self.processor(&cmd.name)?;
            if processor.mode().contains(Mode::PRE) {
                continue;
            }

            let path = self.pages[id.0].path.clone();
            processor
                .process(self, id, &cmd.args)
                .with_context(|| format!("{}: {cmd}", self.pages[id.0].source))?;

            let page = &self.pages[id.0];
            if page.path != path {
                bail!(
                    "{}: {cmd} changed the output path from '{path}' to '{}' after peek",
                    page.source,
                    page.path
                );
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Build phases
    // ------------------------------------------------------------------------

    /// Walk the source tree, make a page per file and peek every page.
    ///
    /// Files are all registered before the first peek, so a real file always
    /// wins over an injected page with the same source.
    pub fn collect(&mut self) -> Result<()> {
        let files = walk_sources(&self.config.source)?;

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let matched = self.config.rules.matches(&file.relative);
            let page = Page::new(file.relative, file.full_path, file.mod_time, matched);
            ids.push(self.register(page));
        }

        for id in ids {
            self.peek(id)?;
            self.drain_pending()?;
        }
        self.drop_orphans();

        let mut order: Vec<PageId> = (0..self.pages.len())
            .map(PageId)
            .filter(|id| !self.pages[id.0].is_ignored())
            .collect();
        order.sort_by(|a, b| site_order(&self.pages[a.0], &self.pages[b.0]));
        self.order = order;

        debug!(
            "collect";
            "{} pages ({} ignored)",
            self.pages.len(),
            self.pages.len() - self.order.len()
        );
        Ok(())
    }

    /// Process and write every changed page. Returns how many were written.
    pub fn render(&mut self) -> Result<usize> {
        let order = self.order.clone();
        let changed: Vec<PageId> = order.into_iter().filter(|&id| self.changed(id)).collect();

        for &id in &changed {
            self.process(id)?;
        }

        log!(
            "build";
            "Rendering {} changed pages of {} total",
            changed.len(),
            self.order.len()
        );
        for &id in &changed {
            self.write_page(id)?;
        }
        Ok(changed.len())
    }

    fn write_page(&self, id: PageId) -> Result<()> {
        let page = &self.pages[id.0];
        let inside = Path::new(&page.path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !inside {
            bail!(
                "{}: output path '{}' is outside the output directory",
                page.source,
                page.path
            );
        }
        let target = page.output_path(&self.config.output);

        if page.is_static() {
            copy_file(page.full_path(), &target)?;
            debug!("copy"; "{}", page.path);
            return Ok(());
        }

        ensure_parent(&target)?;
        fs::write(&target, page.content()?)
            .with_context(|| format!("Failed to write {}", self.config.display_path(&target)))?;
        debug!("write"; "{} -> {}", page.source, page.path);
        Ok(())
    }

    /// Process every page with a rule and print it instead of writing it.
    pub fn summary(&mut self, out: &mut impl Write) -> Result<()> {
        for id in self.order.clone() {
            if self.pages[id.0].is_static() {
                continue;
            }
            self.process(id)?;

            let page = &self.pages[id.0];
            writeln!(out, "{} -> {}", page.source, page.path)?;
            out.write_all(page.content()?.as_bytes())?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Everything known about one page, for `dump`.
    pub fn describe(&mut self, id: PageId) -> serde_json::Value {
        let changed = self.changed(id);
        let paginator = self.paginator(id).map(|window| {
            json!({
                "number": window.number,
                "total": window.total,
                "pages": window.pages.iter().map(|&p| &self.pages[p.0].source).collect::<Vec<_>>(),
            })
        });

        let page = &self.pages[id.0];
        json!({
            "source": page.source,
            "path": page.path,
            "url": format!("/{}", page.url()),
            "pattern": page.pattern,
            "commands": page.rule.as_ref().map(|rule| &rule.commands),
            "header": page.header,
            "deps": page.deps.iter().map(|&d| &self.pages[d.0].source).collect::<Vec<_>>(),
            "changed": changed,
            "state": page.change_state(),
            "paginator": paginator,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
