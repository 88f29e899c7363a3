//! Named page transformations.
//!
//! A rule's commands are looked up here by name. Each processor carries a
//! [`Mode`] that decides in which phase it runs:
//!
//! ```text
//! peek:     PRE commands, in rule order   (paths, headers, injection)
//! process:  everything else, in order     (markdown, templates, filters)
//! ```

mod external;
mod header;
mod ignore;
mod markdown;
mod minify;
mod paginate;
mod path;
mod relativize;
mod tags;
mod template;

pub use paginate::COLLECT_PAGES;

use crate::{page::PageId, site::Site};
use anyhow::Result;
use std::{collections::BTreeMap, fmt, ops::BitOr, sync::Arc};

// ============================================================================
// Mode
// ============================================================================

/// Bit set describing when and how a processor runs.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode(u8);

impl Mode {
    pub const NONE: Self = Self(0);
    /// Runs during peek, before the page is visible to other pages
    pub const PRE: Self = Self(1);
    /// Left out of the processor listing
    pub const HIDDEN: Self = Self(2);
    /// Meant to be the last step of a rule
    pub const POST: Self = Self(4);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Mode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = [(Self::PRE, "PRE"), (Self::HIDDEN, "HIDDEN"), (Self::POST, "POST")]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

pub trait Processor: Send + Sync {
    /// One line for the processor listing.
    fn description(&self) -> &'static str;

    fn mode(&self) -> Mode {
        Mode::NONE
    }

    /// Transform `page` in place.
    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()>;
}

/// Name → processor.
#[derive(Clone)]
pub struct ProcessorMap {
    entries: BTreeMap<&'static str, Arc<dyn Processor>>,
}

impl ProcessorMap {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &'static str, processor: impl Processor + 'static) {
        self.entries.insert(name, Arc::new(processor));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Processor>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Processors shown to users, sorted by name.
    pub fn visible(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Processor>)> {
        self.entries
            .iter()
            .filter(|(_, p)| !p.mode().contains(Mode::HIDDEN))
            .map(|(name, p)| (*name, p))
    }
}

impl Default for ProcessorMap {
    /// The built-in processor set.
    fn default() -> Self {
        let mut map = Self::empty();

        map.insert("config", header::Config);
        map.insert("yaml", header::Yaml);

        map.insert("rename", path::Rename);
        map.insert("ext", path::Ext);
        map.insert("directorify", path::Directorify);
        map.insert("datefilename", path::DateFilename);
        map.insert("jekyllify", path::Jekyllify);

        map.insert("ignore", ignore::Ignore);
        map.insert("ignorefuture", ignore::IgnoreFuture);

        map.insert("tags", tags::Tags);
        map.insert("paginate", paginate::Paginate);
        map.insert(paginate::COLLECT_PAGES, paginate::CollectPages);

        map.insert("markdown", markdown::Markdown);
        map.insert("template", template::Template);
        map.insert("inner-template", template::InnerTemplate);
        map.insert("relativize", relativize::Relativize);
        map.insert("external", external::External);
        map.insert("minify", minify::Minify);

        map
    }
}

impl fmt::Debug for ProcessorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, p)| (name, p.mode())))
            .finish()
    }
}

/// `args.len()` must be exactly `n`.
pub(crate) fn expect_args(name: &str, args: &[String], n: usize) -> Result<()> {
    if args.len() != n {
        let plural = if n == 1 { "" } else { "s" };
        anyhow::bail!("{name} takes {n} argument{plural}, got {}", args.len());
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_bits() {
        let mode = Mode::PRE | Mode::HIDDEN;
        assert!(mode.contains(Mode::PRE));
        assert!(mode.contains(Mode::HIDDEN));
        assert!(!mode.contains(Mode::POST));
        assert!(Mode::NONE.contains(Mode::NONE));
        assert_eq!(format!("{mode:?}"), "PRE|HIDDEN");
        assert_eq!(format!("{:?}", Mode::NONE), "NONE");
    }

    #[test]
    fn test_builtin_modes() {
        let map = ProcessorMap::default();
        for pre in ["config", "yaml", "rename", "ext", "directorify", "ignore", "tags", "paginate"] {
            assert!(map.get(pre).unwrap().mode().contains(Mode::PRE), "{pre}");
        }
        for main in ["markdown", "template", "inner-template", "relativize", "external", "minify"] {
            assert!(!map.get(main).unwrap().mode().contains(Mode::PRE), "{main}");
        }
        assert!(map.get("minify").unwrap().mode().contains(Mode::POST));
    }

    #[test]
    fn test_hidden_not_listed() {
        let map = ProcessorMap::default();
        assert!(map.contains(paginate::COLLECT_PAGES));
        assert!(map.visible().all(|(name, _)| name != paginate::COLLECT_PAGES));
        assert!(map.visible().any(|(name, _)| name == "markdown"));
    }

    #[test]
    fn test_visible_sorted() {
        let map = ProcessorMap::default();
        let names: Vec<_> = map.visible().map(|(name, _)| name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_expect_args() {
        assert!(expect_args("ext", &["html".into()], 1).is_ok());
        let err = expect_args("paginate", &[], 2).unwrap_err();
        assert_eq!(err.to_string(), "paginate takes 2 arguments, got 0");
    }
}
