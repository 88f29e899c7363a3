//! Output path rewriting. All of these run during peek, so a page's final
//! path is known before any other page can link to it.

use super::{Mode, Processor, expect_args};
use crate::{config::rules::basename, page::PageId, page::header::parse_date, site::Site};
use anyhow::{Result, anyhow, bail};
use regex::Regex;
use std::sync::LazyLock;

/// `2006-01-02-name`
static DATED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)$").unwrap());

/// Directory part of a relative path, with its trailing `/`, or empty.
fn dir_prefix(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..=i])
}

// ============================================================================
// rename
// ============================================================================

pub struct Rename;

impl Processor for Rename {
    fn description(&self) -> &'static str {
        "rename resulting file (argument: new name relative to the current directory, \
         `*` takes the part matched by the rule's `*`)"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        expect_args("rename", args, 1)?;
        let page = site.page_mut(page);
        let pattern = page.pattern.as_deref().unwrap_or_default();
        page.path = renamed(pattern, &page.path, &args[0])?;
        Ok(())
    }
}

fn renamed(pattern: &str, path: &str, dest: &str) -> Result<String> {
    let mut dest = dest.to_owned();

    if dest.contains('*') {
        if !pattern.contains('*') {
            bail!("cannot rename '{pattern}' to '{dest}'");
        }
        let capture = regex::escape(basename(pattern)).replacen(r"\*", "([^/]*)", 1);
        let re = Regex::new(&format!("^{capture}$"))?;
        let name = basename(path);
        let caps = re
            .captures(name)
            .ok_or_else(|| anyhow!("'{name}' does not match '{pattern}', cannot rename to '{dest}'"))?;
        dest = dest.replacen('*', &caps[1], 1);
    }

    Ok(format!("{}{dest}", dir_prefix(path)))
}

// ============================================================================
// ext
// ============================================================================

pub struct Ext;

impl Processor for Ext {
    fn description(&self) -> &'static str {
        "change extension (argument: new extension with the dot)"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        expect_args("ext", args, 1)?;
        let page = site.page_mut(page);
        page.path = with_extension(&page.path, &args[0]);
        Ok(())
    }
}

fn with_extension(path: &str, ext: &str) -> String {
    let dir = dir_prefix(path);
    let name = &path[dir.len()..];
    let stem = name.rfind('.').map_or(name, |i| &name[..i]);
    format!("{dir}{stem}{ext}")
}

// ============================================================================
// directorify
// ============================================================================

pub struct Directorify;

impl Processor for Directorify {
    fn description(&self) -> &'static str {
        "path/name.html -> path/name/index.html"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let page = site.page_mut(page);
        if let Some(path) = directorified(&page.path) {
            page.path = path;
        }
        Ok(())
    }
}

fn directorified(path: &str) -> Option<String> {
    if basename(path) == "index.html" {
        return None;
    }
    let stem = path.strip_suffix(".html")?;
    Some(format!("{stem}/index.html"))
}

// ============================================================================
// datefilename, jekyllify
// ============================================================================

pub struct DateFilename;

impl Processor for DateFilename {
    fn description(&self) -> &'static str {
        "2014-05-06-name.md -> name.md, and set the date to 2014-05-06"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let page = site.page_mut(page);
        let dir = dir_prefix(&page.path);
        let Some(caps) = DATED_NAME.captures(&page.path[dir.len()..]) else {
            return Ok(());
        };
        let Some(date) = parse_date(&format!("{}-{}-{}", &caps[1], &caps[2], &caps[3])) else {
            return Ok(());
        };
        let path = format!("{dir}{}", &caps[4]);
        page.header.date = Some(date);
        page.path = path;
        Ok(())
    }
}

pub struct Jekyllify;

impl Processor for Jekyllify {
    fn description(&self) -> &'static str {
        "2014-05-06-name.md -> 2014/05/06/name.md, like Jekyll permalinks"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let page = site.page_mut(page);
        if let Some(caps) = DATED_NAME.captures(basename(&page.path)) {
            let path = format!("{}/{}/{}/{}", &caps[1], &caps[2], &caps[3], &caps[4]);
            page.path = path;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
