//! Filesystem helpers: source walking, mtimes and verbatim copies.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};
use walkdir::{DirEntry, WalkDir};

/// A file found under the source root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Relative to the source root, `/`-separated
    pub relative: String,
    pub full_path: PathBuf,
    pub mod_time: SystemTime,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Every file under `root` in file-name order.
///
/// Dot-files and dot-directories are skipped. Symlinks are reported as
/// files and never followed.
pub fn walk_sources(root: &Path) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", entry.path().display(), root.display()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let mod_time = symlink_mtime(entry.path())?;
        files.push(SourceFile {
            relative,
            full_path: entry.into_path(),
            mod_time,
        });
    }
    Ok(files)
}

/// Mtime of the link itself, not its target.
pub fn symlink_mtime(path: &Path) -> Result<SystemTime> {
    fs::symlink_metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to stat {}", path.display()))
}

/// Mtime of `path`, or `None` if it does not exist.
pub fn mtime(path: &Path) -> Option<SystemTime> {
    fs::symlink_metadata(path).and_then(|m| m.modified()).ok()
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Copy a file byte for byte. A symlink is re-created, not followed.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    ensure_parent(to)?;

    let meta = fs::symlink_metadata(from)
        .with_context(|| format!("Failed to stat {}", from.display()))?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(from)
            .with_context(|| format!("Failed to read link {}", from.display()))?;
        if fs::symlink_metadata(to).is_ok() {
            fs::remove_file(to).with_context(|| format!("Failed to replace {}", to.display()))?;
        }
        return make_symlink(&target, to)
            .with_context(|| format!("Failed to link {}", to.display()));
    }

    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
