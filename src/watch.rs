//! File watcher that turns bursts of filesystem events into rebuilds.
//!
//! ```text
//! notify events ──▶ Debouncer (50ms quiet) ──▶ on_change(paths)
//! ```
//!
//! The callback runs on the watching thread, so rebuilds never overlap.
//! Events that arrive meanwhile wait in the channel and end up in a single
//! follow-up rebuild.

use crate::log;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

const DEBOUNCE_MS: u64 = 50;

/// Editor artifacts and dot-files; the build skips dot-files anyway.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Debounce State
// =============================================================================

/// Collects changed paths until events stop arriving for a moment.
struct Debouncer {
    /// Writes under here are the build's own output
    ignore_root: PathBuf,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(ignore_root: &Path) -> Self {
        Self {
            ignore_root: ignore_root.to_path_buf(),
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        let before = self.pending.len();
        for path in event.paths {
            if !is_temp_file(&path) && !path.starts_with(&self.ignore_root) {
                self.pending.insert(path);
            }
        }
        if self.pending.len() > before {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Changed paths, sorted.
    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch `paths` and call `on_change` after each burst of changes.
///
/// Directories are watched recursively. Missing paths are skipped. Changes
/// under `ignore_root` never trigger anything. Blocks until the watcher
/// goes away.
pub fn watch_blocking(
    paths: &[PathBuf],
    ignore_root: &Path,
    mut on_change: impl FnMut(&[PathBuf]),
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;

    for path in paths.iter().filter(|p| p.exists()) {
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        log!("watch"; "{}", path.display());
    }

    let mut debouncer = Debouncer::new(ignore_root);
    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => on_change(&debouncer.take()),
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }
    Ok(())
}
