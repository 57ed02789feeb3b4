use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::files::{self, FileEntry};

/// What the shell should render for the file pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarView {
    /// No root directory configured yet; prompt for one.
    NoRoot,
    /// Root is set but holds no notes; show the placeholder, not an empty
    /// list.
    NoFiles,
    Files(Vec<SidebarRow>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarRow {
    pub name: String,
    pub path: PathBuf,
    pub active: bool,
}

/// Reconciles directory listings with the rendered file list.
///
/// Every completed listing rebuilds the rows wholesale; the previous set
/// only matters for the highlight. Listings are serialized: a refresh
/// issued while one is in flight is dropped, never queued, so partial
/// renders cannot interleave.
pub struct Sidebar {
    entries: Vec<FileEntry>,
    active_path: Option<PathBuf>,
    refreshing: bool,
    stale: bool,
    no_root: bool,
    watcher: Option<RecommendedWatcher>,
    watch_events: Arc<Mutex<Vec<notify::Event>>>,
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new()
    }
}

impl Sidebar {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            active_path: None,
            refreshing: false,
            stale: false,
            no_root: true,
            watcher: None,
            watch_events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_active(&mut self, path: Option<PathBuf>) {
        self.active_path = path;
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }

    /// Convenience wrapper: begin, list, complete.
    pub fn refresh(&mut self, root: Option<&Path>) {
        if !self.begin_refresh() {
            return;
        }
        let result = files::list(root);
        self.complete_refresh(result);
    }

    /// Claim the in-flight slot. Returns false when a listing is already
    /// running; that refresh request is dropped.
    pub fn begin_refresh(&mut self) -> bool {
        if self.refreshing {
            debug!("listing already in flight, dropping refresh");
            return false;
        }
        self.refreshing = true;
        true
    }

    pub fn complete_refresh(&mut self, result: Result<Vec<FileEntry>>) {
        self.refreshing = false;
        self.stale = false;
        match result {
            Ok(entries) => {
                self.no_root = false;
                self.entries = dedup_by_path(entries);
            }
            Err(AppError::NoRootConfigured) => {
                self.no_root = true;
                self.entries.clear();
            }
            Err(err) => {
                // Keep the last good listing on transient failures.
                warn!(error = %err, "directory listing failed");
            }
        }
    }

    /// Watch the root so external changes mark the listing stale; the next
    /// tick triggers a refresh. Watching is best-effort.
    pub fn watch_root(&mut self, root: &Path) -> Result<()> {
        let sink = Arc::clone(&self.watch_events);
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            if let Ok(event) = event {
                sink.lock().push(event);
            }
        })
        .map_err(map_notify)?;
        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(map_notify)?;
        self.watcher = Some(watcher);
        self.watch_events.lock().clear();
        Ok(())
    }

    /// Drain watcher events; true means the listing went stale and the
    /// caller should refresh.
    pub fn tick(&mut self) -> bool {
        {
            let mut events = self.watch_events.lock();
            if !events.is_empty() {
                events.clear();
                self.stale = true;
            }
        }
        self.stale
    }

    /// Exactly one row is highlighted: the one matching the active
    /// document path. No active path, no highlight.
    pub fn view(&self) -> SidebarView {
        if self.no_root {
            return SidebarView::NoRoot;
        }
        if self.entries.is_empty() {
            return SidebarView::NoFiles;
        }
        let rows = self
            .entries
            .iter()
            .map(|entry| SidebarRow {
                name: entry.name.clone(),
                path: entry.path.clone(),
                active: self.active_path.as_deref() == Some(entry.path.as_path()),
            })
            .collect();
        SidebarView::Files(rows)
    }
}

/// First occurrence wins; the rendered list never shows a path twice even
/// if the underlying enumeration briefly does.
fn dedup_by_path(entries: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.path.clone()))
        .collect()
}

fn map_notify(err: notify::Error) -> AppError {
    AppError::Io(std::io::Error::other(err.to_string()))
}
