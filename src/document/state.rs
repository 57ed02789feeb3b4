use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::markdown;
use crate::document::model::DocumentModel;
use crate::error::{AppError, Result};

pub const RECENT_HISTORY_CAP: usize = 10;

/// Lifecycle of the single open note.
///
/// `Empty` has no path and no content, `Unsaved` has content but no path,
/// `Clean` matches disk, `Dirty` is ahead of disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Unsaved,
    Clean,
    Dirty,
}

/// The one active document per window. Switching files replaces it wholesale;
/// there is never a second session to merge with.
#[derive(Debug, Default)]
pub struct DocumentSession {
    path: Option<PathBuf>,
    content: String,
    model: DocumentModel,
    state: SessionState,
    recent: RecentHistory,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Empty
    }
}

impl DocumentSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recent(recent: RecentHistory) -> Self {
        Self {
            recent,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn recent(&self) -> &RecentHistory {
        &self.recent
    }

    pub fn recent_mut(&mut self) -> &mut RecentHistory {
        &mut self.recent
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, SessionState::Dirty | SessionState::Unsaved)
    }

    /// Any state -> `Empty`. Clears path, content and the rich model.
    pub fn new_document(&mut self) {
        self.path = None;
        self.content.clear();
        self.model = DocumentModel::default();
        self.state = SessionState::Empty;
    }

    /// Any state -> `Clean` with the given path/content.
    ///
    /// The pass through `new_document` is deliberate and load-bearing: the
    /// previous note's model must be fully gone before the new content is
    /// applied, or stale nodes bleed into the freshly loaded document.
    pub fn open_document(&mut self, path: PathBuf, content: String) {
        self.new_document();
        self.model = markdown::from_markdown(content.as_str());
        self.content = content;
        self.path = Some(path.clone());
        self.state = SessionState::Clean;
        self.recent.touch(path.as_path());
        debug!(path = %path.display(), "document opened");
    }

    /// Replace the rich model after an editor change and reserialize.
    /// `Clean` -> `Dirty`, `Empty` -> `Unsaved`; the others keep their state.
    pub fn apply_edit(&mut self, model: DocumentModel) {
        self.content = markdown::to_markdown(&model);
        self.model = model;
        self.state = match self.state {
            SessionState::Empty | SessionState::Unsaved => SessionState::Unsaved,
            SessionState::Clean | SessionState::Dirty => SessionState::Dirty,
        };
    }

    /// Replace content from raw Markdown (the editor surface hands text).
    pub fn apply_source_edit(&mut self, source: &str) {
        self.apply_edit(markdown::from_markdown(source));
    }

    /// `Dirty` -> `Clean` through the supplied writer. `Unsaved` needs a
    /// save-as interaction first and reports `NoActiveDocument`; a failed
    /// write leaves the state untouched.
    pub fn persist_with<F>(&mut self, write: F) -> Result<()>
    where
        F: FnOnce(&Path, &str) -> Result<()>,
    {
        match self.state {
            SessionState::Empty | SessionState::Clean => Ok(()),
            SessionState::Unsaved => Err(AppError::NoActiveDocument),
            SessionState::Dirty => {
                let path = self.path.clone().ok_or(AppError::NoActiveDocument)?;
                write(path.as_path(), self.content.as_str())?;
                self.state = SessionState::Clean;
                self.recent.touch(path.as_path());
                Ok(())
            }
        }
    }

    /// Bind an `Unsaved` (or re-homed) session to a path after its content
    /// was written there, entering `Clean`.
    pub fn adopt_path(&mut self, path: PathBuf) {
        self.path = Some(path.clone());
        self.state = SessionState::Clean;
        self.recent.touch(path.as_path());
    }

    /// Follow a rename of the active file without touching content state.
    pub fn follow_rename(&mut self, old_path: &Path, new_path: PathBuf) {
        if self.path.as_deref() == Some(old_path) {
            self.path = Some(new_path.clone());
        }
        self.recent.replace(old_path, new_path);
    }

    /// Any state -> `Empty`, discarding unsaved content. Callers that want
    /// the content kept must persist before closing.
    pub fn close_document(&mut self) {
        if self.is_dirty() {
            debug!("closing document with unsaved changes discarded");
        }
        self.new_document();
    }
}

/// Up to ten distinct paths, most recent first. Persisted through the
/// settings store across restarts.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecentHistory {
    entries: Vec<RecentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentEntry {
    pub path: PathBuf,
    pub touched_at: DateTime<Utc>,
}

impl RecentHistory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    /// Insert-or-move-to-front, capped at ten entries.
    pub fn touch(&mut self, path: &Path) {
        self.entries.retain(|e| e.path != path);
        self.entries.insert(
            0,
            RecentEntry {
                path: path.to_path_buf(),
                touched_at: Utc::now(),
            },
        );
        self.entries.truncate(RECENT_HISTORY_CAP);
    }

    pub fn remove(&mut self, path: &Path) {
        self.entries.retain(|e| e.path != path);
    }

    pub fn replace(&mut self, old_path: &Path, new_path: PathBuf) {
        self.entries.retain(|e| e.path != new_path);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.path == old_path) {
            entry.path = new_path;
        }
    }

    /// Most recent entry that still exists on disk, skipping `skip`.
    /// Drives the reopen-next flow after the active file is deleted.
    pub fn first_existing(&self, skip: Option<&Path>) -> Option<PathBuf> {
        self.entries
            .iter()
            .map(|e| e.path.as_path())
            .filter(|p| Some(*p) != skip)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }
}
