use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
    document::{
        autosave::AutoSaveScheduler,
        model::{Block, BlockId, ImageBlock, ImageSource},
        state::{DocumentSession, SessionState},
    },
    error::{AppError, Result},
    files::{self, assets},
    settings::SettingsStore,
    ui::{ViewMode, dialog::ShellDialogs, sidebar::Sidebar},
};

/// One entry per menu/keyboard command; each maps to exactly one core
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NewFile,
    OpenFile,
    OpenPath(PathBuf),
    Save,
    SaveAs,
    CloseFile,
    ToggleMode,
    RenameFile { path: PathBuf, new_name: String },
    DeleteFile(PathBuf),
    InsertImage,
    CleanUnusedAssets,
    ChooseRoot,
}

/// Wires the session, scheduler, sidebar and settings together and owns
/// the command dispatch the shell drives.
pub struct App<D: ShellDialogs> {
    settings: SettingsStore,
    session: DocumentSession,
    autosave: AutoSaveScheduler,
    sidebar: Sidebar,
    dialogs: D,
    view_mode: ViewMode,
}

impl<D: ShellDialogs> App<D> {
    pub fn new(dialogs: D) -> Result<Self> {
        Ok(Self::with_settings(SettingsStore::load()?, dialogs))
    }

    pub fn with_settings(settings: SettingsStore, dialogs: D) -> Self {
        let recent = settings.settings().recent.clone();
        let delay = Duration::from_millis(settings.settings().files.auto_save_delay_ms);
        Self {
            settings,
            session: DocumentSession::with_recent(recent),
            autosave: AutoSaveScheduler::new(delay),
            sidebar: Sidebar::new(),
            dialogs,
            view_mode: ViewMode::default(),
        }
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn sidebar(&self) -> &Sidebar {
        &self.sidebar
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// HTML for the preview pane, rendered from the current content.
    pub fn preview_html(&self) -> String {
        crate::ui::preview::render_preview(self.session.content())
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Bring back the previous run: watch the root and reopen the last
    /// file. A vanished file resets to `Empty` instead of failing startup.
    pub fn restore(&mut self) {
        if let Some(root) = self.root_directory() {
            if let Err(err) = self.sidebar.watch_root(root.as_path()) {
                warn!(error = %err, "could not watch root directory");
            }
        }
        self.refresh_sidebar();

        let last = self.settings.settings().files.last_opened_file.clone();
        if let Some(path) = last {
            match files::read(path.as_path()) {
                Ok(content) => {
                    self.session.open_document(path.clone(), content);
                    self.sidebar.set_active(Some(path.clone()));
                    info!(path = %path.display(), "restored last document");
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "last document unavailable");
                    self.session.new_document();
                    self.settings.update(|s| s.files.last_opened_file = None);
                }
            }
        }
        self.sync_settings();
    }

    /// Dispatch one command. Real failures surface through the error box;
    /// a canceled picker is swallowed as the no-op it is.
    pub fn handle_command(&mut self, command: AppCommand, now: Instant) -> Result<()> {
        match self.dispatch(command, now) {
            Err(err) if err.is_canceled() => Ok(()),
            Err(err) => {
                self.dialogs.show_error("Markly", err.to_string().as_str());
                Err(err)
            }
            ok => ok,
        }
    }

    fn dispatch(&mut self, command: AppCommand, now: Instant) -> Result<()> {
        match command {
            AppCommand::NewFile => self.new_file(),
            AppCommand::OpenFile => {
                let path = self.dialogs.pick_open_file().ok_or(AppError::Canceled)?;
                self.open_path(path)
            }
            AppCommand::OpenPath(path) => self.open_path(path),
            AppCommand::Save => self.save(),
            AppCommand::SaveAs => self.save_as(),
            AppCommand::CloseFile => self.close_file(),
            AppCommand::ToggleMode => {
                self.view_mode = self.view_mode.toggle();
                Ok(())
            }
            AppCommand::RenameFile { path, new_name } => self.rename_file(path, new_name),
            AppCommand::DeleteFile(path) => self.delete_file(path),
            AppCommand::InsertImage => self.insert_image(now),
            AppCommand::CleanUnusedAssets => self.clean_unused_assets(),
            AppCommand::ChooseRoot => self.choose_root(),
        }
    }

    /// Editor change event: update the session and arm the debounce.
    pub fn content_changed(&mut self, markdown: &str, now: Instant) {
        self.session.apply_source_edit(markdown);
        self.autosave
            .content_changed(self.session.content().to_string(), now);
    }

    /// Periodic pump from the shell: due auto-saves, watcher-driven sidebar
    /// refreshes, settings flushes.
    pub fn tick(&mut self, now: Instant) {
        if self.autosave.take_due(now).is_some() {
            if self.session.path().is_some() {
                // Auto-save failures never interrupt editing.
                match self.session.persist_with(|p, c| files::write(p, c)) {
                    Ok(()) => self.sync_settings(),
                    Err(err) => warn!(error = %err, "auto-save failed"),
                }
            }
            // With no path the payload is dropped, not queued; the content
            // stays in the session until a save-as gives it a home.
        }

        if self.sidebar.tick() {
            self.refresh_sidebar();
        }

        if let Err(err) = self.settings.flush_if_due() {
            warn!(error = %err, "settings flush failed");
        }
    }

    /// Flush outstanding work before the window goes away.
    pub fn shutdown(&mut self) {
        self.autosave.take_immediate();
        if let Err(err) = self.session.persist_with(|p, c| files::write(p, c)) {
            if !matches!(err, AppError::NoActiveDocument) {
                warn!(error = %err, "final save failed");
            }
        }
        self.sync_settings();
        if let Err(err) = self.settings.force_flush() {
            warn!(error = %err, "settings flush on shutdown failed");
        }
    }

    fn new_file(&mut self) -> Result<()> {
        let root = self.root_directory().ok_or(AppError::NoRootConfigured)?;
        self.persist_current_silently();
        let path = files::create(root.as_path(), "Untitled")?;
        self.session.open_document(path, String::new());
        self.after_document_change();
        Ok(())
    }

    fn open_path(&mut self, path: PathBuf) -> Result<()> {
        if self.session.path() == Some(path.as_path()) {
            self.refresh_sidebar();
            return Ok(());
        }
        // The switch boundary is durable: pending edits land on disk before
        // the session is replaced.
        self.persist_current_silently();
        let content = files::read(path.as_path())?;
        self.session.open_document(path, content);
        self.after_document_change();
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        match self.session.state() {
            SessionState::Unsaved => self.save_as(),
            _ => {
                self.autosave.take_immediate();
                self.session.persist_with(|p, c| files::write(p, c))?;
                self.sync_settings();
                Ok(())
            }
        }
    }

    fn save_as(&mut self) -> Result<()> {
        let default_name = self
            .session
            .path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled.md".to_string());
        let target = self
            .dialogs
            .pick_save_file(default_name.as_str())
            .ok_or(AppError::Canceled)?;

        self.autosave.take_immediate();
        files::write(target.as_path(), self.session.content())?;
        self.session.adopt_path(target);
        self.after_document_change();
        Ok(())
    }

    fn close_file(&mut self) -> Result<()> {
        // Close discards; callers that want the edits must save first.
        self.autosave.cancel();
        self.session.close_document();
        self.settings.update(|s| s.files.last_opened_file = None);
        self.sidebar.set_active(None);
        Ok(())
    }

    fn rename_file(&mut self, path: PathBuf, new_name: String) -> Result<()> {
        let new_path = files::rename(path.as_path(), new_name.as_str())?;
        self.session.follow_rename(path.as_path(), new_path);
        self.after_document_change();
        Ok(())
    }

    fn delete_file(&mut self, path: PathBuf) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if !self.dialogs.confirm_delete(name.as_str()) {
            return Err(AppError::Canceled);
        }

        files::delete(path.as_path())?;
        let was_active = self.session.path() == Some(path.as_path());
        self.session.recent_mut().remove(path.as_path());

        if was_active {
            self.autosave.cancel();
            self.session.close_document();
            // Offer the most recent note that still exists; otherwise the
            // sidebar's no-files signal drives the placeholder.
            if let Some(next) = self.session.recent().first_existing(Some(path.as_path())) {
                match files::read(next.as_path()) {
                    Ok(content) => self.session.open_document(next, content),
                    Err(err) => warn!(path = %next.display(), error = %err, "could not reopen recent note"),
                }
            }
        }
        self.after_document_change();
        Ok(())
    }

    fn insert_image(&mut self, now: Instant) -> Result<()> {
        if self.session.path().is_none() {
            return Err(AppError::NoActiveDocument);
        }
        let source = self.dialogs.pick_image().ok_or(AppError::Canceled)?;
        let asset = assets::resolve(self.session.path(), source.as_path())?;

        let alt_text = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut model = self.session.model().clone();
        let id = BlockId(model.blocks.len() as u64 + 1);
        model.blocks.push(Block::Image(ImageBlock {
            id,
            source: ImageSource {
                storage_path: Some(asset.storage_path),
                display_url: Some(asset.display_url),
            },
            alt_text,
            title: None,
        }));
        self.session.apply_edit(model);
        self.autosave
            .content_changed(self.session.content().to_string(), now);
        Ok(())
    }

    fn clean_unused_assets(&mut self) -> Result<()> {
        let path = self
            .session
            .path()
            .map(Path::to_path_buf)
            .ok_or(AppError::NoActiveDocument)?;
        let referenced: Vec<String> = self
            .session
            .model()
            .images()
            .iter()
            .filter_map(|img| img.source.storage_path.clone())
            .collect();
        let removed = assets::clean_unused_assets(path.as_path(), referenced.as_slice())?;
        info!(count = removed.len(), "unused assets removed");
        Ok(())
    }

    fn choose_root(&mut self) -> Result<()> {
        let root = self.dialogs.pick_directory().ok_or(AppError::Canceled)?;
        self.settings
            .update(|s| s.files.root_directory = Some(root.clone()));
        if let Err(err) = self.sidebar.watch_root(root.as_path()) {
            warn!(error = %err, "could not watch root directory");
        }
        self.refresh_sidebar();
        Ok(())
    }

    fn root_directory(&self) -> Option<PathBuf> {
        self.settings.settings().files.root_directory.clone()
    }

    fn refresh_sidebar(&mut self) {
        let root = self.root_directory();
        self.sidebar.refresh(root.as_deref());
    }

    /// Best-effort save used at switch boundaries. A session without a
    /// path keeps its content in memory; nothing is queued or reported.
    fn persist_current_silently(&mut self) {
        self.autosave.take_immediate();
        match self.session.persist_with(|p, c| files::write(p, c)) {
            Ok(()) => {}
            Err(AppError::NoActiveDocument) => {}
            Err(err) => warn!(error = %err, "save before switch failed"),
        }
    }

    fn after_document_change(&mut self) {
        self.sidebar
            .set_active(self.session.path().map(Path::to_path_buf));
        self.sync_settings();
        self.refresh_sidebar();
    }

    /// Mirror session-side state the settings file persists.
    fn sync_settings(&mut self) {
        let active = self.session.path().map(Path::to_path_buf);
        let recent = self.session.recent().clone();
        self.settings.update(|s| {
            s.files.last_opened_file = active.clone();
            s.recent = recent.clone();
        });
    }
}
