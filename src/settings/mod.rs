pub mod schema;

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tracing::warn;

use crate::error::{AppError, Result};

use schema::Settings;

const SAVE_DEBOUNCE_MS: u64 = 500;

/// JSON-backed settings with a debounced flush: mutations mark the store
/// pending and the periodic tick writes once the changes go quiet.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
    pending_write: bool,
    last_change_at: Option<Instant>,
    debounce: Duration,
}

impl SettingsStore {
    pub fn load() -> Result<Self> {
        Self::with_path(settings_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = load_settings_from(path.as_path());
        Ok(Self {
            path,
            settings,
            pending_write: false,
            last_change_at: None,
            debounce: Duration::from_millis(SAVE_DEBOUNCE_MS),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn update<F>(&mut self, mutator: F)
    where
        F: FnOnce(&mut Settings),
    {
        mutator(&mut self.settings);
        self.pending_write = true;
        self.last_change_at = Some(Instant::now());
    }

    pub fn flush_if_due(&mut self) -> Result<bool> {
        let Some(last_change) = self.last_change_at else {
            return Ok(false);
        };
        if !self.pending_write || last_change.elapsed() < self.debounce {
            return Ok(false);
        }

        save_settings_to(self.path.as_path(), &self.settings)?;
        self.pending_write = false;
        self.last_change_at = None;
        Ok(true)
    }

    pub fn force_flush(&mut self) -> Result<()> {
        if self.pending_write {
            save_settings_to(self.path.as_path(), &self.settings)?;
            self.pending_write = false;
            self.last_change_at = None;
        }
        Ok(())
    }
}

pub fn settings_path() -> PathBuf {
    if let Some(root) = portable_root() {
        return root.join("settings.json");
    }

    if let Some(base) = dirs::config_dir() {
        base.join("Markly").join("settings.json")
    } else {
        PathBuf::from("settings.json")
    }
}

/// A `markly.ini` marker beside the executable switches the app to
/// portable mode, keeping settings next to the binary.
pub fn portable_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.to_path_buf();
    let marker = dir.join("markly.ini");
    if marker.exists() { Some(dir) } else { None }
}

/// Missing or unreadable settings fall back to defaults; a corrupt file is
/// never fatal on startup.
pub fn load_settings_from(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str::<Settings>(data.as_str()) {
            Ok(settings) => settings.migrate(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "settings file corrupt, using defaults");
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::from_io(e, parent))?;
    }
    let data = serde_json::to_string_pretty(&settings.clone().migrate())
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?;
    fs::write(path, data).map_err(|e| AppError::from_io(e, path))
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_settings_file(name: &str) -> PathBuf {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("markly-settings-{name}-{tick}.json"))
    }

    #[test]
    fn round_trips_through_disk() {
        let path = temp_settings_file("roundtrip");
        let mut store = SettingsStore::with_path(&path).expect("store");
        store.update(|s| {
            s.files.root_directory = Some(PathBuf::from("/notes"));
            s.recent.touch(Path::new("/notes/a.md"));
        });
        store.force_flush().expect("flush");

        let reloaded = load_settings_from(path.as_path());
        assert_eq!(
            reloaded.files.root_directory.as_deref(),
            Some(Path::new("/notes"))
        );
        assert_eq!(reloaded.recent.paths().next(), Some(Path::new("/notes/a.md")));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = temp_settings_file("corrupt");
        fs::write(&path, "{ not json").expect("seed");
        assert_eq!(load_settings_from(path.as_path()), Settings::default());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn flush_waits_for_the_quiet_period() {
        let path = temp_settings_file("debounce");
        let mut store = SettingsStore::with_path(&path).expect("store");

        store.update(|s| s.files.auto_save_delay_ms = 750);
        assert!(!store.flush_if_due().expect("not due yet"));
        assert!(!path.exists());

        store.debounce = Duration::ZERO;
        assert!(store.flush_if_due().expect("due"));
        assert!(path.exists());
        // Nothing pending afterwards.
        assert!(!store.flush_if_due().expect("drained"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn force_flush_without_changes_is_a_no_op() {
        let path = temp_settings_file("noop");
        let mut store = SettingsStore::with_path(&path).expect("store");
        store.force_flush().expect("no-op flush");
        assert!(!path.exists());
    }
}
