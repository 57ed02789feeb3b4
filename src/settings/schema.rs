use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::state::{RECENT_HISTORY_CAP, RecentHistory};

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// Everything the app persists between runs. Serialized as pretty JSON by
/// the settings store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub schema_version: u32,
    pub files: FileSettings,
    pub recent: RecentHistory,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            files: FileSettings::default(),
            recent: RecentHistory::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileSettings {
    /// Directory the sidebar lists. Unset until the user picks one.
    pub root_directory: Option<PathBuf>,
    /// Restored on launch when it still exists.
    pub last_opened_file: Option<PathBuf>,
    pub auto_save_delay_ms: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            root_directory: None,
            last_opened_file: None,
            auto_save_delay_ms: crate::document::autosave::AUTO_SAVE_DEBOUNCE_MS,
        }
    }
}

impl Settings {
    /// Bring a loaded file up to the current shape. Newer files pass
    /// through untouched so a downgrade never destroys data.
    pub fn migrate(mut self) -> Self {
        if self.schema_version > SETTINGS_SCHEMA_VERSION {
            return self;
        }
        self.schema_version = SETTINGS_SCHEMA_VERSION;

        if self.files.auto_save_delay_ms == 0 {
            self.files.auto_save_delay_ms = FileSettings::default().auto_save_delay_ms;
        }
        // A hand-edited file may exceed the cap; re-touching the tail keeps
        // the most recent entries in front.
        while self.recent.len() > RECENT_HISTORY_CAP {
            let last = self
                .recent
                .paths()
                .last()
                .map(std::path::Path::to_path_buf);
            if let Some(last) = last {
                self.recent.remove(last.as_path());
            } else {
                break;
            }
        }
        self
    }
}
