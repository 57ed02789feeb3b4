use std::path::PathBuf;

use tracing::error;

/// Boundary to the native shell: pickers, confirmation prompts and the
/// error box. Implementations live outside the core; a returned `None`
/// means the user canceled, which is a no-op outcome, not an error.
pub trait ShellDialogs {
    fn pick_open_file(&mut self) -> Option<PathBuf>;
    fn pick_save_file(&mut self, default_name: &str) -> Option<PathBuf>;
    fn pick_directory(&mut self) -> Option<PathBuf>;
    fn pick_image(&mut self) -> Option<PathBuf>;
    fn confirm_delete(&mut self, file_name: &str) -> bool;
    fn show_error(&mut self, title: &str, body: &str);
}

/// Shell-less implementation: every picker cancels, every prompt declines,
/// errors go to the log. Used by the headless binary and anywhere no real
/// shell is attached.
#[derive(Debug, Default)]
pub struct HeadlessDialogs;

impl ShellDialogs for HeadlessDialogs {
    fn pick_open_file(&mut self) -> Option<PathBuf> {
        None
    }

    fn pick_save_file(&mut self, _default_name: &str) -> Option<PathBuf> {
        None
    }

    fn pick_directory(&mut self) -> Option<PathBuf> {
        None
    }

    fn pick_image(&mut self) -> Option<PathBuf> {
        None
    }

    fn confirm_delete(&mut self, _file_name: &str) -> bool {
        false
    }

    fn show_error(&mut self, title: &str, body: &str) {
        error!(title, body, "dialog error");
    }
}
