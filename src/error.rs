use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy shared by the repository, resolver and session layers.
///
/// Every operation that crosses the core boundary returns one of these
/// instead of raising; `Canceled` is a no-op outcome and must never reach an
/// error dialog.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("no root directory configured")]
    NoRootConfigured,

    #[error("no active document")]
    NoActiveDocument,

    #[error("canceled")]
    Canceled,

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Translate an io error for `path` so missing files keep their path.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
