use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::error::{AppError, Result};

pub mod assets;

/// One row of a directory listing, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_markdown: bool,
}

pub fn is_markdown_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("md") | Some("markdown")
    )
}

/// Non-recursive listing of the Markdown files under `root`, in whatever
/// order the filesystem hands them back. Callers must not assume an order.
pub fn list(root: Option<&Path>) -> Result<Vec<FileEntry>> {
    let root = root.ok_or(AppError::NoRootConfigured)?;
    let mut entries = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| AppError::from_io(e, root))? {
        let entry = entry.map_err(AppError::Io)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(AppError::Io)?;
        if file_type.is_dir() || !is_markdown_path(path.as_path()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(FileEntry {
            name,
            is_markdown: true,
            path,
        });
    }
    Ok(entries)
}

pub fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| AppError::from_io(e, path))
}

/// Write through a sibling temp file and rename it into place, so a failed
/// write never truncates the previous content.
pub fn write(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::NotFound(path.to_path_buf()))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(tmp.as_path(), content).map_err(|e| AppError::from_io(e, tmp.as_path()))?;
    if let Err(err) = fs::rename(tmp.as_path(), path) {
        let _ = fs::remove_file(tmp.as_path());
        return Err(AppError::from_io(err, path));
    }
    debug!(path = %path.display(), bytes = content.len(), "wrote file");
    Ok(())
}

/// Create an empty note named after `base_name` under `root`, probing
/// `name.md`, `name(1).md`, `name(2).md`, ... until a free slot is found.
pub fn create(root: &Path, base_name: &str) -> Result<PathBuf> {
    let file_name = if is_markdown_path(Path::new(base_name)) {
        base_name.to_string()
    } else {
        format!("{base_name}.md")
    };

    let (stem, ext) = split_name(file_name.as_str());
    let mut candidate = root.join(file_name.as_str());
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = root.join(format!("{stem}({counter}).{ext}"));
        counter += 1;
    }

    fs::write(candidate.as_path(), "").map_err(|e| AppError::from_io(e, candidate.as_path()))?;
    debug!(path = %candidate.display(), "created note");
    Ok(candidate)
}

/// Rename within the same directory, preserving the original extension when
/// the new name omits it. Never overwrites: an occupied target fails with
/// `AlreadyExists` and leaves the source untouched.
pub fn rename(old_path: &Path, new_name: &str) -> Result<PathBuf> {
    let dir = old_path
        .parent()
        .ok_or_else(|| AppError::NotFound(old_path.to_path_buf()))?;
    let ext = old_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("md");

    let lower = new_name.to_ascii_lowercase();
    let new_file_name = if lower.ends_with(format!(".{}", ext.to_ascii_lowercase()).as_str()) {
        new_name.to_string()
    } else {
        format!("{new_name}.{ext}")
    };
    let new_path = dir.join(new_file_name);

    if new_path.as_path() == old_path {
        return Ok(new_path);
    }
    if new_path.exists() {
        return Err(AppError::AlreadyExists(new_path));
    }

    fs::rename(old_path, new_path.as_path()).map_err(|e| AppError::from_io(e, old_path))?;
    debug!(from = %old_path.display(), to = %new_path.display(), "renamed note");
    Ok(new_path)
}

/// Remove a file. If the first unlink fails for anything other than a
/// missing file, one forced retry is attempted (on Windows this clears the
/// read-only flag an external tool may have left behind) before the error
/// surfaces.
pub fn delete(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::NotFound(path.to_path_buf()))
        }
        Err(first) => {
            warn!(path = %path.display(), error = %first, "delete failed, retrying once");
            #[cfg(windows)]
            if let Ok(metadata) = fs::metadata(path) {
                let mut permissions = metadata.permissions();
                permissions.set_readonly(false);
                let _ = fs::set_permissions(path, permissions);
            }
            match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(_) => Err(AppError::Io(first)),
            }
        }
    }
}

fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, "md"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("markly-files-{name}-{tick}"));
        fs::create_dir_all(&dir).expect("create temp root");
        dir
    }

    #[test]
    fn list_requires_a_configured_root() {
        let err = list(None).expect_err("no root");
        assert!(matches!(err, AppError::NoRootConfigured));
    }

    #[test]
    fn list_filters_to_markdown_files_only() {
        let root = temp_root("list");
        fs::write(root.join("a.md"), "").expect("seed");
        fs::write(root.join("B.MARKDOWN"), "").expect("seed");
        fs::write(root.join("notes.txt"), "").expect("seed");
        fs::create_dir(root.join("folder.md")).expect("seed dir");

        let mut names: Vec<String> = list(Some(root.as_path()))
            .expect("list")
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["B.MARKDOWN".to_string(), "a.md".to_string()]);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn create_probes_distinct_names() {
        let root = temp_root("create");

        let first = create(root.as_path(), "Untitled").expect("first");
        let second = create(root.as_path(), "Untitled").expect("second");
        let third = create(root.as_path(), "Untitled.md").expect("third");

        assert_eq!(first.file_name().unwrap(), "Untitled.md");
        assert_eq!(second.file_name().unwrap(), "Untitled(1).md");
        assert_eq!(third.file_name().unwrap(), "Untitled(2).md");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn create_then_write_then_read_back() {
        let root = temp_root("roundtrip");

        let path = create(root.as_path(), "Untitled").expect("create");
        write(path.as_path(), "# Hi").expect("write");
        assert_eq!(read(path.as_path()).expect("read"), "# Hi");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn write_replaces_content_and_leaves_no_temp_file() {
        let root = temp_root("write");
        let path = root.join("note.md");
        write(path.as_path(), "v1").expect("first write");
        write(path.as_path(), "v2").expect("second write");

        assert_eq!(read(path.as_path()).expect("read"), "v2");
        let leftovers: Vec<_> = fs::read_dir(&root)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rename_appends_missing_extension() {
        let root = temp_root("rename-ext");
        fs::write(root.join("a.md"), "alpha").expect("seed");
        fs::write(root.join("b.md"), "beta").expect("seed");

        let renamed = rename(root.join("a.md").as_path(), "a2").expect("rename");
        assert_eq!(renamed.file_name().unwrap(), "a2.md");
        assert_eq!(read(renamed.as_path()).expect("read"), "alpha");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rename_onto_existing_file_fails_without_touching_source() {
        let root = temp_root("rename-clash");
        fs::write(root.join("a.md"), "alpha").expect("seed");
        fs::write(root.join("b.md"), "beta").expect("seed");

        let err = rename(root.join("a.md").as_path(), "b").expect_err("target occupied");
        assert!(matches!(err, AppError::AlreadyExists(_)));
        assert_eq!(read(root.join("a.md").as_path()).expect("read"), "alpha");
        assert_eq!(read(root.join("b.md").as_path()).expect("read"), "beta");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rename_to_own_name_is_a_no_op() {
        let root = temp_root("rename-self");
        fs::write(root.join("a.md"), "alpha").expect("seed");

        let renamed = rename(root.join("a.md").as_path(), "a").expect("self rename");
        assert_eq!(renamed, root.join("a.md"));
        assert_eq!(read(renamed.as_path()).expect("read"), "alpha");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn delete_reports_missing_files() {
        let root = temp_root("delete");
        let err = delete(root.join("ghost.md").as_path()).expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));

        fs::write(root.join("real.md"), "x").expect("seed");
        delete(root.join("real.md").as_path()).expect("delete");
        assert!(!root.join("real.md").exists());

        let _ = fs::remove_dir_all(root);
    }
}
