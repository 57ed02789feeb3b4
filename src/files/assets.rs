use std::{
    fs,
    path::{Path, PathBuf},
};

use image::GenericImageView;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Asset folder kept next to the host document.
pub const ASSET_DIR_NAME: &str = ".images";

/// Loopback port of the external static asset server. The core only owns
/// the URL construction rule, not the server.
pub const ASSET_SERVER_PORT: u16 = 3550;

/// Hex digits of the content hash used for asset filenames.
const ASSET_NAME_LEN: usize = 16;

/// The two representations of a stored image: the relative path that goes
/// into Markdown and the transient URL the live preview loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub storage_path: String,
    pub display_url: String,
    pub absolute_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

pub fn display_url_for(name: &str) -> String {
    format!("http://localhost:{ASSET_SERVER_PORT}/images/{name}")
}

/// Copy a locally picked image into the document's asset folder.
///
/// Requires a saved host document because the folder is colocated with it.
/// The filename is a prefix of the SHA-256 of the source bytes plus the
/// source extension, so it never exposes the original name and re-inserting
/// the same image lands on the same file. The source is copied, not moved.
pub fn resolve(document_path: Option<&Path>, source_image: &Path) -> Result<ImageAsset> {
    let document_path = document_path.ok_or(AppError::NoActiveDocument)?;
    let document_dir = document_path
        .parent()
        .ok_or_else(|| AppError::NotFound(document_path.to_path_buf()))?;

    let loaded = load_supported_image(source_image)?;
    let ext = source_image
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string());

    let digest = Sha256::digest(loaded.bytes.as_slice());
    let mut hash = String::with_capacity(ASSET_NAME_LEN);
    for byte in digest.iter().take(ASSET_NAME_LEN / 2) {
        hash.push_str(format!("{byte:02x}").as_str());
    }
    let name = format!("{hash}.{ext}");

    let asset_dir = document_dir.join(ASSET_DIR_NAME);
    fs::create_dir_all(asset_dir.as_path())
        .map_err(|e| AppError::from_io(e, asset_dir.as_path()))?;

    let absolute_path = asset_dir.join(name.as_str());
    if !absolute_path.exists() {
        fs::write(absolute_path.as_path(), loaded.bytes.as_slice())
            .map_err(|e| AppError::from_io(e, absolute_path.as_path()))?;
    }
    info!(
        source = %source_image.display(),
        asset = %absolute_path.display(),
        mime = loaded.mime,
        width = loaded.width,
        height = loaded.height,
        "image asset stored"
    );

    Ok(ImageAsset {
        storage_path: format!("{ASSET_DIR_NAME}/{name}"),
        display_url: display_url_for(name.as_str()),
        absolute_path,
    })
}

/// Remove assets no longer referenced by the document. Runs only from the
/// explicit clean-up command; saves and renames never trigger it.
///
/// `referenced` holds the storage-relative paths currently present in the
/// document (`.images/<name>`). Returns the paths that were removed.
pub fn clean_unused_assets(document_path: &Path, referenced: &[String]) -> Result<Vec<PathBuf>> {
    let Some(document_dir) = document_path.parent() else {
        return Ok(Vec::new());
    };
    let asset_dir = document_dir.join(ASSET_DIR_NAME);
    if !asset_dir.exists() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(asset_dir.as_path()).map_err(|e| AppError::from_io(e, asset_dir.as_path()))? {
        let entry = entry.map_err(AppError::Io)?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let storage_path = format!("{ASSET_DIR_NAME}/{name}");
        if referenced.iter().any(|r| r == storage_path.as_str()) {
            continue;
        }
        fs::remove_file(path.as_path()).map_err(|e| AppError::from_io(e, path.as_path()))?;
        debug!(asset = %path.display(), "removed unused asset");
        removed.push(path);
    }
    Ok(removed)
}

/// Read and sanity-check an image before it is copied into the asset
/// folder: known extension, decodable bytes, and usable dimensions.
pub fn load_supported_image(path: &Path) -> Result<LoadedImage> {
    let ext = path
        .extension()
        .and_then(|v| v.to_str())
        .map(|v| v.to_ascii_lowercase())
        .ok_or_else(|| AppError::UnsupportedImage("missing file extension".to_string()))?;

    let mime = mime_for_extension(ext.as_str())
        .ok_or_else(|| AppError::UnsupportedImage(format!("unsupported image format: {ext}")))?;
    let bytes = fs::read(path).map_err(|e| AppError::from_io(e, path))?;

    let (width, height) = if ext == "svg" {
        parse_svg_dimensions(bytes.as_slice()).unwrap_or((512, 512))
    } else {
        image::load_from_memory(bytes.as_slice())
            .map_err(|e| AppError::UnsupportedImage(format!("failed to decode image: {e}")))?
            .dimensions()
    };

    Ok(LoadedImage {
        bytes,
        mime: mime.to_string(),
        width,
        height,
    })
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

fn parse_svg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let source = String::from_utf8_lossy(bytes);
    let root = Regex::new(r"(?is)<svg\b([^>]*)>").ok()?;
    let captures = root.captures(source.as_ref())?;
    let attrs = captures.get(1)?.as_str();

    let width = parse_svg_attr_length(attrs, "width");
    let height = parse_svg_attr_length(attrs, "height");
    if let (Some(w), Some(h)) = (width, height) {
        return Some((w.max(1), h.max(1)));
    }

    let view_box = parse_svg_view_box(attrs)?;
    Some((view_box.0.max(1), view_box.1.max(1)))
}

fn parse_svg_attr_length(attrs: &str, name: &str) -> Option<u32> {
    let pattern = format!(r#"(?i)\b{}\s*=\s*["']([^"']+)["']"#, regex::escape(name));
    let regex = Regex::new(pattern.as_str()).ok()?;
    let value = regex.captures(attrs)?.get(1)?.as_str();
    parse_svg_numeric(value)
}

fn parse_svg_view_box(attrs: &str) -> Option<(u32, u32)> {
    let regex = Regex::new(r#"(?i)\bviewBox\s*=\s*["']([^"']+)["']"#).ok()?;
    let value = regex.captures(attrs)?.get(1)?.as_str();
    let parts = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    if parts.len() != 4 {
        return None;
    }
    let width = parts[2].parse::<f32>().ok()?;
    let height = parts[3].parse::<f32>().ok()?;
    if !width.is_finite() || !height.is_finite() {
        return None;
    }
    Some((width.round() as u32, height.round() as u32))
}

fn parse_svg_numeric(value: &str) -> Option<u32> {
    let mut out = String::new();
    for ch in value.trim().chars() {
        if ch.is_ascii_digit() || ch == '.' {
            out.push(ch);
        } else {
            break;
        }
    }
    let parsed = out.parse::<f32>().ok()?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return None;
    }
    Some(parsed.round() as u32)
}
