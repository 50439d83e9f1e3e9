//! Uploaded document storage under the media root.
//!
//! Files get a random name so concurrent uploads never collide and no
//! locking is needed.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const DOCUMENT_DIR: &str = "document";

/// `document/<uuid>.<ext>`, keeping only the original extension.
pub fn uuid_filename(original: &str) -> String {
    let ext = original
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("{DOCUMENT_DIR}/{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase())
}

pub fn ensure_dirs(media_root: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(media_root.join(DOCUMENT_DIR))
}

/// Resolves a stored relative path, refusing anything that escapes the root.
pub fn resolve(media_root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() || relative.contains("..") || relative.starts_with('/') {
        return None;
    }
    Some(media_root.join(relative))
}

pub async fn save(media_root: &Path, original_name: &str, content: &[u8]) -> std::io::Result<String> {
    let relative = uuid_filename(original_name);
    let path = media_root.join(&relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content).await?;
    Ok(relative)
}

/// Missing files are not an error.
pub async fn remove(media_root: &Path, relative: &str) -> std::io::Result<()> {
    let Some(path) = resolve(media_root, relative) else {
        return Ok(());
    };
    match tokio::fs::remove_file(&path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
