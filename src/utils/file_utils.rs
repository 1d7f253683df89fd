use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants;

pub fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    let ext = ext.to_ascii_lowercase();
    allowed.iter().any(|allowed_ext| *allowed_ext == ext.as_str())
}

pub fn is_video_file(path: &Path) -> bool {
    has_allowed_extension(path, constants::VIDEO_EXTENSIONS)
}

/// Canonicalizes a media path given on the command line. Fails when it does
/// not exist or is not a regular file.
pub fn resolve_media_path(input: &str) -> Result<PathBuf> {
    let path = fs::canonicalize(input).with_context(|| format!("Video not found: {}", input))?;
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }
    Ok(path)
}
