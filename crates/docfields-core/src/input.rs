//! Input discovery: recursive scan of a directory for documents.

use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use tracing::{debug, trace};

use crate::error::{ConfigError, DocfieldsError, Result};

/// Directories created by macOS archive tools; never descended into.
const JUNK_DIRS: [&str; 1] = ["__MACOSX"];

/// Files left behind by desktop file managers.
const JUNK_FILES: [&str; 2] = [".DS_Store", "Thumbs.db"];

/// Prefix of AppleDouble resource-fork shadows (`._name`).
const SHADOW_PREFIX: &str = "._";

/// Kind of an accepted input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

impl InputKind {
    /// Classify by extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(InputKind::Pdf),
            "png" | "jpg" | "jpeg" => Some(InputKind::Image),
            _ => None,
        }
    }
}

/// Recursively collect accepted input files under `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::InputDir(dir.to_path_buf()).into());
    }

    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    let entries = glob(&pattern).map_err(|e| {
        DocfieldsError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            e.to_string(),
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| InputKind::from_path(p).is_some())
        .filter(|p| !is_junk(dir, p))
        .collect();
    files.sort();

    debug!("Discovered {} input files under {:?}", files.len(), dir);
    Ok(files)
}

fn is_junk(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    if relative
        .components()
        .any(|c| JUNK_DIRS.iter().any(|j| c.as_os_str() == *j))
    {
        trace!("Skipping {:?} inside archive metadata", path);
        return true;
    }

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if JUNK_FILES.contains(&name) {
        return true;
    }

    // `._x.pdf` shadows `x.pdf` when both exist.
    if let Some(original) = name.strip_prefix(SHADOW_PREFIX) {
        if path.with_file_name(original).exists() {
            trace!("Skipping resource-fork shadow {:?}", path);
            return true;
        }
    }
    false
}
