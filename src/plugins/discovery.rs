//! Plugin discovery - scan a directory for module manifests

use std::path::{Path, PathBuf};

use super::manifest::PluginManifest;
use crate::{Error, Result};

/// Manifest extension
pub const MANIFEST_EXTENSION: &str = "json";

/// Packaging index that lives next to the manifests and is never a module
pub const INDEX_FILE: &str = "index.json";

/// List candidate manifest files in `dir`, sorted by file name
///
/// Scan order decides which module wins a name collision, so it is fixed
/// here rather than left to the filesystem.
///
/// # Errors
///
/// Returns error if `dir` cannot be read
pub fn candidate_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_candidate(path))
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn is_candidate(path: &Path) -> bool {
    let is_manifest = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION));
    let is_index = path.file_name().is_some_and(|name| name == INDEX_FILE);
    is_manifest && !is_index
}

/// Load and parse a single manifest file
///
/// # Errors
///
/// Returns [`Error::PluginLoad`] if the file cannot be read or parsed
pub fn load_manifest(path: &Path) -> Result<PluginManifest> {
    let content =
        std::fs::read_to_string(path).map_err(|e| Error::plugin_load(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| Error::plugin_load(path, e.to_string()))
}

/// Default plugin directory: `~/.config/ghost/modules`
#[must_use]
pub fn default_plugin_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".ghost/modules"),
        |d| d.config_dir().join("ghost").join("modules"),
    )
}
