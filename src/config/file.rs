//! TOML configuration file loading
//!
//! Supports `~/.config/ghost/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GhostConfigFile {
    /// Directory holding module manifests
    pub plugin_dir: Option<PathBuf>,

    /// Port used when `connect` is given a bare host
    pub default_port: Option<u16>,

    /// Console prompt
    pub prompt: Option<String>,

    /// HTTP front-end configuration
    #[serde(default)]
    pub api: ApiFileConfig,
}

/// HTTP front-end configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// `host[:port]` of the device the front-end drives
    pub device: Option<String>,
}

/// Load a TOML config file
///
/// Returns `GhostConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
#[must_use]
pub fn load_config_file(path: &Path) -> GhostConfigFile {
    if !path.exists() {
        return GhostConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GhostConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GhostConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/ghost/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("ghost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_port = 5037

[api]
device = "192.168.1.20"
"#,
        )
        .unwrap();

        let file = load_config_file(&path);
        assert_eq!(file.default_port, Some(5037));
        assert!(file.plugin_dir.is_none());
        assert_eq!(file.api.device.as_deref(), Some("192.168.1.20"));
        assert!(file.api.port.is_none());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_port = \"many\"").unwrap();

        let file = load_config_file(&path);
        assert!(file.default_port.is_none());
    }

    #[test]
    fn missing_file_is_default() {
        let file = load_config_file(Path::new("/nonexistent/ghost/config.toml"));
        assert!(file.prompt.is_none());
    }
}
