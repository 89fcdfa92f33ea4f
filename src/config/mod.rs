//! Configuration management for the Ghost console
//!
//! Sources, lowest precedence first: built-in defaults, the TOML file, then
//! `GHOST_*` environment variables. Command-line flags are applied on top by
//! the binary.

pub mod file;

use std::path::{Path, PathBuf};

use crate::devices::DEFAULT_PORT;
use crate::plugins::default_plugin_dir;
use crate::{Error, Result};

use self::file::GhostConfigFile;

/// Default console prompt
pub const DEFAULT_PROMPT: &str = "(ghost)> ";

/// Default HTTP front-end port
pub const DEFAULT_API_PORT: u16 = 5000;

/// Ghost console configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding module manifests
    pub plugin_dir: PathBuf,

    /// Port used when `connect` is given a bare host
    pub default_port: u16,

    /// Console prompt
    pub prompt: String,

    /// HTTP front-end configuration
    pub api: ApiServerConfig,
}

/// HTTP front-end configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// `host[:port]` of the device the front-end drives
    pub device: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_dir: default_plugin_dir(),
            default_port: DEFAULT_PORT,
            prompt: DEFAULT_PROMPT.to_string(),
            api: ApiServerConfig {
                port: DEFAULT_API_PORT,
                device: "localhost".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from the file at `path` (or the standard location)
    /// and the process environment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an environment variable holds an
    /// unusable value
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => file::load_config_file(path),
            None => file::config_file_path()
                .map(|path| file::load_config_file(&path))
                .unwrap_or_default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Layer a parsed file and an environment lookup over the defaults
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an environment variable holds an
    /// unusable value
    pub fn from_sources(
        file: GhostConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = file.plugin_dir {
            config.plugin_dir = dir;
        }
        if let Some(port) = file.default_port {
            config.default_port = port;
        }
        if let Some(prompt) = file.prompt {
            config.prompt = prompt;
        }
        if let Some(port) = file.api.port {
            config.api.port = port;
        }
        if let Some(device) = file.api.device {
            config.api.device = device;
        }

        if let Some(dir) = env("GHOST_PLUGIN_DIR") {
            config.plugin_dir = PathBuf::from(dir);
        }
        if let Some(port) = env("GHOST_DEFAULT_PORT") {
            config.default_port = parse_port("GHOST_DEFAULT_PORT", &port)?;
        }
        if let Some(prompt) = env("GHOST_PROMPT") {
            config.prompt = prompt;
        }
        if let Some(port) = env("GHOST_API_PORT") {
            config.api.port = parse_port("GHOST_API_PORT", &port)?;
        }
        if let Some(device) = env("GHOST_API_DEVICE") {
            config.api.device = device;
        }

        Ok(config)
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::Config(format!("{key} must be a port number, got '{value}'")))
}
