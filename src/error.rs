//! Error types for the Ghost console

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Ghost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Ghost console
#[derive(Debug, Error)]
pub enum Error {
    /// Connect, send or interact failure at the network layer
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation needs an established transport
    #[error("device is not connected")]
    NotConnected,

    /// No registry entry with this identifier
    #[error("unknown device id: {0}")]
    UnknownId(u32),

    /// No loaded plugin with this capability name
    #[error("unknown module: {0}")]
    UnknownCapability(String),

    /// A plugin module failed instantiation or contract validation
    #[error("failed to load plugin {}: {reason}", .path.display())]
    PluginLoad { path: PathBuf, reason: String },

    /// Operator supplied an unusable `host[:port]`
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a plugin load error for the manifest at `path`
    #[must_use]
    pub fn plugin_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PluginLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
