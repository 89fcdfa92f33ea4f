//! Shared test utilities

use std::sync::Arc;

use ghost::devices::{DeviceRegistry, MemoryConnector};
use ghost::plugins::{PluginSet, builtin, discover};
use ghost::ConsoleSettings;

/// Load the bundled modules through a real plugin directory
#[must_use]
pub fn bundled_plugins() -> PluginSet {
    let dir = tempfile::tempdir().expect("failed to create plugin dir");
    builtin::install_bundled(dir.path(), false).expect("failed to install modules");
    discover(dir.path(), &builtin::catalog())
}

/// Create a registry over an in-memory connector with the bundled modules
#[must_use]
pub fn registry(connector: &MemoryConnector) -> DeviceRegistry {
    DeviceRegistry::new(Arc::new(connector.clone()), bundled_plugins())
}

/// Console settings with an empty prompt so output only holds replies
#[must_use]
pub fn settings() -> ConsoleSettings {
    ConsoleSettings {
        prompt: String::new(),
        default_port: 5555,
    }
}

/// Commands sent through the connector, in order
#[must_use]
pub fn sent_commands(connector: &MemoryConnector) -> Vec<String> {
    connector
        .log()
        .sent
        .into_iter()
        .map(|(_, _, command)| command)
        .collect()
}
