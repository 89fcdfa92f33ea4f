//! Capability modules
//!
//! Modules are declared by JSON manifests in a plugin directory. Each
//! manifest names a compiled-in entry point from a [`Catalog`] and carries
//! the module's descriptor. Manifests are validated once, at load time.

pub mod builtin;
pub mod capability;
pub mod discovery;
pub mod loader;
pub mod manifest;

pub use capability::{Capability, Outcome};
pub use discovery::default_plugin_dir;
pub use loader::{Catalog, Factory, Options, PluginSet, discover};
pub use manifest::{PluginDescriptor, PluginManifest};
