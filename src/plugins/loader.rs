//! Plugin loader: instantiate and validate discovered modules

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use super::capability::{Capability, Outcome};
use super::discovery::{candidate_files, load_manifest};
use super::manifest::{PluginDescriptor, PluginManifest};
use crate::devices::Connection;
use crate::{Error, Result};

/// Entry-specific options from a manifest
pub type Options = BTreeMap<String, String>;

/// Constructor for a compiled-in capability
pub type Factory = fn(PluginDescriptor, &Options) -> Result<Arc<dyn Capability>>;

/// Compiled-in entry points that manifests can name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    factories: HashMap<String, Factory>,
}

impl Catalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `entry`
    #[must_use]
    pub fn with(mut self, entry: &str, factory: Factory) -> Self {
        self.factories.insert(entry.to_string(), factory);
        self
    }

    #[must_use]
    pub fn get(&self, entry: &str) -> Option<Factory> {
        self.factories.get(entry).copied()
    }

    /// Registered entry names, sorted
    #[must_use]
    pub fn entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        entries.sort_unstable();
        entries
    }
}

/// Loaded capabilities keyed by name
#[derive(Clone, Default)]
pub struct PluginSet {
    plugins: BTreeMap<String, Arc<dyn Capability>>,
}

impl std::fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.plugins.keys()).finish()
    }
}

impl PluginSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a capability, returning the one it replaced
    pub fn insert(&mut self, plugin: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        let name = plugin.descriptor().name.clone();
        self.plugins.insert(name, plugin)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.plugins.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Capability names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Descriptors, sorted by name
    #[must_use]
    pub fn descriptors(&self) -> Vec<&PluginDescriptor> {
        self.plugins.values().map(|p| p.descriptor()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run capability `name` against `device` with the operator's `args`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCapability`] if `name` is not loaded, or
    /// whatever the capability itself fails with
    pub async fn dispatch(
        &self,
        name: &str,
        device: &mut Connection,
        args: &[String],
    ) -> Result<Outcome> {
        let plugin = self
            .plugins
            .get(name)
            .ok_or_else(|| Error::UnknownCapability(name.to_string()))?;

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(name.to_string());
        argv.extend_from_slice(args);

        tracing::debug!(
            module = name,
            host = device.host(),
            port = device.port(),
            argc = argv.len(),
            "dispatching module"
        );
        plugin.run(device, &argv).await
    }
}

/// Discover, instantiate and validate every module manifest in `dir`
///
/// Bad modules are logged and skipped. When two modules declare the same
/// name, the later one in file-name order wins.
#[must_use]
pub fn discover(dir: &Path, catalog: &Catalog) -> PluginSet {
    let mut set = PluginSet::new();

    let files = match candidate_files(dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "failed to read plugin directory");
            return set;
        }
    };

    for path in files {
        match instantiate(&path, catalog) {
            Ok(plugin) => {
                let name = plugin.descriptor().name.clone();
                tracing::debug!(module = %name, path = %path.display(), "loaded module");
                if set.insert(plugin).is_some() {
                    tracing::warn!(
                        module = %name,
                        path = %path.display(),
                        "module name already loaded, replacing earlier module"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping module");
            }
        }
    }

    tracing::info!(path = %dir.display(), count = set.len(), "modules loaded");
    set
}

fn instantiate(path: &Path, catalog: &Catalog) -> Result<Arc<dyn Capability>> {
    let PluginManifest {
        entry,
        descriptor,
        options,
    } = load_manifest(path)?;

    let factory = catalog
        .get(&entry)
        .ok_or_else(|| Error::plugin_load(path, format!("unknown entry point '{entry}'")))?;

    let plugin = factory(descriptor, &options).map_err(|e| Error::plugin_load(path, e.to_string()))?;

    plugin
        .descriptor()
        .validate()
        .map_err(|reason| Error::plugin_load(path, reason))?;

    Ok(plugin)
}
