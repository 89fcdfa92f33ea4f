//! Compiled-in capabilities and their bundled manifests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::capability::{Capability, Outcome};
use super::loader::{Catalog, Options};
use super::manifest::PluginDescriptor;
use crate::devices::Connection;
use crate::{Error, Result};

/// Entry toggling an Android service through `svc`
pub const SVC_TOGGLE: &str = "svc-toggle";

/// Entry running a raw shell command
pub const SHELL: &str = "shell";

/// Manifests shipped with the console, as `(file name, contents)`
pub const BUNDLED: &[(&str, &str)] = &[
    ("bluetooth.json", include_str!("../../modules/bluetooth.json")),
    ("shell.json", include_str!("../../modules/shell.json")),
    ("wifi.json", include_str!("../../modules/wifi.json")),
];

/// Catalog of every compiled-in entry point
#[must_use]
pub fn catalog() -> Catalog {
    Catalog::new()
        .with(SVC_TOGGLE, service_toggle)
        .with(SHELL, shell)
}

/// Write the bundled manifests into `dir`
///
/// Existing files are kept unless `force` is set. Returns the files written.
///
/// # Errors
///
/// Returns error if the directory or a file cannot be written
pub fn install_bundled(dir: &Path, force: bool) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (file, contents) in BUNDLED {
        let path = dir.join(file);
        if path.exists() && !force {
            tracing::debug!(path = %path.display(), "module manifest exists, keeping it");
            continue;
        }
        std::fs::write(&path, contents)?;
        tracing::info!(path = %path.display(), "installed module manifest");
        written.push(path);
    }

    Ok(written)
}

struct ServiceToggle {
    descriptor: PluginDescriptor,
    service: String,
}

fn service_toggle(descriptor: PluginDescriptor, options: &Options) -> Result<Arc<dyn Capability>> {
    let service = options
        .get("service")
        .filter(|s| !s.is_empty() && !s.contains(char::is_whitespace))
        .ok_or_else(|| Error::Config("svc-toggle needs a single-word 'service' option".to_string()))?;

    Ok(Arc::new(ServiceToggle {
        descriptor,
        service: service.clone(),
    }))
}

#[async_trait]
impl Capability for ServiceToggle {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn run(&self, device: &mut Connection, argv: &[String]) -> Result<Outcome> {
        let action = match argv.get(1).map(String::as_str) {
            Some("on") => "enable",
            Some("off") => "disable",
            _ => return Ok(Outcome::usage(&self.descriptor)),
        };

        let reply = device
            .send_command(&format!("svc {} {action}", self.service))
            .await?;
        Ok(Outcome::completed(reply))
    }
}

struct Shell {
    descriptor: PluginDescriptor,
}

#[allow(clippy::unnecessary_wraps)]
fn shell(descriptor: PluginDescriptor, _: &Options) -> Result<Arc<dyn Capability>> {
    Ok(Arc::new(Shell { descriptor }))
}

#[async_trait]
impl Capability for Shell {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn run(&self, device: &mut Connection, argv: &[String]) -> Result<Outcome> {
        let args = argv.get(1..).unwrap_or_default();
        if args.is_empty() || args.len() < self.descriptor.min_args {
            return Ok(Outcome::usage(&self.descriptor));
        }

        let reply = device.send_command(&args.join(" ")).await?;
        Ok(Outcome::completed(reply))
    }
}
