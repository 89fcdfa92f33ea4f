//! Contract every capability module implements

use async_trait::async_trait;

use super::manifest::PluginDescriptor;
use crate::Result;
use crate::devices::Connection;

/// Result of running a capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The capability ran; `output` is whatever the device replied
    Completed { output: String },
    /// The arguments were insufficient or invalid; carries the usage line
    Usage(String),
}

impl Outcome {
    #[must_use]
    pub fn completed(output: impl Into<String>) -> Self {
        Self::Completed {
            output: output.into(),
        }
    }

    #[must_use]
    pub fn usage(descriptor: &PluginDescriptor) -> Self {
        Self::Usage(descriptor.usage.clone())
    }
}

/// A remote-control capability
///
/// Instances are long-lived and shared across dispatches. The target device
/// is lent to [`Capability::run`] for the duration of one call.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Metadata for listing and dispatch
    fn descriptor(&self) -> &PluginDescriptor;

    /// Run against `device`
    ///
    /// `argv[0]` is the capability name and the rest are the operator's
    /// arguments. Checking them against `min_args` is up to the capability.
    ///
    /// # Errors
    ///
    /// Returns an error if talking to the device fails
    async fn run(&self, device: &mut Connection, argv: &[String]) -> Result<Outcome>;
}
