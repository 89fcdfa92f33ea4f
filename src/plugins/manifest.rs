//! Plugin manifest format (`<module>.json`)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata every capability module declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Capability name, used as the dispatch key
    pub name: String,
    /// Grouping shown in listings (e.g. "settings")
    #[serde(default)]
    pub category: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Usage line shown when arguments are insufficient
    pub usage: String,
    /// Minimum number of operator arguments
    #[serde(default)]
    pub min_args: usize,
    /// Whether the capability needs root on the device
    #[serde(default)]
    pub needs_root: bool,
    /// Module authors, in credit order
    #[serde(default)]
    pub authors: Vec<String>,
}

impl PluginDescriptor {
    /// Check the descriptor is usable as a dispatch target
    ///
    /// # Errors
    ///
    /// Returns a reason string if the name or usage is unusable
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("descriptor name is empty".to_string());
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(format!("descriptor name '{}' contains whitespace", self.name));
        }
        if self.usage.trim().is_empty() {
            return Err(format!("descriptor '{}' has no usage line", self.name));
        }
        Ok(())
    }
}

/// A plugin module as declared on disk
///
/// The descriptor fields sit at the top level next to `entry`, which names
/// the compiled-in implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Catalog entry implementing this module (e.g. "svc-toggle")
    pub entry: String,
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,
    /// Entry-specific settings
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_manifest() {
        let json = r#"{
            "entry": "svc-toggle",
            "name": "wifi",
            "category": "settings",
            "description": "Set device wifi service state.",
            "usage": "wifi <on|off>",
            "min_args": 1,
            "needs_root": false,
            "authors": ["jman (enty8080) - module developer"],
            "options": {"service": "wifi"}
        }"#;

        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.entry, "svc-toggle");
        assert_eq!(manifest.descriptor.name, "wifi");
        assert_eq!(manifest.descriptor.min_args, 1);
        assert_eq!(manifest.descriptor.authors.len(), 1);
        assert_eq!(manifest.options.get("service").map(String::as_str), Some("wifi"));
    }

    #[test]
    fn deserialize_minimal_manifest() {
        let json = r#"{"entry": "shell", "name": "sh", "usage": "sh <command>"}"#;

        let manifest: PluginManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.descriptor.category.is_empty());
        assert!(!manifest.descriptor.needs_root);
        assert!(manifest.options.is_empty());
    }

    #[test]
    fn missing_entry_is_rejected() {
        let json = r#"{"name": "wifi", "usage": "wifi <on|off>"}"#;
        assert!(serde_json::from_str::<PluginManifest>(json).is_err());
    }

    #[test]
    fn validate_rejects_bad_names() {
        let mut descriptor = PluginDescriptor {
            name: String::new(),
            category: String::new(),
            description: String::new(),
            usage: "x".to_string(),
            min_args: 0,
            needs_root: false,
            authors: vec![],
        };
        assert!(descriptor.validate().is_err());

        descriptor.name = "two words".to_string();
        assert!(descriptor.validate().is_err());

        descriptor.name = "wifi".to_string();
        assert!(descriptor.validate().is_ok());

        descriptor.usage = "  ".to_string();
        assert!(descriptor.validate().is_err());
    }
}
