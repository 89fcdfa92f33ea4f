//! Ghost - operator console for remote device administration
//!
//! This library provides the core of the Ghost console:
//! - Device sessions and the registry that owns them
//! - Capability modules discovered from manifests at startup
//! - The line-oriented operator console and an HTTP front-end
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │          Console (REPL)   │   HTTP front-end         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Device Registry                      │
//! │   ids → Connections   │   PluginSet (modules)        │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Transport (remote agent)                │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod console;
pub mod devices;
pub mod error;
pub mod plugins;

pub use config::Config;
pub use console::{Console, ConsoleSettings};
pub use devices::{Connection, ConnectionState, DeviceInfo, DeviceRegistry};
pub use error::{Error, Result};
pub use plugins::{Capability, Catalog, Outcome, PluginDescriptor, PluginSet};
