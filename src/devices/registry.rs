//! Device registry: ids to live connections

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncWrite};

use super::connection::Connection;
use super::transport::Connector;
use crate::plugins::{Outcome, PluginSet};
use crate::{Error, Result};

/// Display snapshot of a registered device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub id: u32,
    pub host: String,
    pub port: u16,
    pub connected_at: DateTime<Utc>,
}

struct Entry {
    connected_at: DateTime<Utc>,
    connection: Connection,
}

/// Registry of connected devices and the modules that can target them
///
/// Ids come from a counter that only moves forward, so an id is never handed
/// out twice in one session. Entries exist only for connected devices.
pub struct DeviceRegistry {
    entries: BTreeMap<u32, Entry>,
    next_id: u32,
    connector: Arc<dyn Connector>,
    plugins: PluginSet,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.entries.keys().collect::<Vec<_>>())
            .field("next_id", &self.next_id)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl DeviceRegistry {
    /// Create an empty registry dispatching to `plugins`
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, plugins: PluginSet) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            connector,
            plugins,
        }
    }

    /// Connect to `host:port` and register the device
    ///
    /// Returns the new id, or `None` if the connection failed; a failed
    /// connection is never registered.
    pub async fn add(&mut self, host: &str, port: u16) -> Option<u32> {
        let mut connection = Connection::new(host, port, Arc::clone(&self.connector));
        if !connection.connect().await {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                connected_at: Utc::now(),
                connection,
            },
        );

        tracing::info!(id, host, port, "device registered");
        Some(id)
    }

    /// Registered devices ordered by id
    #[must_use]
    pub fn list(&self) -> Vec<DeviceInfo> {
        self.entries
            .iter()
            .map(|(id, entry)| DeviceInfo {
                id: *id,
                host: entry.connection.host().to_string(),
                port: entry.connection.port(),
                connected_at: entry.connected_at,
            })
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Connection> {
        self.entries.get(&id).map(|entry| &entry.connection)
    }

    /// Disconnect and unregister a device
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownId`] if no device has this id
    pub async fn remove(&mut self, id: u32) -> Result<()> {
        let mut entry = self.entries.remove(&id).ok_or(Error::UnknownId(id))?;
        entry.connection.disconnect().await;
        tracing::info!(id, "device unregistered");
        Ok(())
    }

    /// Hand the operator's streams to a pass-through session with a device
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownId`] if no device has this id, or the
    /// session's own error
    pub async fn interact<R, W>(&mut self, id: u32, input: &mut R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + ?Sized,
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let entry = self.entries.get_mut(&id).ok_or(Error::UnknownId(id))?;
        let result = entry.connection.interact(input, output).await;
        self.prune(id);
        result
    }

    /// Run module `name` against device `id` with the operator's `args`
    ///
    /// Argument counts are left to the module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCapability`] if the module is not loaded,
    /// [`Error::UnknownId`] if no device has this id, or the module's error
    pub async fn dispatch(&mut self, name: &str, id: u32, args: &[String]) -> Result<Outcome> {
        if !self.plugins.contains(name) {
            return Err(Error::UnknownCapability(name.to_string()));
        }

        let entry = self.entries.get_mut(&id).ok_or(Error::UnknownId(id))?;
        let result = self.plugins.dispatch(name, &mut entry.connection, args).await;
        self.prune(id);
        result
    }

    /// Disconnect every device and empty the registry
    ///
    /// Each device is disconnected exactly once; a failure on one does not
    /// stop the others.
    pub async fn shutdown(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();

        for (id, mut entry) in entries {
            entry.connection.disconnect().await;
            tracing::debug!(id, "device released");
        }

        if count > 0 {
            tracing::info!(count, "all devices disconnected");
        }
    }

    /// Modules available for dispatch
    #[must_use]
    pub const fn capabilities(&self) -> &PluginSet {
        &self.plugins
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the entry for `id` if its connection was lost
    fn prune(&mut self, id: u32) {
        if self
            .entries
            .get(&id)
            .is_some_and(|entry| !entry.connection.is_connected())
        {
            self.entries.remove(&id);
            tracing::warn!(id, "device connection lost, unregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::devices::MemoryConnector;
    use crate::plugins::{Capability, PluginDescriptor};

    /// Reports the device it was bound to
    struct WhereAmI {
        descriptor: PluginDescriptor,
    }

    #[async_trait]
    impl Capability for WhereAmI {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        async fn run(&self, device: &mut Connection, argv: &[String]) -> Result<Outcome> {
            device.send_command(&argv.join(" ")).await?;
            Ok(Outcome::completed(format!("{}:{}", device.host(), device.port())))
        }
    }

    fn plugins() -> PluginSet {
        let mut set = PluginSet::new();
        set.insert(Arc::new(WhereAmI {
            descriptor: PluginDescriptor {
                name: "wifi".to_string(),
                category: "settings".to_string(),
                description: String::new(),
                usage: "wifi <on|off>".to_string(),
                min_args: 1,
                needs_root: false,
                authors: vec![],
            },
        }));
        set
    }

    fn registry(connector: &MemoryConnector) -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(connector.clone()), plugins())
    }

    #[tokio::test]
    async fn add_and_list() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);

        assert_eq!(registry.add("10.0.0.5", 5555).await, Some(0));
        assert_eq!(registry.add("10.0.0.6", 5556).await, Some(1));

        let devices = registry.list();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, 0);
        assert_eq!(devices[0].host, "10.0.0.5");
        assert_eq!(devices[1].port, 5556);
    }

    #[tokio::test]
    async fn failed_connect_is_not_registered() {
        let connector = MemoryConnector::new();
        connector.refuse("10.0.0.9");
        let mut registry = registry(&connector);

        assert_eq!(registry.add("10.0.0.9", 5555).await, None);
        assert!(registry.is_empty());
        assert_eq!(registry.add("10.0.0.5", 5555).await, Some(0));
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);
        let mut issued = HashSet::new();

        for round in 0..5u16 {
            let a = registry.add("10.0.0.1", 5555 + round).await.unwrap();
            let b = registry.add("10.0.0.2", 5555 + round).await.unwrap();
            assert!(issued.insert(a));
            assert!(issued.insert(b));
            registry.remove(a).await.unwrap();

            let live: Vec<u32> = registry.list().iter().map(|d| d.id).collect();
            let unique: HashSet<u32> = live.iter().copied().collect();
            assert_eq!(live.len(), unique.len());
        }

        assert_eq!(registry.len(), 5);
    }

    #[tokio::test]
    async fn remove_unknown_id() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);

        assert!(matches!(registry.remove(3).await, Err(Error::UnknownId(3))));
    }

    #[tokio::test]
    async fn remove_releases_transport() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);
        let id = registry.add("10.0.0.5", 5555).await.unwrap();

        registry.remove(id).await.unwrap();
        assert!(registry.is_empty());
        assert_eq!(connector.open_handles(), 0);
        assert!(matches!(registry.remove(id).await, Err(Error::UnknownId(_))));
    }

    #[tokio::test]
    async fn dispatch_binds_the_right_device() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);
        registry.add("10.0.0.5", 5555).await.unwrap();
        let id = registry.add("10.0.0.7", 6000).await.unwrap();

        let outcome = registry
            .dispatch("wifi", id, &["on".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::completed("10.0.0.7:6000"));

        let log = connector.log();
        assert_eq!(
            log.sent,
            vec![("10.0.0.7".to_string(), 6000, "wifi on".to_string())]
        );
    }

    #[tokio::test]
    async fn dispatch_unknown_references() {
        let connector = MemoryConnector::new();
        let mut registry = DeviceRegistry::new(Arc::new(connector.clone()), PluginSet::new());
        assert!(matches!(
            registry.dispatch("ghost", 0, &[]).await,
            Err(Error::UnknownCapability(name)) if name == "ghost"
        ));

        let mut registry = self::registry(&connector);
        assert!(matches!(
            registry.dispatch("wifi", 99, &[]).await,
            Err(Error::UnknownId(99))
        ));
    }

    #[tokio::test]
    async fn unknown_capability_checked_before_id() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);

        assert!(matches!(
            registry.dispatch("ghost", 99, &[]).await,
            Err(Error::UnknownCapability(_))
        ));
    }

    #[tokio::test]
    async fn lost_connection_is_unregistered() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);
        let id = registry.add("10.0.0.5", 5555).await.unwrap();
        connector.sever("10.0.0.5");

        let err = registry.dispatch("wifi", id, &[]).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(registry.get(id).is_none());
        assert_eq!(connector.open_handles(), 0);
    }

    #[tokio::test]
    async fn interact_unknown_id() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);

        let mut input: &[u8] = b"exit\n";
        let mut output = Vec::new();
        let err = registry.interact(4, &mut input, &mut output).await.unwrap_err();
        assert!(matches!(err, Error::UnknownId(4)));
    }

    #[tokio::test]
    async fn interact_keeps_device_registered() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);
        let id = registry.add("10.0.0.5", 5555).await.unwrap();

        let mut input: &[u8] = b"id\nexit\n";
        let mut output = Vec::new();
        registry.interact(id, &mut input, &mut output).await.unwrap();
        assert!(registry.get(id).is_some_and(Connection::is_connected));
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);
        for host in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            registry.add(host, 5555).await.unwrap();
        }
        assert_eq!(connector.open_handles(), 3);

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert_eq!(connector.open_handles(), 0);
        assert_eq!(connector.log().released, 3);
    }

    #[tokio::test]
    async fn shutdown_continues_past_failed_close() {
        let connector = MemoryConnector::new();
        connector.fail_close("10.0.0.2");
        let mut registry = registry(&connector);
        for host in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            registry.add(host, 5555).await.unwrap();
        }

        registry.shutdown().await;
        assert!(registry.is_empty());

        let log = connector.log();
        assert_eq!(log.released, 3);
        assert_eq!(log.failed_closes, 1);
    }

    #[tokio::test]
    async fn connected_at_is_stamped_on_add() {
        let connector = MemoryConnector::new();
        let mut registry = registry(&connector);

        let before = Utc::now();
        registry.add("10.0.0.5", 5555).await.unwrap();
        let after = Utc::now();

        let stamp = registry.list()[0].connected_at;
        assert!(before <= stamp && stamp <= after);
    }
}
