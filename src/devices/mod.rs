//! Remote device sessions
//!
//! A [`Connection`] is one session with a remote agent. The
//! [`DeviceRegistry`] owns every live connection under a small integer id and
//! routes module dispatches to them.

pub mod connection;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionState, DEFAULT_PORT, parse_address};
pub use registry::{DeviceInfo, DeviceRegistry};
pub use transport::{Connector, LineTransport, MemoryConnector, MemoryLog, TcpConnector, Transport};
