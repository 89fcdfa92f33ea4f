//! One remote-agent session

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::transport::{Connector, Transport};
use crate::{Error, Result};

/// Port used when the operator does not give one
pub const DEFAULT_PORT: u16 = 5555;

/// Operator line that leaves an interactive session
pub const INTERACT_EXIT: &str = "exit";

/// Split an operator `host[:port]` into its parts
///
/// IPv6 literals are accepted bare (`fe80::1`) or bracketed with a port
/// (`[fe80::1]:5555`).
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if the host is empty, a bracket is
/// unbalanced, or the port is not a non-zero integer
pub fn parse_address(address: &str, default_port: u16) -> Result<(String, u16)> {
    let address = address.trim();
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::InvalidAddress("unclosed '['".to_string()))?;
        if tail.is_empty() {
            (host, default_port)
        } else {
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| Error::InvalidAddress(format!("unexpected '{tail}'")))?;
            (host, parse_port(port)?)
        }
    } else {
        match address.rsplit_once(':') {
            // More than one colon without brackets is a bare IPv6 literal
            Some((host, _)) if host.contains(':') => (address, default_port),
            Some((host, port)) => (host, parse_port(port)?),
            None => (address, default_port),
        }
    };

    if host.is_empty() {
        return Err(Error::InvalidAddress("missing host".to_string()));
    }
    Ok((host.to_string(), port))
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::InvalidAddress(format!("bad port '{port}'")))
}

/// Connection state, derived from whether a transport is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// A stateful handle to one remote agent
///
/// The transport handle is present exactly when the connection is
/// [`ConnectionState::Connected`].
pub struct Connection {
    host: String,
    port: u16,
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a disconnected session for `host:port`
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, connector: Arc<dyn Connector>) -> Self {
        Self {
            host: host.into(),
            port,
            connector,
            transport: None,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        if self.transport.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Establish the transport
    ///
    /// Returns whether the connection is now established. Failures are
    /// logged and leave the connection disconnected.
    pub async fn connect(&mut self) -> bool {
        if self.transport.is_some() {
            tracing::warn!(host = %self.host, port = self.port, "connect called on a connected device");
            return true;
        }

        match self.connector.open(&self.host, self.port).await {
            Ok(transport) => {
                tracing::info!(host = %self.host, port = self.port, "device connected");
                self.transport = Some(transport);
                true
            }
            Err(e) => {
                tracing::warn!(host = %self.host, port = self.port, error = %e, "device connection failed");
                false
            }
        }
    }

    /// Send one command and return the peer's reply
    ///
    /// A transport failure releases the handle, leaving the connection
    /// disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if disconnected, or
    /// [`Error::Transport`] if the exchange fails
    pub async fn send_command(&mut self, text: &str) -> Result<String> {
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        tracing::debug!(host = %self.host, port = self.port, command = text, "sending command");

        match transport.exchange(text).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.drop_transport(&e).await;
                Err(e)
            }
        }
    }

    /// Hand the operator's input and output to a pass-through session
    ///
    /// Each line read from `input` is sent to the peer and the reply written
    /// to `output`, until the operator enters [`INTERACT_EXIT`] or input ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if disconnected, [`Error::Transport`]
    /// if the peer fails mid-session (the handle is then released), or
    /// [`Error::Io`] if the operator streams fail
    pub async fn interact<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + ?Sized,
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        if self.transport.is_none() {
            return Err(Error::NotConnected);
        }

        tracing::debug!(host = %self.host, port = self.port, "interactive session started");
        let prompt = format!("{}:{}$ ", self.host, self.port);

        loop {
            output.write_all(prompt.as_bytes()).await?;
            output.flush().await?;

            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                output.write_all(b"\n").await?;
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == INTERACT_EXIT {
                break;
            }

            let reply = self.send_command(line).await?;
            if !reply.is_empty() {
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
        }

        output.flush().await?;
        tracing::debug!(host = %self.host, port = self.port, "interactive session ended");
        Ok(())
    }

    /// Release the transport
    ///
    /// No-op when already disconnected. A failure to close the transport is
    /// logged; the handle is released either way.
    pub async fn disconnect(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };

        if let Err(e) = transport.close().await {
            tracing::warn!(host = %self.host, port = self.port, error = %e, "failed to close transport cleanly");
        }
        tracing::info!(host = %self.host, port = self.port, "device disconnected");
    }

    async fn drop_transport(&mut self, cause: &Error) {
        tracing::warn!(host = %self.host, port = self.port, error = %cause, "transport failed, dropping connection");
        self.disconnect().await;
    }
}
