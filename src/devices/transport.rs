//! Transport seam between a connection and the remote agent
//!
//! A [`Connector`] opens a [`Transport`] to `host:port`. The transport is a
//! newline-delimited text channel: every command is written as one line and
//! the peer answers with exactly one reply line, which may be empty. Reply
//! bytes that are not UTF-8 are passed through lossily rather than failing the
//! exchange.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::{Error, Result};

/// An established channel to one remote agent
#[async_trait]
pub trait Transport: Send {
    /// Write one command line and read the peer's reply line
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the write or read fails or the peer
    /// closed the channel
    async fn exchange(&mut self, line: &str) -> Result<String>;

    /// Close the channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the shutdown fails
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to remote agents
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a transport to `host:port`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the peer cannot be reached
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Transport>>;
}

/// Connector for plain TCP agents
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Transport>> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Transport(format!("failed to connect to {host}:{port}: {e}")))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(host, port, error = %e, "failed to set TCP_NODELAY");
        }

        tracing::debug!(host, port, "tcp transport established");
        Ok(Box::new(LineTransport::new(stream)))
    }
}

/// Newline-delimited text transport over any async byte stream
#[derive(Debug)]
pub struct LineTransport<S> {
    stream: BufReader<S>,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }
}

#[async_trait]
impl<S> Transport for LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn exchange(&mut self, line: &str) -> Result<String> {
        if line.contains(['\n', '\r']) {
            return Err(Error::Transport("command contains a line break".to_string()));
        }

        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push('\n');

        let writer = self.stream.get_mut();
        writer.write_all(frame.as_bytes()).await.map_err(io_failure)?;
        writer.flush().await.map_err(io_failure)?;

        let mut reply = Vec::new();
        let read = self
            .stream
            .read_until(b'\n', &mut reply)
            .await
            .map_err(io_failure)?;
        if read == 0 {
            return Err(Error::Transport("connection closed by peer".to_string()));
        }

        Ok(String::from_utf8_lossy(&reply)
            .trim_end_matches(['\r', '\n'])
            .to_string())
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.get_mut().shutdown().await.map_err(io_failure)
    }
}

fn io_failure(e: std::io::Error) -> Error {
    Error::Transport(e.to_string())
}

/// Everything a [`MemoryConnector`] has observed
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    /// `(host, port)` of every transport opened, in order
    pub opened: Vec<(String, u16)>,
    /// `(host, port, command)` of every exchanged line, in order
    pub sent: Vec<(String, u16, String)>,
    /// Number of transports released, whether or not the close succeeded
    pub released: usize,
    /// Number of closes that reported a failure
    pub failed_closes: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    log: MemoryLog,
    refused: HashSet<String>,
    severed: HashSet<String>,
    failing_close: HashSet<String>,
}

/// In-process loopback connector
///
/// Every opened transport echoes each command back as its reply. Hosts can be
/// marked unreachable, severed, or failing on close to exercise failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    /// Create a connector where every host is reachable
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future connection attempts to `host` fail
    pub fn refuse(&self, host: &str) {
        self.with_state(|s| s.refused.insert(host.to_string()));
    }

    /// Make every exchange with `host` fail from now on
    pub fn sever(&self, host: &str) {
        self.with_state(|s| s.severed.insert(host.to_string()));
    }

    /// Make closing any transport to `host` report a failure
    pub fn fail_close(&self, host: &str) {
        self.with_state(|s| s.failing_close.insert(host.to_string()));
    }

    /// Snapshot of the observed activity
    #[must_use]
    pub fn log(&self) -> MemoryLog {
        self.with_state(|s| s.log.clone())
    }

    /// Transports opened and not yet released
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.with_state(|s| s.log.opened.len() - s.log.released)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn Transport>> {
        self.with_state(|s| {
            if s.refused.contains(host) {
                return Err(Error::Transport(format!("connection refused by {host}:{port}")));
            }
            s.log.opened.push((host.to_string(), port));
            Ok(())
        })?;

        Ok(Box::new(MemoryTransport {
            host: host.to_string(),
            port,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryTransport {
    host: String,
    port: u16,
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn exchange(&mut self, line: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.severed.contains(&self.host) {
            return Err(Error::Transport("connection reset by peer".to_string()));
        }
        state
            .log
            .sent
            .push((self.host.clone(), self.port, line.to_string()));
        Ok(line.to_string())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.log.released += 1;
        if state.failing_close.contains(&self.host) {
            state.log.failed_closes += 1;
            return Err(Error::Transport("broken pipe on close".to_string()));
        }
        Ok(())
    }
}
