//! Line-oriented operator console
//!
//! Reads one command at a time from the operator, runs it against the
//! [`DeviceRegistry`] to completion, and writes the result. A failing command
//! is reported and the loop carries on; the registry is always shut down
//! before [`Console::run`] returns.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::devices::{DeviceRegistry, parse_address};
use crate::plugins::Outcome;
use crate::{Error, Result};

const HELP: &[(&str, &str)] = &[
    ("clear", "Clear terminal window."),
    ("connect <host>:[port]", "Connect device."),
    ("devices", "Show connected devices."),
    ("disconnect <id>", "Disconnect device."),
    ("exit", "Exit Ghost Framework."),
    ("help", "Show available commands."),
    ("interact <id>", "Interact with device."),
    ("modules", "Show loaded modules."),
    ("run_module <name> <id> [args...]", "Run a loaded module against a device."),
];

/// Whether the loop should keep reading commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Console presentation settings
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub prompt: String,
    pub default_port: u16,
}

/// Operator console over an input line source and an output sink
pub struct Console<R, W> {
    registry: DeviceRegistry,
    input: R,
    output: W,
    settings: ConsoleSettings,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub const fn new(registry: DeviceRegistry, input: R, output: W, settings: ConsoleSettings) -> Self {
        Self {
            registry,
            input,
            output,
            settings,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Give back the output sink
    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until `exit`, end of input, or Ctrl-C at the prompt
    ///
    /// Ctrl-C is only listened for while waiting at the prompt. One pressed
    /// while a command runs does not reach the command and is discarded once
    /// it finishes, so it never ends the session after the fact.
    ///
    /// # Errors
    ///
    /// Returns error if the operator streams fail
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(|| async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `exit`, end of input, or an interrupt at the prompt
    ///
    /// `interrupt` is called at every prompt for a fresh future; the session
    /// ends if that future resolves before the operator enters a line.
    ///
    /// # Errors
    ///
    /// Returns error if the operator streams fail
    pub async fn run_until<F, Fut>(&mut self, interrupt: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let result = self.read_loop(interrupt).await;
        self.registry.shutdown().await;
        result
    }

    async fn read_loop<F, Fut>(&mut self, mut interrupt: F) -> Result<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        loop {
            self.output.write_all(self.settings.prompt.as_bytes()).await?;
            self.output.flush().await?;

            let mut line = String::new();
            let read = tokio::select! {
                read = self.input.read_line(&mut line) => read?,
                () = interrupt() => {
                    tracing::debug!("console interrupted");
                    0
                }
            };

            if read == 0 {
                self.say("").await?;
                return Ok(());
            }

            match self.execute(&line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(e) => {
                    tracing::debug!(error = %e, "command failed");
                    self.say(&format!("An error occurred: {e}!")).await?;
                }
            }
        }
    }

    /// Run a single command line
    ///
    /// # Errors
    ///
    /// Returns any error not already reported to the operator
    pub async fn execute(&mut self, line: &str) -> Result<Flow> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = words.collect();

        match command {
            "connect" => self.connect(&args).await?,
            "devices" => self.devices().await?,
            "disconnect" => self.disconnect(&args).await?,
            "interact" => self.interact(&args).await?,
            "run_module" => self.run_module(&args).await?,
            "modules" => self.modules().await?,
            "help" => self.help().await?,
            "clear" => self.output.write_all(b"\x1b[2J\x1b[H").await?,
            "exit" => return Ok(Flow::Exit),
            other => self.say(&format!("Unrecognized command: {other}!")).await?,
        }

        Ok(Flow::Continue)
    }

    async fn connect(&mut self, args: &[&str]) -> Result<()> {
        let Some(address) = args.first() else {
            return self.say("connect <host>:[port]").await;
        };

        let (host, port) = match parse_address(address, self.settings.default_port) {
            Ok(parts) => parts,
            Err(Error::InvalidAddress(reason)) => {
                return self.say(&format!("Invalid address: {reason}!")).await;
            }
            Err(e) => return Err(e),
        };

        match self.registry.add(&host, port).await {
            Some(id) => {
                self.say("").await?;
                self.say("Type devices to list all connected devices.").await?;
                self.say(&format!("Type interact {id} to interact with this device."))
                    .await
            }
            None => self.say(&format!("Failed to connect to {host}:{port}!")).await,
        }
    }

    async fn devices(&mut self) -> Result<()> {
        let devices = self.registry.list();
        if devices.is_empty() {
            return self.say("No devices connected.").await;
        }

        let rows: Vec<Vec<String>> = devices
            .iter()
            .map(|d| {
                vec![
                    d.id.to_string(),
                    d.host.clone(),
                    d.port.to_string(),
                    d.connected_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                ]
            })
            .collect();
        let table = render_table(
            "Connected Devices",
            &["ID", "Host", "Port", "Connected"],
            &rows,
        );
        self.say(&table).await
    }

    async fn disconnect(&mut self, args: &[&str]) -> Result<()> {
        let Some(raw) = args.first() else {
            return self.say("disconnect <id>").await;
        };

        let Ok(id) = raw.parse::<u32>() else {
            return self.say("Invalid device ID!").await;
        };

        match self.registry.remove(id).await {
            Ok(()) => Ok(()),
            Err(Error::UnknownId(_)) => self.say("Invalid device ID!").await,
            Err(e) => Err(e),
        }
    }

    async fn interact(&mut self, args: &[&str]) -> Result<()> {
        let Some(raw) = args.first() else {
            return self.say("interact <id>").await;
        };

        let Some(id) = raw.parse::<u32>().ok().filter(|id| self.registry.get(*id).is_some()) else {
            return self.say("Invalid device ID!").await;
        };

        self.say(&format!("Interacting with device {id}...")).await?;
        self.registry
            .interact(id, &mut self.input, &mut self.output)
            .await
    }

    async fn run_module(&mut self, args: &[&str]) -> Result<()> {
        const USAGE: &str = "run_module <name> <id> [args...]";

        let Some(name) = args.first() else {
            return self.say(USAGE).await;
        };
        if !self.registry.capabilities().contains(name) {
            return self.say(&format!("Module '{name}' not found!")).await;
        }
        let Some(raw) = args.get(1) else {
            return self.say(USAGE).await;
        };
        let Ok(id) = raw.parse::<u32>() else {
            return self.say("Invalid device ID!").await;
        };

        let module_args: Vec<String> = args[2..].iter().map(ToString::to_string).collect();
        match self.registry.dispatch(name, id, &module_args).await {
            Ok(Outcome::Completed { output }) if output.is_empty() => Ok(()),
            Ok(Outcome::Completed { output }) => self.say(&output).await,
            Ok(Outcome::Usage(usage)) => self.say(&format!("Usage: {usage}")).await,
            Err(Error::UnknownId(_)) => self.say("Invalid device ID!").await,
            Err(Error::UnknownCapability(name)) => {
                self.say(&format!("Module '{name}' not found!")).await
            }
            Err(e) => Err(e),
        }
    }

    async fn modules(&mut self) -> Result<()> {
        let plugins = self.registry.capabilities();
        if plugins.is_empty() {
            return self.say("No modules loaded.").await;
        }

        let rows: Vec<Vec<String>> = plugins
            .descriptors()
            .iter()
            .map(|d| {
                vec![
                    d.name.clone(),
                    d.category.clone(),
                    (if d.needs_root { "yes" } else { "no" }).to_string(),
                    d.description.clone(),
                ]
            })
            .collect();
        let table = render_table(
            "Loaded Modules",
            &["Name", "Category", "Root", "Description"],
            &rows,
        );
        self.say(&table).await
    }

    async fn help(&mut self) -> Result<()> {
        let rows: Vec<Vec<String>> = HELP
            .iter()
            .map(|(command, description)| vec![(*command).to_string(), (*description).to_string()])
            .collect();
        let table = render_table("Core Commands", &["Command", "Description"], &rows);
        self.say(&table).await
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        Ok(())
    }
}

/// Short startup banner
#[must_use]
pub fn banner() -> String {
    format!(
        "\n--=[ Ghost Framework {}\n--=[ Type help for available commands\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Render rows as a left-aligned text table with a title
fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

    let mut out = format!("\n{title}:\n\n");
    out.push_str(&table_row(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(&table_row(rule.iter().map(String::as_str), &widths));
    out.push('\n');
    for row in rows {
        out.push_str(&table_row(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}

fn table_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .collect::<Vec<_>>()
        .join("    ")
        .trim_end()
        .to_string()
}
