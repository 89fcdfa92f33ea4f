use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use ghost::api::ApiServer;
use ghost::console::{Console, ConsoleSettings, banner};
use ghost::devices::{Connection, DeviceRegistry, TcpConnector, parse_address};
use ghost::plugins::{builtin, discover};
use ghost::Config;

/// Ghost - operator console for remote device administration
#[derive(Parser)]
#[command(name = "ghost", version, about)]
struct Cli {
    /// Directory holding module manifests
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.config/ghost/config.toml)
    #[arg(short, long, env = "GHOST_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive console (default)
    Console,
    /// Serve modules over HTTP against one device
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Device as host[:port]
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List the modules found in the plugin directory
    Modules,
    /// Install the bundled module manifests into the plugin directory
    InitModules {
        /// Overwrite existing manifests
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,ghost=info",
        1 => "info,ghost=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("fatal: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    };

    // An interrupted console leaves a stdin read parked on a blocking thread
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.plugin_dir {
        config.plugin_dir = dir;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Console) {
        Command::Console => run_console(config).await,
        Command::Serve { port, device } => {
            if let Some(port) = port {
                config.api.port = port;
            }
            if let Some(device) = device {
                config.api.device = device;
            }
            serve(config).await
        }
        Command::Modules => list_modules(&config),
        Command::InitModules { force } => init_modules(&config, force),
    }
}

async fn run_console(config: Config) -> anyhow::Result<()> {
    let plugins = discover(&config.plugin_dir, &builtin::catalog());
    let registry = DeviceRegistry::new(Arc::new(TcpConnector), plugins);

    let mut stdout = tokio::io::stdout();
    stdout.write_all(banner().as_bytes()).await?;

    let mut console = Console::new(
        registry,
        BufReader::new(tokio::io::stdin()),
        stdout,
        ConsoleSettings {
            prompt: config.prompt,
            default_port: config.default_port,
        },
    );
    console.run().await?;

    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (host, port) = parse_address(&config.api.device, config.default_port)?;
    let plugins = discover(&config.plugin_dir, &builtin::catalog());

    let mut device = Connection::new(host, port, Arc::new(TcpConnector));
    if !device.connect().await {
        tracing::warn!(
            device = %config.api.device,
            "device unreachable, connecting again on the first request"
        );
    }

    ApiServer::new(config.api.port, plugins, device)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down API server");
        })
        .await?;

    Ok(())
}

fn list_modules(config: &Config) -> anyhow::Result<()> {
    let plugins = discover(&config.plugin_dir, &builtin::catalog());
    if plugins.is_empty() {
        println!("No modules found in {}", config.plugin_dir.display());
        println!("Run `ghost init-modules` to install the bundled modules.");
        return Ok(());
    }

    for descriptor in plugins.descriptors() {
        println!("{:<12} {:<10} {}", descriptor.name, descriptor.category, descriptor.description);
        println!("{:<12} usage: {}", "", descriptor.usage);
    }

    Ok(())
}

fn init_modules(config: &Config, force: bool) -> anyhow::Result<()> {
    let written = builtin::install_bundled(&config.plugin_dir, force)?;
    if written.is_empty() {
        println!("Modules already installed in {}", config.plugin_dir.display());
    }
    for path in written {
        println!("Installed {}", path.display());
    }

    Ok(())
}
