use clap::{Parser, Subcommand};
use fwall::capture::{run_tap, AfPacketSocket};
use fwall::config::{self, Config};
use fwall::control::{run_repl, ControlClient, ControlServer, DEFAULT_SOCKET_PATH};
use fwall::dataplane::Engine;
use fwall::telemetry::{init_logging, MetricsRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "fwall")]
#[command(about = "Rule-based packet filter with a line-oriented control channel")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the filter daemon
    Run {
        /// Path to fwall.toml; built-in defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Interactive client for a running daemon
    Client {
        /// Control socket of the daemon
        #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
        socket: PathBuf,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate fwall.toml without starting the daemon
    Validate {
        /// Path to fwall.toml
        #[arg(short, long, default_value = "fwall.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run { config }) => cmd_run(config.as_deref()),
        Some(Commands::Client { socket }) => cmd_client(&socket),
        Some(Commands::Config {
            action: ConfigAction::Validate { config },
        }) => cmd_config_validate(&config),
        None => cmd_run(None),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(config_path: Option<&Path>) -> Result<(), String> {
    use tokio::runtime::Runtime;

    let cfg = match config_path {
        Some(path) => {
            config::load(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))?
        }
        None => Config::default(),
    };

    // RUST_LOG still takes priority over the config file
    init_logging(Some(&cfg.logging));

    let validation = config::validate(&cfg);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    for err in &validation.errors {
        error!("{}", err);
    }
    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }

    let metrics = Arc::new(MetricsRegistry::new());
    let engine = Arc::new(
        config::build_engine(&cfg, metrics.clone())
            .map_err(|e| format!("Failed to install startup rules: {}", e))?,
    );
    info!("Engine started with {} rules", engine.len());

    let rt = Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;

    let outcome = rt.block_on(serve(&cfg, engine.clone()));

    for (name, value) in metrics.export() {
        info!("{} = {}", name, value);
    }
    engine.clear();

    outcome.map_err(|e| e.to_string())
}

/// Serve the control channel and the packet tap until a signal arrives
async fn serve(cfg: &Config, engine: Arc<Engine>) -> fwall::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;

    let server = ControlServer::bind(
        &cfg.control.socket_path,
        engine.clone(),
        cfg.control.max_command_len,
    )?
    .with_idle_timeout(Duration::from_secs(cfg.control.idle_timeout_secs));

    let tap = async {
        match cfg.capture.interface.as_deref() {
            Some(name) => {
                info!("Tapping interface {}...", name);
                let mut socket = AfPacketSocket::bind(name)?;
                run_tap(&mut socket, &engine).await
            }
            None => std::future::pending::<fwall::Result<()>>().await,
        }
    };

    tokio::select! {
        result = server.run() => result,
        result = tap => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
        _ = terminate.recv() => {
            info!("Terminated, shutting down");
            Ok(())
        }
    }
}

fn cmd_client(socket: &Path) -> Result<(), String> {
    let client = ControlClient::new(socket);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    run_repl(&client, stdin.lock(), stdout.lock()).map_err(|e| e.to_string())
}

fn cmd_config_validate(config_path: &Path) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());

    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        Err("Validation failed".to_string())
    } else {
        println!("[INFO] Configuration is valid");
        Ok(())
    }
}
