use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use virtual_serial_bridge::bridge::Side;
use virtual_serial_bridge::config::{get_default_config_path, Config, ConfigLoader};
use virtual_serial_bridge::service::BridgeService;
use virtual_serial_bridge::state::BridgeState;
use virtual_serial_bridge::{logging, stdio};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "vsb",
    version,
    about = "Virtual serial bridge: paired device/commander endpoints for hardware-free agent tests.",
    long_about = "Emulates serial-line-connected embedded agents. Each slot pairs a device endpoint with a commander endpoint; bytes written on one side are delivered to the other, with echo suppression and modem-line emulation."
)]
struct Args {
    /// Configuration file (overrides VSB_CONFIG and the standard locations).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "virtual_serial_bridge=trace".
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve JSON-lines commands on stdin/stdout (default).
    Serve,
    /// Print the resolved configuration, node names and driver listing.
    Info,
    /// Write a configuration file with every default filled in.
    InitConfig {
        /// Destination (defaults to the platform config directory).
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<ConfigLoader, Box<dyn std::error::Error>> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader)
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path
        .or_else(get_default_config_path)
        .unwrap_or_else(|| PathBuf::from("vsb.toml"));
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }

    let loader = ConfigLoader {
        config_path: None,
        config: Config::default(),
    };
    loader.save_to(&path)?;
    println!("{}", path.display());
    Ok(())
}

fn print_info(loader: &ConfigLoader) {
    let config = loader.config();
    match &loader.config_path {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: built-in defaults"),
    }

    let state = BridgeState::new(config);
    for slot in 0..config.bridge.slot_count {
        println!(
            "slot {}: {} <-> {}",
            slot,
            state.readers().node_name(slot, Side::Device),
            state.readers().node_name(slot, Side::Commander)
        );
    }
    print!("{}", state.pool().listing());
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Args {
        config,
        log_level,
        command,
    } = Args::parse();

    match command.unwrap_or(Command::Serve) {
        Command::InitConfig { path, force } => init_config(path, force),
        Command::Info => {
            let loader = load_config(config.as_deref())?;
            logging::init(&loader.config().logging, log_level.as_deref());
            print_info(&loader);
            Ok(())
        }
        Command::Serve => {
            let loader = load_config(config.as_deref())?;
            logging::init(&loader.config().logging, log_level.as_deref());
            let config = loader.into_config();
            info!(
                "virtual serial bridge v{}: {} slots, history {} bytes",
                env!("CARGO_PKG_VERSION"),
                config.bridge.slot_count,
                config.bridge.history_capacity
            );
            let service = BridgeService::new(BridgeState::shared(&config));
            stdio::run_stdio_interface(service).await?;
            Ok(())
        }
    }
}
