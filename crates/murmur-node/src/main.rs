//! Murmur Node entry point.
//!
//! Starts an overlay node with configuration from a TOML file, overridden by
//! command line flags.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use murmur_node::{keys, run_until, Settings};

/// Murmur overlay node
#[derive(Parser, Debug)]
#[command(name = "murmur-node", version, about = "Murmur overlay node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "murmur.toml")]
    config: PathBuf,

    /// IP address to bind to. Binds all interfaces when unset.
    #[arg(long)]
    address: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u32>,

    /// Address or host name of a peer to bootstrap from.
    #[arg(long)]
    remote_address: Option<String>,

    /// Port of the bootstrap peer.
    #[arg(long)]
    remote_port: Option<u32>,

    /// Seconds between peer discovery rounds.
    #[arg(long, visible_alias = "di", allow_negative_numbers = true)]
    discovery_interval: Option<i64>,

    /// Load the node identity from a hex private key file.
    #[arg(short = 'l', long = "load-private-key")]
    load_private_key: Option<PathBuf>,

    /// Write a fresh private key to this file and exit.
    #[arg(long = "make-private-key", visible_alias = "mk")]
    make_private_key: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,

    /// Do not send the gossip heartbeat.
    #[arg(long)]
    no_heartbeat: bool,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

impl Args {
    /// Apply command line overrides on top of file settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(address) = &self.address {
            settings.network.address = Some(address.clone());
        }
        if let Some(port) = self.port {
            settings.network.port = port;
        }
        if let Some(address) = &self.remote_address {
            settings.bootstrap.address = Some(address.clone());
        }
        if let Some(port) = self.remote_port {
            settings.bootstrap.port = port;
        }
        if let Some(interval) = self.discovery_interval {
            settings.discovery.interval_secs = interval;
        }
        if let Some(path) = &self.load_private_key {
            settings.identity.private_key_path = Some(path.clone());
        }
        if self.debug {
            settings.logging.debug = true;
        }
        if self.no_heartbeat {
            settings.gossip.enabled = false;
        }
    }
}

fn init_tracing(debug: bool, format: &str) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Handle --init flag
    if args.init {
        Settings::default().save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    let mut settings = Settings::load(&args.config)?;
    args.apply(&mut settings);

    init_tracing(settings.logging.debug, &settings.logging.format);
    tracing::debug!("logger started in debug mode");

    if let Some(path) = &args.make_private_key {
        let keypair = keys::generate_key_file(path)?;
        println!(
            "wrote private key for {} to {}",
            keypair.public().to_peer_id(),
            path.display()
        );
        return Ok(());
    }

    let config = settings.validate()?;
    tracing::info!("Murmur node v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received shutdown signal"),
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
    };
    run_until(config, shutdown).await?;

    tracing::info!("Exiting.");
    Ok(())
}
