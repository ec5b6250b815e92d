//! HRV command-line client
//!
//! Usage:
//!   hrv --host 192.168.1.151 --port 3001 --listen -t 60
//!   hrv --host 192.168.1.151 --port 3001 --send --key MF --data 2
//!   hrv --config config/hrv.toml --listen

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use hrv_client::{ClientConfig, ConnectionState, DataKey, HrvClient};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hrv")]
#[command(about = "Talk to an HRV ventilation unit over its websocket protocol")]
#[command(version)]
struct Args {
    /// Host name or IP address of the unit
    #[arg(long)]
    host: Option<String>,

    /// Websocket port of the unit
    #[arg(long)]
    port: Option<u16>,

    /// TOML configuration file; --host/--port take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send one command and exit
    #[arg(long, requires_all = ["key", "data"], conflicts_with = "listen")]
    send: bool,

    /// Wire key of the command, e.g. MF
    #[arg(long)]
    key: Option<DataKey>,

    /// Command value
    #[arg(long)]
    data: Option<String>,

    /// Print the collected data as JSON on exit
    #[arg(long)]
    listen: bool,

    /// Seconds to listen before exiting (until Ctrl-C if unset)
    #[arg(short = 't', long = "timeout")]
    timeout: Option<u64>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, action = ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = load_config(&args)?;
    let client = HrvClient::new(config).context("Invalid client configuration")?;

    client.add_state_handler(|state: ConnectionState| {
        info!("Connection state: {}", state);
        anyhow::Ok(())
    });

    client
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", client.config().address()))?;

    let outcome = run(&args, &client).await;
    client.close().await;

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}

async fn run(args: &Args, client: &HrvClient) -> Result<()> {
    if args.send {
        let (Some(key), Some(data)) = (args.key, args.data.as_deref()) else {
            bail!("--send requires --key and --data");
        };
        client
            .send_command(key, data)
            .await
            .with_context(|| format!("Failed to send {}={}", key, data))?;
        info!("Sent {}:{}", key, data);
        return Ok(());
    }

    match args.timeout {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to install Ctrl-C handler")?;
            info!("Received shutdown signal");
        }
    }

    if args.listen {
        let json = serde_json::to_string_pretty(&client.data())
            .context("Failed to serialize collected data")?;
        println!("{}", json);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_toml_with_env_overrides(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let mut config = ClientConfig::default();
            config.host.clear();
            config.apply_env_overrides()?;
            config
        }
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if config.host.is_empty() {
        bail!("--host is required (or set host in --config / HRV_HOST)");
    }
    Ok(config)
}

fn default_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_logging(args: &Args) {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(args.verbose)));

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
