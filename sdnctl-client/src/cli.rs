//! sdnctl CLI implementation

use crate::client::{ClientConfig, SdnClient};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// sdnctl client - fetch files and relay packets through a controller
#[derive(Parser)]
#[command(name = "sdnctl-client")]
#[command(about = "sdnctl client for file retrieval and packet relay")]
#[command(version)]
pub struct Cli {
    /// Server address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = sdnctl_core::DEFAULT_PORT)]
    pub port: u16,

    /// Shared secret sent with AUTH
    #[arg(long)]
    pub password: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = sdnctl_core::CONNECT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a file from the controller
    Fetch {
        /// Remote file path
        #[arg(long, value_name = "REMOTE")]
        remote: String,

        /// Local output path, defaults to the remote file name
        #[arg(long, value_name = "LOCAL")]
        out: Option<PathBuf>,
    },

    /// Send one packet and print the echo
    Packet {
        /// Packet content
        #[arg(value_name = "CONTENT")]
        content: String,
    },
}

/// Run CLI application
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let client = SdnClient::new(ClientConfig {
        server_address: cli.host,
        server_port: cli.port,
        connection_timeout: cli.timeout,
    });

    match cli.command {
        Commands::Fetch { remote, out } => {
            let password = cli
                .password
                .context("--password is required for fetch")?;
            let (path, bytes) = client
                .download_file(&password, &remote, out.as_deref())
                .await
                .with_context(|| format!("fetching {}", remote))?;
            println!("Wrote {} bytes to {}", bytes, path.display());
        }

        Commands::Packet { content } => {
            let echoed = client.relay_packet(&content).await.context("relaying packet")?;
            println!("{}", echoed);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
