use anyhow::Context;
use clap::Parser;
use sdnctl_core::{CredentialStore, Listener, LocalFiles, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// sdnctl Server - remote-control controller
#[derive(Parser)]
#[command(name = "sdnctl-server")]
#[command(about = "sdnctl controller serving files and relaying packets")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Credential file
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Concurrent session cap, 0 for unbounded
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Config file values with command-line flags applied on top
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(host) = &self.host {
            config.address = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(credentials) = &self.credentials {
            config.credentials_path = credentials.clone();
        }
        if let Some(max_connections) = self.max_connections {
            config.max_connections = max_connections;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = serve(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn serve(cli: Cli) -> anyhow::Result<()> {
    let config = cli.server_config()?;

    let store = CredentialStore::load(&config.credentials_path)
        .with_context(|| format!("loading credentials from {}", config.credentials_path.display()))?;
    info!("credentials loaded from {}", config.credentials_path.display());

    let listener = Listener::bind(&config, Arc::new(store), Arc::new(LocalFiles))
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;

    listener
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("sdnctl server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "sdnctl-server",
            "--host",
            "127.0.0.1",
            "--port",
            "7000",
            "--credentials",
            "/etc/sdnctl/auth.conf",
            "--max-connections",
            "0",
        ])
        .unwrap();
        let config = cli.server_config().unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:7000");
        assert_eq!(config.credentials_path, PathBuf::from("/etc/sdnctl/auth.conf"));
        assert_eq!(config.max_connections, 0);
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::try_parse_from(["sdnctl-server"]).unwrap();
        let config = cli.server_config().unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.credentials_path, PathBuf::from("auth.conf"));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["sdnctl-server", "--config", "/nonexistent/sdnctl.toml"]).unwrap();
        assert!(cli.server_config().is_err());
    }
}
