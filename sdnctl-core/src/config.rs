//! Server configuration
//!
//! Every field has a default, so an empty TOML file is a valid config.
//! Command-line flags are applied on top by the server binary.

use crate::audit::AuditConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,
    /// Bind port
    pub port: u16,
    /// Credential file
    pub credentials_path: PathBuf,
    /// Concurrent session cap, `0` for unbounded
    pub max_connections: usize,
    /// Longest accepted command line in bytes, unbounded when unset. An
    /// over-long line is answered with an `ERROR:` line, then the session closes.
    pub max_line_length: Option<usize>,
    /// Audit trail settings
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: crate::DEFAULT_PORT,
            credentials_path: PathBuf::from(crate::DEFAULT_CREDENTIALS_FILE),
            max_connections: crate::MAX_CONCURRENT_CONNECTIONS,
            max_line_length: None,
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&text)?)
    }

    /// `address:port` as given to the listener, IPv6 literals bracketed
    pub fn bind_address(&self) -> String {
        match self.address.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]:{}", self.address, self.port),
            Err(_) => format!("{}:{}", self.address, self.port),
        }
    }
}
