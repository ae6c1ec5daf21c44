//! sdnctl client implementation

use sdnctl_core::{fetch_to_file, ClientDriver, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address
    pub server_address: String,
    /// Server port
    pub server_port: u16,
    /// Connect timeout in seconds
    pub connection_timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "localhost".to_string(),
            server_port: sdnctl_core::DEFAULT_PORT,
            connection_timeout: sdnctl_core::CONNECT_TIMEOUT_SECS,
        }
    }
}

/// sdnctl client
///
/// Every operation opens its own connection and closes it when done.
pub struct SdnClient {
    config: ClientConfig,
}

impl SdnClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Open a TCP connection to the configured server
    pub async fn connect(&self) -> Result<TcpStream> {
        let target = format!("{}:{}", self.config.server_address, self.config.server_port);
        debug!("connecting to {}", target);

        let timeout = Duration::from_secs(self.config.connection_timeout);
        let address = (self.config.server_address.as_str(), self.config.server_port);
        match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::Transport(format!("connect to {}: {}", target, e))),
            Err(_) => Err(Error::Transport(format!(
                "connect to {} timed out after {}s",
                target, self.config.connection_timeout
            ))),
        }
    }

    /// Download `remote_path` and write it locally.
    ///
    /// Returns where the file was written and how many bytes it holds.
    pub async fn download_file(
        &self,
        password: &str,
        remote_path: &str,
        local_path: Option<&Path>,
    ) -> Result<(PathBuf, usize)> {
        let stream = self.connect().await?;
        fetch_to_file(stream, password, remote_path, local_path).await
    }

    /// Send one packet and return what the server echoed
    pub async fn relay_packet(&self, content: &str) -> Result<String> {
        let stream = self.connect().await?;
        ClientDriver::relay(stream, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdnctl_core::{CredentialRecord, CredentialStore, Listener, LocalFiles, ServerConfig};
    use std::sync::Arc;

    async fn server() -> ClientConfig {
        let config = ServerConfig {
            address: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let store = CredentialStore::new(CredentialRecord::derive("s1", "secret").unwrap());
        let listener = Listener::bind(&config, Arc::new(store), Arc::new(LocalFiles))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());

        ClientConfig {
            server_address: addr.ip().to_string(),
            server_port: addr.port(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_address, "localhost");
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.connection_timeout, 30);
    }

    #[tokio::test]
    async fn test_download_file() {
        let client = SdnClient::new(server().await);
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("flows.json");
        std::fs::write(&remote, b"{\"flows\":[]}").unwrap();
        let local = dir.path().join("local.json");

        let (path, len) = client
            .download_file("secret", remote.to_str().unwrap(), Some(&local))
            .await
            .unwrap();
        assert_eq!(path, local);
        assert_eq!(len, 12);
        assert_eq!(std::fs::read(&local).unwrap(), b"{\"flows\":[]}");
    }

    #[tokio::test]
    async fn test_relay_packet() {
        let client = SdnClient::new(server().await);
        assert_eq!(client.relay_packet("arp who-has").await.unwrap(), "arp who-has");
    }

    #[tokio::test]
    async fn test_connect_ipv6_literal() {
        let listener = match tokio::net::TcpListener::bind("[::1]:0").await {
            Ok(listener) => listener,
            // Host without IPv6 loopback
            Err(_) => return,
        };
        let port = listener.local_addr().unwrap().port();
        let client = SdnClient::new(ClientConfig {
            server_address: "::1".to_string(),
            server_port: port,
            ..Default::default()
        });
        assert!(client.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let mut config = server().await;
        // Bind and drop to get a port with nothing listening
        let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        config.server_port = unused.local_addr().unwrap().port();
        drop(unused);

        let result = SdnClient::new(config).relay_packet("x").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
