use sdnctl_core::{
    fetch_to_file, ClientDriver, CredentialRecord, CredentialStore, Error, Listener, LocalFiles,
    ServerConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

async fn start_server() -> SocketAddr {
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
    addr
}

struct RawClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn call(&mut self, line: &str) -> Option<String> {
        self.writer.write_all(format!("{}\n", line).as_bytes()).await.ok()?;
        self.recv().await
    }

    async fn recv(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches('\n').to_string()),
        }
    }
}

#[tokio::test]
async fn fetch_binary_file() {
    let addr = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let remote = dir.path().join("data.bin");
    std::fs::write(&remote, [0x00, 0xFF, 0x10]).unwrap();
    let remote = remote.to_str().unwrap().to_string();

    let mut client = RawClient::connect(addr).await;
    assert_eq!(client.call("HELLO").await.as_deref(), Some("Handshake complete"));
    assert_eq!(client.call("AUTH secret").await.as_deref(), Some("AUTH_OK"));
    assert_eq!(
        client.call(&format!("GET_FILE {}", remote)).await.as_deref(),
        Some("FILE_DATA AP8Q")
    );

    let out = dir.path().join("copy.bin");
    let stream = TcpStream::connect(addr).await.unwrap();
    let (written_to, len) = fetch_to_file(stream, "secret", &remote, Some(&out))
        .await
        .unwrap();
    assert_eq!(written_to, out);
    assert_eq!(len, 3);
    assert_eq!(std::fs::read(&out).unwrap(), vec![0x00, 0xFF, 0x10]);
}

#[tokio::test]
async fn missing_file_keeps_session() {
    let addr = start_server().await;
    let mut client = RawClient::connect(addr).await;
    client.call("HELLO").await;
    client.call("AUTH secret").await;

    let reply = client.call("GET_FILE ./no/such/file").await.unwrap();
    assert!(reply.starts_with("ERROR: Could not read file:"), "{}", reply);
    assert_eq!(client.call("PACKET_IN ok").await.as_deref(), Some("PACKET_OUT ok"));
}

#[tokio::test]
async fn wrong_password_has_no_lockout() {
    let addr = start_server().await;
    let mut client = RawClient::connect(addr).await;
    client.call("HELLO").await;

    for _ in 0..3 {
        assert_eq!(client.call("AUTH wrongpassword").await.as_deref(), Some("AUTH_FAIL"));
    }
    assert_eq!(client.call("AUTH secret").await.as_deref(), Some("AUTH_OK"));
}

#[tokio::test]
async fn get_file_requires_authentication() {
    let addr = start_server().await;
    let mut client = RawClient::connect(addr).await;
    client.call("HELLO").await;
    assert_eq!(
        client.call("GET_FILE ./data.bin").await.as_deref(),
        Some("ERROR: Not authenticated")
    );

    let stream = TcpStream::connect(addr).await.unwrap();
    let result = ClientDriver::fetch(stream, "wrongpassword", "./data.bin").await;
    assert!(matches!(result, Err(Error::AuthFailure(_))));
}

#[tokio::test]
async fn bad_handshake_closes_connection() {
    let addr = start_server().await;
    let mut client = RawClient::connect(addr).await;
    assert_eq!(client.call("HELO").await.as_deref(), Some("ERROR"));
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn concurrent_clients_are_independent() {
    let addr = start_server().await;

    let mut authed = RawClient::connect(addr).await;
    authed.call("HELLO").await;
    assert_eq!(authed.call("AUTH secret").await.as_deref(), Some("AUTH_OK"));

    let mut other = RawClient::connect(addr).await;
    other.call("HELLO").await;
    assert_eq!(
        other.call("GET_FILE ./data.bin").await.as_deref(),
        Some("ERROR: Not authenticated")
    );

    let relays = (0..8).map(|i| {
        tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            ClientDriver::relay(stream, &format!("packet {}", i)).await.unwrap()
        })
    });
    for (i, relay) in relays.collect::<Vec<_>>().into_iter().enumerate() {
        assert_eq!(relay.await.unwrap(), format!("packet {}", i));
    }

    assert_eq!(authed.call("PACKET_IN done").await.as_deref(), Some("PACKET_OUT done"));
}
