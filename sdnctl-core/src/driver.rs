//! Client side of the protocol
//!
//! [`ClientDriver`] speaks the same line protocol as a session: greeting,
//! credential, then requests. Any reply other than the expected one aborts
//! the operation with a descriptive error.

use crate::codec::{self, LineStream};
use crate::error::{Error, Result};
use crate::protocol::{Command, Response};
use futures::SinkExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Drives one connection from the client side
pub struct ClientDriver<S> {
    lines: LineStream<S>,
}

impl<S> ClientDriver<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            lines: codec::framed(stream, None),
        }
    }

    /// Handshake, authenticate and fetch `remote_path` over `stream`
    pub async fn fetch(stream: S, password: &str, remote_path: &str) -> Result<Vec<u8>> {
        let mut driver = Self::new(stream);
        driver.handshake().await?;
        driver.authenticate(password).await?;
        let data = driver.get_file(remote_path).await?;
        driver.close().await;
        Ok(data)
    }

    /// Handshake then relay one `PACKET_IN`, returning the echoed content
    pub async fn relay(stream: S, content: &str) -> Result<String> {
        let mut driver = Self::new(stream);
        driver.handshake().await?;
        let echoed = driver.packet(content).await?;
        driver.close().await;
        Ok(echoed)
    }

    /// Send `HELLO` and expect `Handshake complete`
    pub async fn handshake(&mut self) -> Result<()> {
        match self.exchange(Command::Hello).await? {
            Response::HandshakeComplete => Ok(()),
            other => Err(Error::Handshake(format!("server replied {:?}", other.to_string()))),
        }
    }

    /// Send `AUTH <password>` and expect `AUTH_OK`
    pub async fn authenticate(&mut self, password: &str) -> Result<()> {
        ensure_single_line("password", password)?;
        if password.trim().is_empty() {
            return Err(Error::AuthFailure("password must not be empty".to_string()));
        }
        match self.exchange(Command::Auth(password.to_string())).await? {
            Response::AuthOk => Ok(()),
            Response::AuthFail => Err(Error::AuthFailure("server rejected credential".to_string())),
            other => Err(unexpected(other)),
        }
    }

    /// Send `GET_FILE <path>` and decode the `FILE_DATA` payload
    pub async fn get_file(&mut self, remote_path: &str) -> Result<Vec<u8>> {
        ensure_single_line("remote path", remote_path)?;
        match self
            .exchange(Command::GetFile(Some(remote_path.to_string())))
            .await?
        {
            Response::FileData(payload) => {
                debug!(remote = remote_path, encoded_len = payload.len(), "file data received");
                codec::decode_file(&payload)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Send `PACKET_IN <content>` and return the `PACKET_OUT` content
    pub async fn packet(&mut self, content: &str) -> Result<String> {
        ensure_single_line("packet content", content)?;
        match self.exchange(Command::PacketIn(content.to_string())).await? {
            Response::PacketOut(echoed) => Ok(echoed),
            other => Err(unexpected(other)),
        }
    }

    /// Shut down the write side; the server sees EOF and ends the session
    pub async fn close(mut self) {
        if let Err(e) = SinkExt::<Command>::close(&mut self.lines).await {
            debug!("closing client connection failed: {}", e);
        }
    }

    async fn exchange(&mut self, command: Command) -> Result<Response> {
        self.lines.send(command).await?;
        match codec::read_line(&mut self.lines).await? {
            Some(line) => Response::parse(&line),
            None => Err(Error::Transport("connection closed by server".to_string())),
        }
    }
}

/// Fetch `remote_path` and persist it.
///
/// The output defaults to the last `/`-separated segment of the remote path.
/// Nothing is written until the payload has decoded successfully. Returns the
/// output path and the number of bytes written.
pub async fn fetch_to_file<S>(
    stream: S,
    password: &str,
    remote_path: &str,
    output: Option<&Path>,
) -> Result<(PathBuf, usize)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_path(remote_path)?,
    };

    let data = ClientDriver::fetch(stream, password, remote_path).await?;
    tokio::fs::write(&output, &data)
        .await
        .map_err(|e| Error::Output(format!("{}: {}", output.display(), e)))?;
    Ok((output, data.len()))
}

/// Final path segment of a remote path
pub fn default_output_path(remote_path: &str) -> Result<PathBuf> {
    match remote_path.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(PathBuf::from(name)),
        _ => Err(Error::Output(format!(
            "cannot derive a file name from {:?}, pass an output path",
            remote_path
        ))),
    }
}

fn ensure_single_line(what: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(Error::Protocol(format!("{} must not contain line breaks", what)));
    }
    Ok(())
}

fn unexpected(response: Response) -> Error {
    match response {
        Response::Error(message) => match message.strip_prefix("Could not read file: ") {
            Some(detail) => Error::FileAccess(detail.to_string()),
            None => Error::Protocol(format!("server error: {}", message)),
        },
        other => Error::Protocol(format!("unexpected response: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialRecord, CredentialStore};
    use crate::files::LocalFiles;
    use crate::session::{run_session, SessionContext};
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    fn serve() -> DuplexStream {
        let (client, server) = tokio::io::duplex(4096);
        let store = CredentialStore::new(CredentialRecord::derive("s1", "secret").unwrap());
        let context = SessionContext::new(Arc::new(store), Arc::new(LocalFiles));
        tokio::spawn(run_session(server, "127.0.0.1:9".parse().unwrap(), context));
        client
    }

    /// Scripted server that answers each request line with the next reply
    fn scripted(replies: &'static [&'static str]) -> DuplexStream {
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(server);
            let mut reader = BufReader::new(reader);
            for reply in replies {
                let mut request = String::new();
                if reader.read_line(&mut request).await.unwrap_or(0) == 0 {
                    return;
                }
                writer.write_all(reply.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }
        });
        client
    }

    #[tokio::test]
    async fn test_fetch_against_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [0x00, 0xFF, 0x10]).unwrap();

        let data = ClientDriver::fetch(serve(), "secret", path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(data, vec![0x00, 0xFF, 0x10]);
    }

    #[tokio::test]
    async fn test_fetch_wrong_password() {
        let result = ClientDriver::fetch(serve(), "wrong", "./whatever").await;
        assert!(matches!(result, Err(Error::AuthFailure(_))));
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let result = ClientDriver::fetch(serve(), "secret", "./definitely/missing").await;
        assert!(matches!(result, Err(Error::FileAccess(_))));
    }

    #[tokio::test]
    async fn test_relay() {
        let echoed = ClientDriver::relay(serve(), "hello world").await.unwrap();
        assert_eq!(echoed, "hello world");
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let result = ClientDriver::fetch(scripted(&["ERROR"]), "secret", "x").await;
        assert!(matches!(result, Err(Error::Handshake(_))));
    }

    #[tokio::test]
    async fn test_server_hangs_up() {
        let result = ClientDriver::fetch(scripted(&["Handshake complete"]), "secret", "x").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_accepts_unpadded_payload() {
        let stream = scripted(&["Handshake complete", "AUTH_OK", "FILE_DATA AP8"]);
        let data = ClientDriver::fetch(stream, "secret", "x").await.unwrap();
        assert_eq!(data, vec![0x00, 0xFF]);
    }

    #[tokio::test]
    async fn test_malformed_payload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let stream = scripted(&["Handshake complete", "AUTH_OK", "FILE_DATA @@@"]);

        let result = fetch_to_file(stream, "secret", "x", Some(&out)).await;
        assert!(matches!(result, Err(Error::Decode(_))));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_fetch_to_file_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("copy.bin");
        let stream = scripted(&["Handshake complete", "AUTH_OK", "FILE_DATA AP8Q"]);

        let (written_to, len) = fetch_to_file(stream, "secret", "./data.bin", Some(&out))
            .await
            .unwrap();
        assert_eq!(written_to, out);
        assert_eq!(len, 3);
        assert_eq!(std::fs::read(&out).unwrap(), vec![0x00, 0xFF, 0x10]);
    }

    #[tokio::test]
    async fn test_blank_password_not_sent() {
        let result = ClientDriver::fetch(serve(), " ", "./whatever").await;
        assert!(matches!(result, Err(Error::AuthFailure(_))));
    }

    #[tokio::test]
    async fn test_rejects_line_breaks() {
        let mut driver = ClientDriver::new(scripted(&[]));
        let result = driver.get_file("a\nAUTH x").await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path("/var/log/syslog").unwrap(), PathBuf::from("syslog"));
        assert_eq!(default_output_path("data.bin").unwrap(), PathBuf::from("data.bin"));
        assert_eq!(default_output_path("./a/b.txt").unwrap(), PathBuf::from("b.txt"));
        assert!(default_output_path("dir/").is_err());
        assert!(default_output_path("..").is_err());
    }
}
