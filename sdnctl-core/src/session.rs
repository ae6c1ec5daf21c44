//! Per-connection protocol state machine
//!
//! ```text
//! AWAITING_HELLO --HELLO--> READY(auth=false) --AUTH ok--> READY(auth=true)
//!       |                          |                              |
//!       +-- anything else ---------+------- EOF / I/O fault ------+--> CLOSED
//! ```
//!
//! A session owns its connection exclusively. The only state it shares with
//! other sessions is the read-only [`SessionContext`].

use crate::audit::{AuditAction, AuditEvent, AuditLogger, AuditResult};
use crate::auth::CredentialStore;
use crate::codec::{self, LineStream};
use crate::error::{Error, Result};
use crate::files::FileSource;
use crate::protocol::{Command, Response, HELLO};
use futures::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the greeting line
    AwaitingHello,
    /// Handshake done, serving commands
    Ready,
    /// Connection gone
    Closed,
}

/// Session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatistics {
    /// Command lines handled after the handshake
    pub commands: u64,
    /// Rejected `AUTH` attempts
    pub auth_failures: u64,
    /// Files served
    pub files_sent: u64,
    /// Raw file bytes served, before encoding
    pub bytes_sent: u64,
}

/// Read-only collaborators handed to every session
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<CredentialStore>,
    files: Arc<dyn FileSource>,
    audit: AuditLogger,
    max_line_length: Option<usize>,
}

impl SessionContext {
    pub fn new(store: Arc<CredentialStore>, files: Arc<dyn FileSource>) -> Self {
        Self {
            store,
            files,
            audit: AuditLogger::default(),
            max_line_length: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: Option<usize>) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}

/// One connection's protocol state
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    state: SessionState,
    authenticated: bool,
    context: SessionContext,
    statistics: SessionStatistics,
}

impl Session {
    pub fn new(peer: SocketAddr, context: SessionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            state: SessionState::AwaitingHello,
            authenticated: false,
            context,
            statistics: SessionStatistics::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Drive the connection until the peer closes it or a fatal error occurs.
    ///
    /// Returns the statistics on a clean close; handshake rejections and
    /// transport faults come back as errors. The stream is shut down and
    /// dropped on every path.
    pub async fn run<S>(mut self, stream: S) -> Result<SessionStatistics>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut lines = codec::framed(stream, self.context.max_line_length);
        self.audit(AuditEvent::new(AuditAction::SessionStart, AuditResult::Success));

        let outcome = self.serve(&mut lines).await;
        self.state = SessionState::Closed;

        if let Err(e) = SinkExt::<Response>::close(&mut lines).await {
            debug!(peer = %self.peer, "shutdown after session end failed: {}", e);
        }

        let end = match &outcome {
            Ok(()) => AuditEvent::new(AuditAction::SessionEnd, AuditResult::Success),
            Err(e) => AuditEvent::new(AuditAction::SessionEnd, AuditResult::Failure)
                .with_error(e.to_string()),
        };
        self.audit(end.with_bytes_transferred(self.statistics.bytes_sent));

        outcome.map(|()| self.statistics)
    }

    async fn serve<S>(&mut self, lines: &mut LineStream<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.handshake(lines).await?;

        loop {
            let line = match codec::read_line(lines).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                // Framing is lost after an over-long line; report it, then close
                Err(Error::Protocol(message)) => {
                    self.reject_line(lines, Response::Error(message.clone())).await;
                    return Err(Error::Protocol(message));
                }
                Err(e) => return Err(e),
            };
            self.statistics.commands += 1;
            let command = Command::parse(&line);
            debug!(session = %self.id, verb = ?command.verb(), "command received");

            let response = match self.dispatch(command).await {
                Ok(response) => response,
                Err(e) if e.closes_connection() => return Err(e),
                Err(e) => Response::Error(e.reply_message()),
            };
            lines.send(response).await?;
        }

        debug!(session = %self.id, peer = %self.peer, "peer closed connection");
        Ok(())
    }

    async fn handshake<S>(&mut self, lines: &mut LineStream<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let detail = match codec::read_line(lines).await {
            Ok(Some(greeting)) if greeting == HELLO => {
                lines.send(Response::HandshakeComplete).await?;
                self.state = SessionState::Ready;
                self.audit(AuditEvent::new(AuditAction::Handshake, AuditResult::Success));
                return Ok(());
            }
            Ok(Some(line)) => format!("unexpected greeting {:?}", line),
            Ok(None) => "connection closed before greeting".to_string(),
            Err(Error::Protocol(message)) => message,
            Err(e) => return Err(e),
        };
        self.audit(
            AuditEvent::new(AuditAction::Handshake, AuditResult::Failure).with_error(detail.clone()),
        );
        self.reject_line(lines, Response::HandshakeRejected).await;
        Err(Error::Handshake(detail))
    }

    /// Best-effort final reply before the connection is dropped
    async fn reject_line<S>(&self, lines: &mut LineStream<S>, response: Response)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Err(e) = lines.send(response).await {
            debug!(peer = %self.peer, "could not deliver final reply: {}", e);
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Response> {
        match command {
            Command::Auth(password) => Ok(self.authenticate(Zeroizing::new(password)).await),
            Command::PacketIn(content) => {
                self.audit(AuditEvent::new(AuditAction::PacketRelay, AuditResult::Success));
                Ok(Response::PacketOut(content))
            }
            Command::GetFile(path) => self.get_file(path).await,
            Command::Hello | Command::Unknown(_) => {
                Err(Error::Protocol("Unknown command".to_string()))
            }
        }
    }

    async fn authenticate(&mut self, password: Zeroizing<String>) -> Response {
        let store = Arc::clone(&self.context.store);
        // PBKDF2 at 100k rounds is too slow for a runtime worker
        let verified = match tokio::task::spawn_blocking(move || store.verify(&password)).await {
            Ok(verified) => verified,
            Err(e) => {
                error!(session = %self.id, "credential check aborted: {}", e);
                false
            }
        };

        if verified {
            self.authenticated = true;
            self.audit(AuditEvent::new(AuditAction::Authentication, AuditResult::Success));
            Response::AuthOk
        } else {
            self.statistics.auth_failures += 1;
            self.audit(AuditEvent::new(AuditAction::Authentication, AuditResult::Failure));
            Response::AuthFail
        }
    }

    async fn get_file(&mut self, path: Option<String>) -> Result<Response> {
        if !self.authenticated {
            let mut event = AuditEvent::new(AuditAction::FileDownload, AuditResult::Denied);
            if let Some(path) = &path {
                event = event.with_file_path(path.as_str());
            }
            self.audit(event);
            return Err(Error::AuthFailure("Not authenticated".to_string()));
        }

        let path = path.ok_or_else(|| Error::Protocol("GET_FILE requires <path>".to_string()))?;

        match self.context.files.read(&path).await {
            Ok(data) => {
                self.statistics.files_sent += 1;
                self.statistics.bytes_sent += data.len() as u64;
                self.audit(
                    AuditEvent::new(AuditAction::FileDownload, AuditResult::Success)
                        .with_file_path(path.as_str())
                        .with_bytes_transferred(data.len() as u64),
                );
                Ok(Response::FileData(codec::encode_file(&data)))
            }
            Err(e) => {
                let detail = format!("{}: {}", path, e);
                self.audit(
                    AuditEvent::new(AuditAction::FileDownload, AuditResult::Failure)
                        .with_file_path(path.as_str())
                        .with_error(detail.clone()),
                );
                Err(Error::FileAccess(detail))
            }
        }
    }

    fn audit(&self, event: AuditEvent) {
        self.context
            .audit
            .log_event(&event.with_session_id(self.id).with_peer(self.peer));
    }
}

/// Serve one connection with a fresh session
pub async fn run_session<S>(
    stream: S,
    peer: SocketAddr,
    context: SessionContext,
) -> Result<SessionStatistics>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Session::new(peer, context).run(stream).await
}
