//! TCP listener for the controller
//!
//! Each accepted connection gets its own task running a fresh
//! [`Session`](crate::session::Session). Sessions share nothing but the
//! read-only credential store and file source. An optional semaphore caps the
//! number of live sessions; when it is exhausted the listener stops accepting
//! until a session ends.

use crate::audit::AuditLogger;
use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::files::FileSource;
use crate::session::{run_session, SessionContext};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Pause after a failed `accept` before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept loop bound to one address
pub struct Listener {
    listener: TcpListener,
    context: SessionContext,
    limit: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind to `config.address:config.port`
    pub async fn bind(
        config: &ServerConfig,
        store: Arc<CredentialStore>,
        files: Arc<dyn FileSource>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        let context = SessionContext::new(store, files)
            .with_audit(AuditLogger::new(config.audit.clone()))
            .with_max_line_length(config.max_line_length);
        let limit = match config.max_connections {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        info!("listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            context,
            limit,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.next_connection() => {
                    match accepted {
                        Ok((stream, peer, permit)) => self.spawn_session(stream, peer, permit),
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            // EMFILE and friends persist; do not spin on them
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    async fn next_connection(
        &self,
    ) -> Result<(TcpStream, SocketAddr, Option<OwnedSemaphorePermit>)> {
        let permit = match &self.limit {
            Some(limit) => Some(
                Arc::clone(limit)
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Internal(format!("connection limit closed: {}", e)))?,
            ),
            None => None,
        };
        let (stream, peer) = self.listener.accept().await?;
        Ok((stream, peer, permit))
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, permit: Option<OwnedSemaphorePermit>) {
        debug!(%peer, "connection accepted");
        let context = self.context.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match run_session(stream, peer, context).await {
                Ok(stats) => info!(
                    %peer,
                    commands = stats.commands,
                    files = stats.files_sent,
                    bytes = stats.bytes_sent,
                    "session closed"
                ),
                Err(e) => warn!(%peer, "session ended: {}", e),
            }
        });
    }
}
