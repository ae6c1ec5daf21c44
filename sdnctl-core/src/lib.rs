//! sdnctl Core - controller protocol engine
//!
//! This crate implements both ends of the sdnctl line protocol: the
//! per-connection session state machine and TCP listener used by the
//! controller, and the client driver used to fetch files and relay packets.
//! Access to files is gated by a single PBKDF2-hashed shared secret.

pub mod audit;
pub mod auth;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod driver;
pub mod error;
pub mod files;
pub mod protocol;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use audit::{AuditConfig, AuditEvent, AuditLogger};
pub use auth::{CredentialRecord, CredentialStore};
pub use config::ServerConfig;
pub use driver::{fetch_to_file, ClientDriver};
pub use error::{Error, Result};
pub use files::{FileSource, LocalFiles};
pub use protocol::{Command, Response};
pub use server::Listener;
pub use session::{run_session, Session, SessionContext, SessionStatistics};

/// Default controller port
pub const DEFAULT_PORT: u16 = 9000;

/// Credential file read by the server and written by `sdnctl-tools hash`
pub const DEFAULT_CREDENTIALS_FILE: &str = "auth.conf";

/// Default cap on concurrent sessions per server
pub const MAX_CONCURRENT_CONNECTIONS: usize = 1024;

/// Client connect timeout in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
