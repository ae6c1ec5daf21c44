//! Error types for the sdnctl protocol engine

use thiserror::Error;

/// Result type for sdnctl operations
pub type Result<T> = std::result::Result<T, Error>;

/// sdnctl-specific error types
#[derive(Error, Debug)]
pub enum Error {
    /// Greeting was missing or not `HELLO`
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Credential rejected
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    /// Unknown verb, missing argument or unexpected response line
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Requested path could not be read
    #[error("Could not read file: {0}")]
    FileAccess(String),

    /// File payload was not valid Base64
    #[error("Decode error: {0}")]
    Decode(String),

    /// Fetched payload could not be persisted locally
    #[error("Could not write output: {0}")]
    Output(String),

    /// Credential record or config file missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection-level I/O fault
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a session must close after this error.
    ///
    /// Only handshake failures and transport faults end a connection; every
    /// other error is answered with an `ERROR:` line and the loop continues.
    pub fn closes_connection(&self) -> bool {
        matches!(self, Error::Handshake(_) | Error::Transport(_))
    }

    /// Text sent after `ERROR: ` when this error is reported to a peer
    pub fn reply_message(&self) -> String {
        match self {
            Error::FileAccess(_) | Error::Output(_) => self.to_string(),
            Error::Handshake(message)
            | Error::AuthFailure(message)
            | Error::Protocol(message)
            | Error::Decode(message)
            | Error::Config(message)
            | Error::Transport(message)
            | Error::Internal(message) => message.clone(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("Serialization error: {}", err))
    }
}
