//! Connection audit trail
//!
//! Every session emits structured events (start, handshake, authentication,
//! relay, file download, end) through `tracing`. The logger can render them
//! as plain fields or as one JSON object per event.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Audit event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug information
    Debug = 0,
    /// Informational message
    Info = 1,
    /// Warning message
    Warning = 2,
    /// Error condition
    Error = 3,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// Connection accepted
    SessionStart,
    /// Greeting exchange
    Handshake,
    /// `AUTH` attempt
    Authentication,
    /// `PACKET_IN` echo
    PacketRelay,
    /// `GET_FILE` request
    FileDownload,
    /// Connection closed
    SessionEnd,
}

/// Audit result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditResult {
    /// Operation successful
    Success,
    /// Operation failed
    Failure,
    /// Operation refused by the auth gate
    Denied,
}

/// Audit event structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    /// Action performed
    pub action: AuditAction,
    /// Result of operation
    pub result: AuditResult,
    /// Session ID
    pub session_id: Option<Uuid>,
    /// Remote peer
    pub peer: Option<String>,
    /// File path (if applicable)
    pub file_path: Option<String>,
    /// Bytes transferred (if applicable)
    pub bytes_transferred: Option<u64>,
    /// Failure detail
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create new audit event
    pub fn new(action: AuditAction, result: AuditResult) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            timestamp,
            action,
            result,
            session_id: None,
            peer: None,
            file_path: None,
            bytes_transferred: None,
            error: None,
        }
    }

    /// Set session ID
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Set remote peer
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer.to_string());
        self
    }

    /// Set file path
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Set bytes transferred
    pub fn with_bytes_transferred(mut self, bytes: u64) -> Self {
        self.bytes_transferred = Some(bytes);
        self
    }

    /// Set failure detail
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Severity derived from action and result
    pub fn severity(&self) -> Severity {
        match self.result {
            AuditResult::Success => match self.action {
                AuditAction::Authentication | AuditAction::FileDownload => Severity::Info,
                AuditAction::SessionStart | AuditAction::SessionEnd => Severity::Info,
                _ => Severity::Debug,
            },
            AuditResult::Failure => match self.action {
                AuditAction::SessionEnd => Severity::Error,
                _ => Severity::Warning,
            },
            AuditResult::Denied => Severity::Warning,
        }
    }
}

/// Output format for audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditFormat {
    /// Structured `tracing` fields
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Audit logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Output format
    pub format: AuditFormat,
    /// Events below this severity are dropped
    pub min_severity: Severity,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            format: AuditFormat::Text,
            min_severity: Severity::Debug,
        }
    }
}

/// Audit logger implementation
#[derive(Debug, Clone, Default)]
pub struct AuditLogger {
    config: AuditConfig,
}

impl AuditLogger {
    /// Create new audit logger
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    /// Whether an event of this severity would be emitted
    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.config.min_severity
    }

    /// Log audit event
    pub fn log_event(&self, event: &AuditEvent) {
        let severity = event.severity();
        if !self.enabled(severity) {
            return;
        }

        match self.config.format {
            AuditFormat::Json => match serde_json::to_string(event) {
                Ok(json) => emit(severity, &json),
                Err(e) => tracing::warn!("Failed to serialize audit event: {}", e),
            },
            AuditFormat::Text => {
                let session = event.session_id.map(|id| id.to_string()).unwrap_or_default();
                let peer = event.peer.as_deref().unwrap_or("-");
                let path = event.file_path.as_deref().unwrap_or("-");
                let bytes = event.bytes_transferred.unwrap_or_default();
                let error = event.error.as_deref().unwrap_or("-");
                let message = format!("{:?} {:?}", event.action, event.result);
                match severity {
                    Severity::Debug => tracing::debug!(%session, %peer, %path, bytes, %error, "{}", message),
                    Severity::Info => tracing::info!(%session, %peer, %path, bytes, %error, "{}", message),
                    Severity::Warning => tracing::warn!(%session, %peer, %path, bytes, %error, "{}", message),
                    Severity::Error => tracing::error!(%session, %peer, %path, bytes, %error, "{}", message),
                }
            }
        }
    }
}

fn emit(severity: Severity, json: &str) {
    match severity {
        Severity::Debug => tracing::debug!(target: "sdnctl::audit", "{}", json),
        Severity::Info => tracing::info!(target: "sdnctl::audit", "{}", json),
        Severity::Warning => tracing::warn!(target: "sdnctl::audit", "{}", json),
        Severity::Error => tracing::error!(target: "sdnctl::audit", "{}", json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let event = AuditEvent::new(AuditAction::FileDownload, AuditResult::Success)
            .with_peer(peer)
            .with_file_path("./data.bin")
            .with_bytes_transferred(3);

        assert_eq!(event.peer.as_deref(), Some("127.0.0.1:4000"));
        assert_eq!(event.file_path.as_deref(), Some("./data.bin"));
        assert_eq!(event.bytes_transferred, Some(3));
        assert_eq!(event.severity(), Severity::Info);
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_failures_are_warnings() {
        let auth = AuditEvent::new(AuditAction::Authentication, AuditResult::Failure);
        assert_eq!(auth.severity(), Severity::Warning);
        let denied = AuditEvent::new(AuditAction::FileDownload, AuditResult::Denied);
        assert_eq!(denied.severity(), Severity::Warning);
        let relay = AuditEvent::new(AuditAction::PacketRelay, AuditResult::Success);
        assert_eq!(relay.severity(), Severity::Debug);
    }

    #[test]
    fn test_min_severity_filter() {
        let logger = AuditLogger::new(AuditConfig {
            format: AuditFormat::Json,
            min_severity: Severity::Warning,
        });
        assert!(!logger.enabled(Severity::Info));
        assert!(logger.enabled(Severity::Error));
    }

    #[test]
    fn test_event_serializes_without_secrets() {
        let event = AuditEvent::new(AuditAction::Authentication, AuditResult::Failure);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"action\":\"Authentication\""));
        assert!(json.contains("\"result\":\"Failure\""));
    }

    #[test]
    fn test_config_from_toml() {
        let config: AuditConfig = toml::from_str("format = \"json\"\nmin_severity = \"info\"\n").unwrap();
        assert_eq!(config.format, AuditFormat::Json);
        assert_eq!(config.min_severity, Severity::Info);
    }
}
