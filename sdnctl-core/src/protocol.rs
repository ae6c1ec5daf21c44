//! sdnctl wire protocol
//!
//! This module defines the command and response lines exchanged over a
//! connection. Every message is a single ASCII line; the codec module
//! handles framing.

use crate::codec::{format_error, format_response};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Greeting a client must send first
pub const HELLO: &str = "HELLO";

/// Server reply to a valid greeting
pub const HANDSHAKE_COMPLETE: &str = "Handshake complete";

/// Server reply to any other greeting
pub const HANDSHAKE_REJECTED: &str = "ERROR";

/// Prefix of every recoverable error line
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Handshake greeting
    Hello,
    /// Credential submission
    Auth,
    /// Unauthenticated echo request
    PacketIn,
    /// Authenticated whole-file request
    GetFile,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Hello => HELLO,
            Verb::Auth => "AUTH",
            Verb::PacketIn => "PACKET_IN",
            Verb::GetFile => "GET_FILE",
        }
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            HELLO => Ok(Verb::Hello),
            "AUTH" => Ok(Verb::Auth),
            "PACKET_IN" => Ok(Verb::PacketIn),
            "GET_FILE" => Ok(Verb::GetFile),
            _ => Err(Error::Protocol("Unknown command".to_string())),
        }
    }
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELLO`
    Hello,
    /// `AUTH <password>`
    Auth(String),
    /// `PACKET_IN <content>`, content may be empty
    PacketIn(String),
    /// `GET_FILE <path>`, `None` when the path is missing
    GetFile(Option<String>),
    /// Anything with an unrecognised verb
    Unknown(String),
}

impl Command {
    /// Parse one line (newline already stripped).
    ///
    /// The verb is everything before the first space; the argument is the
    /// remainder taken verbatim, so it may itself contain spaces.
    pub fn parse(line: &str) -> Self {
        let (verb, argument) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (line, None),
        };

        match Verb::from_str(verb) {
            Ok(Verb::Hello) if argument.is_none() => Command::Hello,
            // A bare or blank AUTH carries no candidate and is not a login attempt
            Ok(Verb::Auth) => match argument.filter(|password| !password.trim().is_empty()) {
                Some(password) => Command::Auth(password.to_string()),
                None => Command::Unknown(line.to_string()),
            },
            Ok(Verb::PacketIn) => Command::PacketIn(argument.unwrap_or_default().to_string()),
            Ok(Verb::GetFile) => Command::GetFile(
                argument
                    .filter(|path| !path.trim().is_empty())
                    .map(str::to_string),
            ),
            _ => Command::Unknown(line.to_string()),
        }
    }

    /// Verb of this command, if recognised
    pub fn verb(&self) -> Option<Verb> {
        match self {
            Command::Hello => Some(Verb::Hello),
            Command::Auth(_) => Some(Verb::Auth),
            Command::PacketIn(_) => Some(Verb::PacketIn),
            Command::GetFile(_) => Some(Verb::GetFile),
            Command::Unknown(_) => None,
        }
    }

    /// Render as a newline-terminated line
    pub fn to_line(&self) -> String {
        match self {
            Command::Hello => format!("{}\n", HELLO),
            Command::Auth(password) => format_response(Verb::Auth.as_str(), password),
            Command::PacketIn(content) => format_response(Verb::PacketIn.as_str(), content),
            Command::GetFile(Some(path)) => format_response(Verb::GetFile.as_str(), path),
            Command::GetFile(None) => format!("{}\n", Verb::GetFile.as_str()),
            Command::Unknown(raw) => format!("{}\n", raw),
        }
    }
}

/// A server response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `Handshake complete`
    HandshakeComplete,
    /// bare `ERROR`, sent before closing on a bad greeting
    HandshakeRejected,
    /// `AUTH_OK`
    AuthOk,
    /// `AUTH_FAIL`
    AuthFail,
    /// `PACKET_OUT <content>`
    PacketOut(String),
    /// `FILE_DATA <base64>`
    FileData(String),
    /// `ERROR: <message>`
    Error(String),
}

impl Response {
    pub const AUTH_OK: &'static str = "AUTH_OK";
    pub const AUTH_FAIL: &'static str = "AUTH_FAIL";
    pub const PACKET_OUT: &'static str = "PACKET_OUT";
    pub const FILE_DATA: &'static str = "FILE_DATA";

    /// Render as a newline-terminated line
    pub fn to_line(&self) -> String {
        match self {
            Response::HandshakeComplete => format!("{}\n", HANDSHAKE_COMPLETE),
            Response::HandshakeRejected => format!("{}\n", HANDSHAKE_REJECTED),
            Response::AuthOk => format!("{}\n", Self::AUTH_OK),
            Response::AuthFail => format!("{}\n", Self::AUTH_FAIL),
            Response::PacketOut(content) => format_response(Self::PACKET_OUT, content),
            Response::FileData(payload) => format_response(Self::FILE_DATA, payload),
            Response::Error(message) => format_error(message),
        }
    }

    /// Parse a line received from a server
    pub fn parse(line: &str) -> Result<Self> {
        if line == HANDSHAKE_COMPLETE {
            return Ok(Response::HandshakeComplete);
        }
        if line == HANDSHAKE_REJECTED {
            return Ok(Response::HandshakeRejected);
        }
        if line == Self::AUTH_OK {
            return Ok(Response::AuthOk);
        }
        if line == Self::AUTH_FAIL {
            return Ok(Response::AuthFail);
        }
        if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            return Ok(Response::Error(message.to_string()));
        }
        if let Some(content) = line.strip_prefix("PACKET_OUT ") {
            return Ok(Response::PacketOut(content.to_string()));
        }
        if let Some(payload) = line.strip_prefix("FILE_DATA ") {
            return Ok(Response::FileData(payload.to_string()));
        }
        Err(Error::Protocol(format!("Unexpected response: {}", line)))
    }

    /// Whether this is any kind of error line
    pub fn is_error(&self) -> bool {
        matches!(self, Response::HandshakeRejected | Response::Error(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_line().trim_end_matches('\n'))
    }
}
