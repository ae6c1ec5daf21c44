//! Line framing and file payload encoding
//!
//! The wire protocol is strictly line oriented: every command and every
//! response is one `\n`-terminated line. [`LineCodec`] plugs into
//! `tokio_util::codec::Framed` and accumulates bytes until a newline is seen,
//! no matter how the peer fragments its writes. Bytes following a newline
//! stay in the read buffer for the next call.
//!
//! File payloads travel as standard Base64 on a single line. Senders are
//! allowed to drop trailing `=` padding; [`decode_file`] restores it before
//! decoding.

use crate::error::{Error, Result};
use crate::protocol::{Command, Response, ERROR_PREFIX};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{BufMut, BytesMut};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

/// A byte stream framed into protocol lines
pub type LineStream<S> = Framed<S, LineCodec>;

/// Newline-delimited text codec
#[derive(Debug, Clone, Default)]
pub struct LineCodec {
    /// Index in the buffer up to which no newline has been found yet
    next_index: usize,
    /// Optional cap on a single line, `None` means unbounded
    max_length: Option<usize>,
}

impl LineCodec {
    /// Codec without a line length limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that rejects lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length: Some(max_length),
        }
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    fn check_length(&self, len: usize) -> Result<()> {
        match self.max_length {
            Some(max) if len > max => Err(Error::Protocol(format!(
                "Line exceeds maximum length of {} bytes",
                max
            ))),
            _ => Ok(()),
        }
    }
}

/// Turn raw line bytes (newline removed) into text.
///
/// A trailing `\r` is dropped so CRLF peers work too. Invalid UTF-8 is
/// replaced rather than rejected; the verb match fails on it anyway.
fn bytes_to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        let read_to = buf.len();
        let newline = buf[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let newline_index = self.next_index + offset;
                self.next_index = 0;
                self.check_length(newline_index)?;
                let line = buf.split_to(newline_index + 1);
                Ok(Some(bytes_to_line(&line[..newline_index])))
            }
            None => {
                self.next_index = read_to;
                self.check_length(read_to)?;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Peer closed mid-line: hand back what arrived
        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(bytes_to_line(&line)))
    }
}

impl Encoder<Response> for LineCodec {
    type Error = Error;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<()> {
        put_line(&response.to_line(), dst);
        Ok(())
    }
}

impl Encoder<Command> for LineCodec {
    type Error = Error;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<()> {
        put_line(&command.to_line(), dst);
        Ok(())
    }
}

fn put_line(line: &str, dst: &mut BytesMut) {
    dst.reserve(line.len());
    dst.put_slice(line.as_bytes());
}

/// Frame a byte stream into protocol lines
pub fn framed<S>(stream: S, max_line_length: Option<usize>) -> LineStream<S>
where
    S: AsyncRead + AsyncWrite,
{
    let codec = match max_line_length {
        Some(max) => LineCodec::with_max_length(max),
        None => LineCodec::new(),
    };
    Framed::new(stream, codec)
}

/// Read the next line, `Ok(None)` once the peer has closed the stream
pub async fn read_line<S>(lines: &mut LineStream<S>) -> Result<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    lines.next().await.transpose()
}

/// Encode a whole file as one line-safe Base64 string
pub fn encode_file(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a file payload, re-adding any `=` padding the sender omitted
pub fn decode_file(payload: &str) -> Result<Vec<u8>> {
    let padding = (4 - payload.len() % 4) % 4;
    let mut padded = String::with_capacity(payload.len() + padding);
    padded.push_str(payload);
    padded.extend(std::iter::repeat('=').take(padding));
    STANDARD
        .decode(padded.as_bytes())
        .map_err(|e| Error::Decode(format!("Base64 decode failed: {}", e)))
}

/// `VERB arg\n`
pub fn format_response(verb: &str, arg: &str) -> String {
    format!("{} {}\n", verb, arg)
}

/// `ERROR: message\n`
pub fn format_error(message: &str) -> String {
    format!("{}{}\n", ERROR_PREFIX, message)
}
