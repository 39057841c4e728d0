//! The WebSocket opening handshake
//! ([RFC 6455 Section 4](https://datatracker.ietf.org/doc/html/rfc6455#section-4)).
//!
//! The two roles share no state:
//!
//! - [`client::ClientHandshake`] builds the upgrade request and validates the server's answer.
//! - [`server::accept`] validates an upgrade request and builds the `101 Switching Protocols`
//!   answer.
//!
//! Both sides work on complete header blocks. Use [`header_block_len`] on the bytes read so far
//! to find out whether the block is complete and where the frame stream starts.
use std::fmt;

pub mod client;
mod headers;
pub mod server;

pub use headers::header_block_len;

use crate::Result;
use headers::HeaderBlock;

/// Protocol version sent and accepted in `Sec-WebSocket-Version`.
pub const WEBSOCKET_VERSION: &str = "13";

/// An upgrade request, as sent by a client or as understood by a server.
///
/// `Display` renders the exact bytes to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request target, path and query (e.g. `/chat?room=1`).
    pub resource: String,
    /// Value of the `Host` header.
    pub host: String,
    /// Value of `Sec-WebSocket-Key`: a base64-encoded 16-byte nonce.
    pub key: String,
    /// Value of `Sec-WebSocket-Version`, always [`WEBSOCKET_VERSION`].
    pub version: String,
    /// Value of the `Origin` header. Always set by [`client::ClientHandshake`], optional for
    /// requests parsed by a server.
    pub origin: Option<String>,
}

impl fmt::Display for HandshakeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {} HTTP/1.1\r\n", self.resource)?;
        write!(f, "Host: {}\r\n", self.host)?;
        write!(f, "Upgrade: websocket\r\n")?;
        write!(f, "Connection: Upgrade\r\n")?;
        write!(f, "Sec-WebSocket-Key: {}\r\n", self.key)?;
        write!(f, "Sec-WebSocket-Version: {}\r\n", self.version)?;
        if let Some(origin) = &self.origin {
            write!(f, "Origin: {}\r\n", origin)?;
        }
        write!(f, "\r\n")
    }
}

/// An upgrade response: a status line and an ordered list of headers.
///
/// `Display` renders the exact bytes to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The full status line, without its line terminator.
    pub status_line: String,
    /// The numeric status code from the status line.
    pub status: u16,
    /// Headers in the order they were sent.
    pub headers: Vec<(String, String)>,
}

impl HandshakeResponse {
    /// Builds the `101 Switching Protocols` response for an accepted upgrade.
    pub fn switching_protocols(accept_key: &str) -> Self {
        Self {
            status_line: "HTTP/1.1 101 Switching Protocols".to_owned(),
            status: 101,
            headers: vec![
                ("Upgrade".to_owned(), "websocket".to_owned()),
                ("Connection".to_owned(), "Upgrade".to_owned()),
                ("Sec-WebSocket-Accept".to_owned(), accept_key.to_owned()),
            ],
        }
    }

    /// Parses a complete response header block. Bytes after the empty line are ignored.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let block = HeaderBlock::parse(input)?;
        let (_, status, _) = headers::parse_status_line(block.start_line)?;

        Ok(Self {
            status_line: block.start_line.to_owned(),
            status,
            headers: block
                .headers
                .iter()
                .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                .collect(),
        })
    }

    /// Looks a header up by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Sec-WebSocket-Accept` value, if the response carries one.
    pub fn accept_key(&self) -> Option<&str> {
        self.header("Sec-WebSocket-Accept")
    }
}

impl fmt::Display for HandshakeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.status_line)?;
        for (name, value) in &self.headers {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        write!(f, "\r\n")
    }
}
