//! # wscodec
//! Sans-io implementation of the WebSocket opening handshake and frame codec (RFC 6455).
//!
//! The crate never touches a socket. Every operation works on byte buffers supplied by the
//! caller, so the same code serves blocking transports, async runtimes, or tests that just
//! push bytes around.
//!
//! The crate is split in four layers:
//!
//! - [`key`]: nonce generation, base64, SHA-1 and `Sec-WebSocket-Accept` derivation.
//! - [`handshake`]: building and validating the HTTP/1.1 upgrade request and response,
//!   for both the client and the server role.
//! - [`codec`]: single-frame [`encode`](codec::encode) and [`decode`](codec::decode), plus a
//!   [`Codec`](codec::Codec) that plugs into `tokio_util::codec::Framed`.
//! - [`frame`]: the [`Frame`] and [`OpCode`] types shared by the layers above.
//!
//! # Features
//!
//! - `logging`: Enables debug logging for handshake negotiation and frame processing using the
//!   `log` crate.
//!
//! # Protocol subset
//! Only unfragmented messages are supported: every frame written has the FIN bit set, and a
//! received text or binary frame without FIN is rejected. Extensions and subprotocols are not
//! negotiated, so a received frame with any of the RSV1-3 bits set is rejected as well. Ping,
//! pong and reserved opcodes are skipped by the decoder and never answered.
//!
//! # Server Example
//! ```rust
//! use wscodec::handshake::{header_block_len, server};
//!
//! let request = b"GET /chat HTTP/1.1\r\n\
//!     Host: example.com\r\n\
//!     Upgrade: websocket\r\n\
//!     Connection: Upgrade\r\n\
//!     Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
//!     Sec-WebSocket-Version: 13\r\n\r\n";
//!
//! let len = header_block_len(request).expect("complete request");
//! let (_, response) = server::accept(&request[..len])?;
//! assert_eq!(response.accept_key(), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
//! print!("{response}");
//! # Ok::<(), wscodec::WebSocketError>(())
//! ```
//!
//! # Frame Example
//! ```rust
//! use wscodec::{codec::{self, Decoded}, OpCode};
//!
//! let wire = codec::encode(OpCode::Text, b"hello", true, &mut rand::thread_rng());
//! match codec::decode(&wire)? {
//!     Decoded::Frame { frame, consumed } => {
//!         assert_eq!(&frame.payload[..], b"hello");
//!         assert_eq!(consumed, wire.len());
//!     }
//!     _ => unreachable!(),
//! }
//! # Ok::<(), wscodec::WebSocketError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod frame;
pub mod handshake;
pub mod key;
mod mask;

use thiserror::Error;

pub use frame::{Frame, OpCode};

/// A result type for WebSocket operations, using `WebSocketError` as the error type.
pub type Result<T> = std::result::Result<T, WebSocketError>;

/// Which end of the connection the caller is.
///
/// The role decides the masking direction: clients mask every frame they send,
/// servers never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Represents errors that can occur while negotiating or framing a WebSocket connection.
///
/// The errors fall into two groups the caller reacts to differently:
///
/// - Handshake rejections (see [`WebSocketError::is_handshake_rejection`]): the upgrade failed
///   and no frame must be exchanged. A server should answer with
///   [`reject_response`](handshake::server::reject_response).
/// - Malformed frames (see [`WebSocketError::is_malformed`]): the byte stream is broken and the
///   connection should be closed.
///
/// A buffer that is merely too short is never an error; it is reported as
/// [`Decoded::Incomplete`](codec::Decoded::Incomplete).
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// Returned when receiving an HTTP status code that is not valid for WebSocket handshake.
    /// Only 101 (Switching Protocols) completes an upgrade.
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// Indicates that the HTTP "Upgrade" header is either missing or does not contain
    /// the required "websocket" value during connection handshake.
    #[error("Invalid upgrade header")]
    InvalidUpgradeHeader,

    /// Indicates that the HTTP "Connection" header is either missing or does not contain
    /// the required "upgrade" value during connection handshake.
    #[error("Invalid connection header")]
    InvalidConnectionHeader,

    /// Returned when the "Sec-WebSocket-Version" header is present and not set to 13.
    #[error("Sec-Websocket-Version must be 13")]
    InvalidSecWebsocketVersion,

    /// Occurs during handshake when the required "Sec-WebSocket-Key" header is missing from
    /// the client request, or is empty.
    #[error("Sec-WebSocket-Key header is missing")]
    MissingSecWebSocketKey,

    /// The server answered with a "Sec-WebSocket-Accept" value that was not derived from the
    /// key the client sent.
    #[error("Sec-WebSocket-Accept does not match the request key")]
    InvalidAcceptKey,

    /// An upgrade request used a method other than GET.
    #[error("Invalid request method: {0}")]
    InvalidMethod(String),

    /// The header block could not be parsed as HTTP/1.1 start line and header lines.
    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    /// Indicates that reserved bits in the WebSocket frame header are set. No extension is
    /// negotiated, so they must be 0 (RFC 6455 Section 5.2).
    #[error("Reserved bits are not zero")]
    ReservedBitsNotZero,

    /// A 64-bit extended payload length had its most significant bit set, or did not fit
    /// in the platform's `usize`.
    #[error("Payload length overflow ({0})")]
    PayloadLengthOverflow(u64),

    /// A text or binary frame arrived without the FIN bit. Fragmented messages are not
    /// supported.
    #[error("Fragmented frames are not supported")]
    FragmentedFrame,

    /// Occurs when a received frame's payload length exceeds the maximum configured size.
    #[error("Frame too large")]
    FrameTooLarge,

    /// A string handed to [`key::decode_base64`] is not valid standard base64.
    #[error("Invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Returned when building a client handshake from a URL with a scheme other than
    /// "ws://" or "wss://".
    #[error("Invalid http scheme")]
    InvalidHttpScheme,

    /// Wraps errors from URL parsing that may occur when processing WebSocket URLs.
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    /// Wraps standard I/O errors surfaced through the [`codec::Codec`] stream adapter.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl WebSocketError {
    /// Returns `true` if the error means the opening handshake failed.
    ///
    /// The caller must not proceed to frame exchange after such an error.
    pub fn is_handshake_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidStatusCode(_)
                | Self::InvalidUpgradeHeader
                | Self::InvalidConnectionHeader
                | Self::InvalidSecWebsocketVersion
                | Self::MissingSecWebSocketKey
                | Self::InvalidAcceptKey
                | Self::InvalidMethod(_)
                | Self::MalformedHandshake(_)
        )
    }

    /// Returns `true` if the error means a received frame is structurally invalid.
    ///
    /// The connection should be closed; reading more bytes will not help.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::ReservedBitsNotZero
                | Self::PayloadLengthOverflow(_)
                | Self::FragmentedFrame
                | Self::FrameTooLarge
        )
    }
}
