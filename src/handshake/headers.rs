//! Parsing of the HTTP/1.1 header blocks exchanged during the opening handshake.
//!
//! Only the subset the handshake needs is understood: a start line, `Name: value` header
//! lines and the empty line that ends the block, all `\r\n` terminated. Anything after the
//! empty line is left alone.
use nom::{
    bytes::complete::{tag, take_till1, take_until, take_while1},
    character::complete::{digit1, space0, space1},
    combinator::{map_res, rest},
    multi::many0,
    sequence::{preceded, separated_pair, terminated},
    IResult, Parser,
};

use crate::{Result, WebSocketError};

/// A parsed header block, borrowing from the input.
#[derive(Debug)]
pub(crate) struct HeaderBlock<'a> {
    pub(crate) start_line: &'a str,
    pub(crate) headers: Vec<(&'a str, &'a str)>,
}

impl<'a> HeaderBlock<'a> {
    /// Parses a complete header block from raw bytes. Bytes after the empty line are not
    /// looked at, so they may hold binary frame data.
    pub(crate) fn parse(input: &'a [u8]) -> Result<Self> {
        let len = header_block_len(input).ok_or_else(|| {
            WebSocketError::MalformedHandshake("header block is not terminated".to_owned())
        })?;
        let input = std::str::from_utf8(&input[..len])
            .map_err(|err| WebSocketError::MalformedHandshake(err.to_string()))?;

        header_block(input)
            .map(|(_, block)| block)
            .map_err(|err| WebSocketError::MalformedHandshake(err.to_string()))
    }

    /// Looks a header up by name, ignoring ASCII case. The first occurrence wins.
    pub(crate) fn get(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

/// Returns the length of the header block at the start of `buf`, including the empty line
/// that terminates it, or `None` if the block is not complete yet.
///
/// Transports use it to know when to stop reading the handshake: the bytes past the returned
/// length already belong to the frame stream.
pub fn header_block_len(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// `true` if an `Upgrade` header value names the websocket protocol.
pub(crate) fn is_websocket_upgrade(value: Option<&str>) -> bool {
    value
        .map(|value| value.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// `true` if a `Connection` header value mentions `Upgrade`, in any case.
///
/// Browsers may send a list such as `keep-alive, Upgrade`.
pub(crate) fn is_connection_upgrade(value: Option<&str>) -> bool {
    value
        .map(|value| value.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false)
}

/// Parses a request line into `(method, target, version)`.
pub(crate) fn parse_request_line(line: &str) -> Result<(&str, &str, &str)> {
    request_line(line)
        .map(|(_, parts)| parts)
        .map_err(|err| WebSocketError::MalformedHandshake(err.to_string()))
}

/// Parses a status line into `(version, code, reason)`.
pub(crate) fn parse_status_line(line: &str) -> Result<(&str, u16, &str)> {
    status_line(line)
        .map(|(_, parts)| parts)
        .map_err(|err| WebSocketError::MalformedHandshake(err.to_string()))
}

/// Header name characters (RFC 9110 `tchar`).
fn is_token(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn line(input: &str) -> IResult<&str, &str> {
    terminated(take_until("\r\n"), tag("\r\n")).parse(input)
}

fn header(input: &str) -> IResult<&str, (&str, &str)> {
    // Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
    terminated(
        separated_pair(take_while1(is_token), (tag(":"), space0), take_until("\r\n")),
        tag("\r\n"),
    )
    .map(|(name, value): (&str, &str)| (name, value.trim()))
    .parse(input)
}

fn header_block(input: &str) -> IResult<&str, HeaderBlock<'_>> {
    (line, many0(header), tag("\r\n"))
        .map(|(start_line, headers, _)| HeaderBlock {
            start_line,
            headers,
        })
        .parse(input)
}

fn http_version(input: &str) -> IResult<&str, &str> {
    preceded(
        tag("HTTP/"),
        take_while1(|c: char| c.is_ascii_digit() || c == '.'),
    )
    .parse(input)
}

fn request_line(input: &str) -> IResult<&str, (&str, &str, &str)> {
    // GET /chat HTTP/1.1
    (
        terminated(take_while1(is_token), space1),
        terminated(take_till1(|c: char| c == ' '), space1),
        http_version,
    )
        .parse(input)
}

fn status_line(input: &str) -> IResult<&str, (&str, u16, &str)> {
    // HTTP/1.1 101 Switching Protocols
    (
        terminated(http_version, space1),
        terminated(map_res(digit1, |code: &str| code.parse::<u16>()), space0),
        rest,
    )
        .parse(input)
}
