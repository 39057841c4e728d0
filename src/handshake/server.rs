//! Server side of the opening handshake.
use super::{headers, HandshakeRequest, HandshakeResponse, HeaderBlock, WEBSOCKET_VERSION};
use crate::{key, Result, WebSocketError};

/// Reply for requests that [`accept`] rejected. The connection should be closed after
/// writing it.
const BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request\r\n\
    Content-Type: text/plain\r\n\
    Connection: close\r\n\
    \r\n\
    This server only accepts WebSocket connections.";

/// Validates an upgrade request and builds the `101 Switching Protocols` response.
///
/// `request` must hold the complete header block (see
/// [`header_block_len`](super::header_block_len)). Headers may come in any order and their
/// names and the `Upgrade`/`Connection` values are matched regardless of case.
///
/// # Returns
/// The request as understood, and the response to write back. The response's
/// `Sec-WebSocket-Accept` is [`key::compute_accept_key`] of the request key.
///
/// # Errors
/// - [`WebSocketError::MalformedHandshake`] if the header block cannot be parsed.
/// - [`WebSocketError::InvalidMethod`] if the method is not `GET`.
/// - [`WebSocketError::InvalidUpgradeHeader`] / [`WebSocketError::InvalidConnectionHeader`] if
///   the request does not ask for a websocket upgrade.
/// - [`WebSocketError::MissingSecWebSocketKey`] if `Sec-WebSocket-Key` is absent or empty.
/// - [`WebSocketError::InvalidSecWebsocketVersion`] if `Sec-WebSocket-Version` is present and
///   not 13.
///
/// On any error the caller should write [`reject_response`] and close the connection.
pub fn accept(request: &[u8]) -> Result<(HandshakeRequest, HandshakeResponse)> {
    let result = negotiate(request);

    #[cfg(feature = "logging")]
    match &result {
        Ok((request, _)) => log::debug!("upgrade accepted for {}", request.resource),
        Err(err) => log::debug!("upgrade rejected: {err}"),
    }

    result
}

fn negotiate(request: &[u8]) -> Result<(HandshakeRequest, HandshakeResponse)> {
    let block = HeaderBlock::parse(request)?;
    let (method, resource, _) = headers::parse_request_line(block.start_line)?;

    if method != "GET" {
        return Err(WebSocketError::InvalidMethod(method.to_owned()));
    }

    if !headers::is_websocket_upgrade(block.get("Upgrade")) {
        return Err(WebSocketError::InvalidUpgradeHeader);
    }

    if !headers::is_connection_upgrade(block.get("Connection")) {
        return Err(WebSocketError::InvalidConnectionHeader);
    }

    let client_key = block
        .get("Sec-WebSocket-Key")
        .filter(|value| !value.is_empty())
        .ok_or(WebSocketError::MissingSecWebSocketKey)?;

    if let Some(version) = block.get("Sec-WebSocket-Version") {
        if version != WEBSOCKET_VERSION {
            return Err(WebSocketError::InvalidSecWebsocketVersion);
        }
    }

    let response = HandshakeResponse::switching_protocols(&key::compute_accept_key(client_key));
    let request = HandshakeRequest {
        resource: resource.to_owned(),
        host: block.get("Host").unwrap_or_default().to_owned(),
        key: client_key.to_owned(),
        version: WEBSOCKET_VERSION.to_owned(),
        origin: block.get("Origin").map(str::to_owned),
    };

    Ok((request, response))
}

/// The `400 Bad Request` reply for a request [`accept`] rejected.
pub fn reject_response() -> &'static str {
    BAD_REQUEST
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::{client::ClientHandshake, header_block_len};

    const RFC_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Origin: http://example.com\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    fn request_without(header: &str) -> Vec<u8> {
        let text = std::str::from_utf8(RFC_REQUEST).unwrap();
        text.split("\r\n")
            .filter(|line| !line.starts_with(header))
            .collect::<Vec<_>>()
            .join("\r\n")
            .into_bytes()
    }

    #[test]
    fn test_accepts_rfc_request() {
        let (request, response) = accept(RFC_REQUEST).unwrap();

        assert_eq!(request.resource, "/chat");
        assert_eq!(request.host, "server.example.com");
        assert_eq!(request.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(request.origin.as_deref(), Some("http://example.com"));

        assert_eq!(response.status, 101);
        assert_eq!(response.accept_key(), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert_eq!(
            response.to_string(),
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_accepts_request_followed_by_frame() {
        let mut raw = RFC_REQUEST.to_vec();
        raw.extend_from_slice(&[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]);

        let (request, response) = accept(&raw).unwrap();
        assert_eq!(request.resource, "/chat");
        assert_eq!(response.accept_key(), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = accept(&request_without("Sec-WebSocket-Key")).unwrap_err();
        assert!(matches!(err, WebSocketError::MissingSecWebSocketKey));
        assert!(err.is_handshake_rejection());
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let raw = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key:\r\n\r\n";
        assert!(matches!(
            accept(raw),
            Err(WebSocketError::MissingSecWebSocketKey)
        ));
    }

    #[test]
    fn test_key_is_trimmed() {
        let raw = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key:   dGhlIHNhbXBsZSBub25jZQ==   \r\n\r\n";
        let (request, response) = accept(raw).unwrap();

        assert_eq!(request.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(request.origin, None);
        assert_eq!(
            response.accept_key(),
            Some(key::compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==").as_str())
        );
    }

    #[test]
    fn test_not_an_upgrade() {
        assert!(matches!(
            accept(&request_without("Upgrade")),
            Err(WebSocketError::InvalidUpgradeHeader)
        ));
        assert!(matches!(
            accept(&request_without("Connection")),
            Err(WebSocketError::InvalidConnectionHeader)
        ));
        assert!(matches!(
            accept(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n"),
            Err(WebSocketError::InvalidUpgradeHeader)
        ));
    }

    #[test]
    fn test_header_case_is_folded() {
        let raw = b"GET / HTTP/1.1\r\n\
            sec-websocket-key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            CONNECTION: keep-alive, Upgrade\r\n\
            upgrade: WebSocket\r\n\
            \r\n";

        let (_, response) = accept(raw).unwrap();
        assert_eq!(response.accept_key(), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn test_wrong_version_and_method() {
        let raw = String::from_utf8(RFC_REQUEST.to_vec())
            .unwrap()
            .replace("Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 8");
        assert!(matches!(
            accept(raw.as_bytes()),
            Err(WebSocketError::InvalidSecWebsocketVersion)
        ));

        let raw = String::from_utf8(RFC_REQUEST.to_vec())
            .unwrap()
            .replace("GET", "POST");
        let err = accept(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, WebSocketError::InvalidMethod(ref method) if method == "POST"));
    }

    #[test]
    fn test_malformed_request() {
        let err = accept(b"\x16\x03\x01\x02\x00\r\n\r\n").unwrap_err();
        assert!(matches!(err, WebSocketError::MalformedHandshake(_)));
    }

    #[test]
    fn test_reject_response() {
        assert!(reject_response().starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(reject_response().contains("Connection: close\r\n"));
    }

    #[test]
    fn test_client_and_server_agree() {
        let client = ClientHandshake::new("localhost:9001", "/echo", &mut rand::thread_rng());
        let mut wire = client.request().to_string().into_bytes();
        wire.extend_from_slice(b"\x81\x80\x00\x00\x00\x00");

        let len = header_block_len(&wire).unwrap();
        let (request, response) = accept(&wire[..len]).unwrap();
        assert_eq!(&request, client.request());

        let answer = response.to_string();
        let verified = client.verify(answer.as_bytes()).unwrap();
        assert_eq!(verified.accept_key(), Some(client.expected_accept_key().as_str()));
    }
}
