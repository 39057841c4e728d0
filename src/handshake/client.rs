//! Client side of the opening handshake.
use rand::RngCore;
use url::Url;

use super::{headers, HandshakeRequest, HandshakeResponse, WEBSOCKET_VERSION};
use crate::{key, Result, WebSocketError};

/// An in-flight client handshake.
///
/// Holds the request, and so the key, of one connection attempt. A new attempt needs a new
/// `ClientHandshake`: keys are never reused.
///
/// # Example
/// ```rust
/// use wscodec::handshake::client::ClientHandshake;
///
/// let handshake = ClientHandshake::new("echo.websocket.org", "/", &mut rand::thread_rng());
/// let request = handshake.request().to_string();
/// assert!(request.starts_with("GET / HTTP/1.1\r\n"));
///
/// // the transport writes `request` and reads the answer
/// let answer = format!(
///     "HTTP/1.1 101 Switching Protocols\r\n\
///      Upgrade: websocket\r\n\
///      Connection: Upgrade\r\n\
///      Sec-WebSocket-Accept: {}\r\n\r\n",
///     handshake.expected_accept_key(),
/// );
/// handshake.verify(answer.as_bytes())?;
/// # Ok::<(), wscodec::WebSocketError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    request: HandshakeRequest,
}

impl ClientHandshake {
    /// Starts a handshake for `resource` on `host`, drawing the nonce from `rng`.
    ///
    /// The `Origin` header is set to `https://<host>`.
    pub fn new<R: RngCore + ?Sized>(
        host: impl Into<String>,
        resource: impl Into<String>,
        rng: &mut R,
    ) -> Self {
        let host = host.into();
        let origin = format!("https://{host}");

        Self {
            request: HandshakeRequest {
                resource: resource.into(),
                host,
                key: key::generate_key(rng),
                version: WEBSOCKET_VERSION.to_owned(),
                origin: Some(origin),
            },
        }
    }

    /// Starts a handshake for a `ws://` or `wss://` URL.
    ///
    /// The `Host` header carries the port only when the URL spells out a non-default one, and
    /// the resource keeps the query string.
    pub fn from_url<R: RngCore + ?Sized>(url: &Url, rng: &mut R) -> Result<Self> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(WebSocketError::InvalidHttpScheme);
        }

        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        let resource = &url[url::Position::BeforePath..url::Position::AfterQuery];

        Ok(Self::new(host, resource, rng))
    }

    /// The request to send.
    pub fn request(&self) -> &HandshakeRequest {
        &self.request
    }

    /// The `Sec-WebSocket-Key` sent with the request.
    pub fn key(&self) -> &str {
        &self.request.key
    }

    /// The `Sec-WebSocket-Accept` value a compliant server must answer with.
    pub fn expected_accept_key(&self) -> String {
        key::compute_accept_key(&self.request.key)
    }

    /// Validates the server's answer to the request.
    ///
    /// `response` must hold the complete header block (see
    /// [`header_block_len`](super::header_block_len)).
    ///
    /// # Errors
    /// - [`WebSocketError::InvalidStatusCode`] unless the status is 101.
    /// - [`WebSocketError::InvalidUpgradeHeader`] unless `Upgrade` is `websocket`, in any case.
    /// - [`WebSocketError::InvalidConnectionHeader`] unless `Connection` contains `Upgrade`, in
    ///   any case.
    /// - [`WebSocketError::InvalidAcceptKey`] if `Sec-WebSocket-Accept` is present but was not
    ///   derived from this handshake's key.
    /// - [`WebSocketError::MalformedHandshake`] if the header block cannot be parsed.
    pub fn verify(&self, response: &[u8]) -> Result<HandshakeResponse> {
        let response = HandshakeResponse::parse(response)?;
        self.check(&response).inspect_err(|_err| {
            #[cfg(feature = "logging")]
            log::debug!("handshake rejected by client: {_err}");
        })?;

        #[cfg(feature = "logging")]
        log::debug!("handshake with {} accepted", self.request.host);

        Ok(response)
    }

    fn check(&self, response: &HandshakeResponse) -> Result<()> {
        if response.status != 101 {
            return Err(WebSocketError::InvalidStatusCode(response.status));
        }

        if !headers::is_websocket_upgrade(response.header("Upgrade")) {
            return Err(WebSocketError::InvalidUpgradeHeader);
        }

        if !headers::is_connection_upgrade(response.header("Connection")) {
            return Err(WebSocketError::InvalidConnectionHeader);
        }

        match response.accept_key() {
            Some(accept) if accept != self.expected_accept_key() => {
                Err(WebSocketError::InvalidAcceptKey)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn handshake() -> ClientHandshake {
        ClientHandshake::new("example.com", "/chat", &mut StdRng::seed_from_u64(3))
    }

    fn response(status: &str, headers: &[(&str, &str)]) -> Vec<u8> {
        let mut out = format!("{status}\r\n");
        for (name, value) in headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        out.into_bytes()
    }

    mod request_tests {
        use super::*;

        #[test]
        fn test_request_headers() {
            let handshake = handshake();
            let wire = handshake.request().to_string();

            assert!(wire.starts_with("GET /chat HTTP/1.1\r\n"));
            assert!(wire.contains("Host: example.com\r\n"));
            assert!(wire.contains("Upgrade: websocket\r\n"));
            assert!(wire.contains("Connection: Upgrade\r\n"));
            assert!(wire.contains(&format!("Sec-WebSocket-Key: {}\r\n", handshake.key())));
            assert!(wire.contains("Sec-WebSocket-Version: 13\r\n"));
            assert!(wire.contains("Origin: https://example.com\r\n"));
            assert!(wire.ends_with("\r\n\r\n"));
        }

        #[test]
        fn test_key_is_a_16_byte_nonce() {
            let handshake = handshake();
            assert_eq!(key::decode_base64(handshake.key()).unwrap().len(), 16);
        }

        #[test]
        fn test_keys_differ_between_attempts() {
            let mut rng = rand::thread_rng();
            let a = ClientHandshake::new("example.com", "/", &mut rng);
            let b = ClientHandshake::new("example.com", "/", &mut rng);
            assert_ne!(a.key(), b.key());
        }

        #[test]
        fn test_from_url() {
            let mut rng = StdRng::seed_from_u64(9);

            let url: Url = "ws://localhost:8080/chat?room=1".parse().unwrap();
            let handshake = ClientHandshake::from_url(&url, &mut rng).unwrap();
            assert_eq!(handshake.request().host, "localhost:8080");
            assert_eq!(handshake.request().resource, "/chat?room=1");

            let url: Url = "wss://echo.websocket.org".parse().unwrap();
            let handshake = ClientHandshake::from_url(&url, &mut rng).unwrap();
            assert_eq!(handshake.request().host, "echo.websocket.org");
            assert_eq!(handshake.request().resource, "/");
            assert_eq!(
                handshake.request().origin.as_deref(),
                Some("https://echo.websocket.org")
            );

            let url: Url = "https://echo.websocket.org".parse().unwrap();
            assert!(matches!(
                ClientHandshake::from_url(&url, &mut rng),
                Err(WebSocketError::InvalidHttpScheme)
            ));
        }
    }

    mod verify_tests {
        use super::*;

        #[test]
        fn test_accepts_valid_response() {
            let handshake = handshake();
            let accept = handshake.expected_accept_key();
            let raw = response(
                "HTTP/1.1 101 Switching Protocols",
                &[
                    ("Upgrade", "websocket"),
                    ("Connection", "Upgrade"),
                    ("Sec-WebSocket-Accept", accept.as_str()),
                ],
            );

            let parsed = handshake.verify(&raw).unwrap();
            assert_eq!(parsed.accept_key(), Some(accept.as_str()));
        }

        #[test]
        fn test_accepts_response_followed_by_frame() {
            let handshake = handshake();
            let accept = handshake.expected_accept_key();
            let mut raw = response(
                "HTTP/1.1 101 Switching Protocols",
                &[
                    ("Upgrade", "websocket"),
                    ("Connection", "Upgrade"),
                    ("Sec-WebSocket-Accept", accept.as_str()),
                ],
            );
            // first server frame arrived in the same read
            raw.extend_from_slice(b"\x82\x02\xff\xfe");

            let parsed = handshake.verify(&raw).unwrap();
            assert_eq!(parsed.accept_key(), Some(accept.as_str()));
        }

        #[test]
        fn test_accepts_any_header_case_and_order() {
            let raw = response(
                "HTTP/1.1 101 Switching Protocols",
                &[
                    ("connection", "keep-alive, upgrade"),
                    ("Server", "test"),
                    ("upgrade", "WebSocket"),
                ],
            );

            assert!(handshake().verify(&raw).is_ok());
        }

        #[test]
        fn test_rejects_200_with_upgrade_headers() {
            let raw = response(
                "HTTP/1.1 200 OK",
                &[("Upgrade", "websocket"), ("Connection", "Upgrade")],
            );

            let err = handshake().verify(&raw).unwrap_err();
            assert!(matches!(err, WebSocketError::InvalidStatusCode(200)));
            assert!(err.is_handshake_rejection());
        }

        #[test]
        fn test_rejects_missing_upgrade() {
            let raw = response("HTTP/1.1 101 Switching Protocols", &[("Connection", "Upgrade")]);
            assert!(matches!(
                handshake().verify(&raw),
                Err(WebSocketError::InvalidUpgradeHeader)
            ));

            let raw = response(
                "HTTP/1.1 101 Switching Protocols",
                &[("Upgrade", "h2c"), ("Connection", "Upgrade")],
            );
            assert!(matches!(
                handshake().verify(&raw),
                Err(WebSocketError::InvalidUpgradeHeader)
            ));
        }

        #[test]
        fn test_rejects_missing_connection() {
            let raw = response(
                "HTTP/1.1 101 Switching Protocols",
                &[("Upgrade", "websocket"), ("Connection", "close")],
            );
            assert!(matches!(
                handshake().verify(&raw),
                Err(WebSocketError::InvalidConnectionHeader)
            ));
        }

        #[test]
        fn test_rejects_wrong_accept_key() {
            let raw = response(
                "HTTP/1.1 101 Switching Protocols",
                &[
                    ("Upgrade", "websocket"),
                    ("Connection", "Upgrade"),
                    ("Sec-WebSocket-Accept", "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="),
                ],
            );
            assert!(matches!(
                handshake().verify(&raw),
                Err(WebSocketError::InvalidAcceptKey)
            ));
        }

        #[test]
        fn test_rejects_garbage() {
            let err = handshake().verify(b"SSH-2.0-OpenSSH\r\n\r\n").unwrap_err();
            assert!(matches!(err, WebSocketError::MalformedHandshake(_)));
            assert!(err.is_handshake_rejection());
        }
    }
}
