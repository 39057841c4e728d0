//! Key derivation for the opening handshake.
//!
//! The client sends a random 16-byte nonce, base64 encoded, as `Sec-WebSocket-Key`. The server
//! proves it understood the upgrade by answering with `Sec-WebSocket-Accept`, the base64 of the
//! SHA-1 digest of that key concatenated with [`MAGIC_GUID`]
//! ([RFC 6455 Section 4.2.2](https://datatracker.ietf.org/doc/html/rfc6455#section-4.2.2)).
//!
//! Randomness is always injected through [`rand::RngCore`], so tests can replace it with a
//! deterministic generator such as `rand::rngs::mock::StepRng`.
use base64::prelude::*;
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::Result;

/// GUID appended to the client key before hashing.
pub const MAGIC_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Size in bytes of the handshake nonce.
pub const NONCE_LEN: usize = 16;

/// Generates a fresh 16-byte handshake nonce from `rng`.
pub fn generate_nonce<R: RngCore + ?Sized>(rng: &mut R) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// Generates a `Sec-WebSocket-Key` value: the base64 of a fresh nonce.
pub fn generate_key<R: RngCore + ?Sized>(rng: &mut R) -> String {
    encode_base64(generate_nonce(rng))
}

/// Encodes `input` with the standard RFC 4648 alphabet and `=` padding.
#[inline]
pub fn encode_base64(input: impl AsRef<[u8]>) -> String {
    BASE64_STANDARD.encode(input)
}

/// Decodes a standard, padded base64 string.
pub fn decode_base64(input: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    Ok(BASE64_STANDARD.decode(input)?)
}

/// Computes the SHA-1 digest of `input`.
pub fn sha1_digest(input: impl AsRef<[u8]>) -> [u8; 20] {
    let mut digest = [0u8; 20];
    digest.copy_from_slice(&Sha1::digest(input));
    digest
}

/// Derives the `Sec-WebSocket-Accept` value for a client key.
///
/// The key is used verbatim, it is not base64-decoded first.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(client_key.as_bytes());
    sha1.update(MAGIC_GUID.as_bytes());
    encode_base64(sha1.finalize())
}
