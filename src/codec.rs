//! Frame encoding and decoding.
//!
//! [`encode`] and [`decode`] are pure functions over byte slices: they keep no state between
//! calls and never perform I/O. [`Codec`] wraps them into a `tokio_util` codec so a
//! [`Framed`](tokio_util::codec::Framed) transport can drive them over any byte stream.
use bytes::{Buf, BytesMut};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tokio_util::codec;

use crate::{
    frame::{self, Frame, OpCode, MAX_HEAD_SIZE},
    mask::apply_mask,
    Result, Role, WebSocketError,
};

/// The default maximum payload size accepted by [`Codec`], set to 1 MiB.
///
/// Frames declaring a larger payload are rejected as soon as their header is read, before any
/// payload is buffered.
pub const MAX_PAYLOAD_READ: usize = 1024 * 1024;

/// Outcome of decoding the start of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The buffer does not hold a whole frame yet. Read more bytes and retry.
    Incomplete,
    /// A text or binary frame. `consumed` is its size on the wire.
    Frame { frame: Frame, consumed: usize },
    /// The peer sent a close frame. The connection should be torn down.
    Close,
    /// A ping, pong, continuation or reserved frame. It carries nothing for the caller and is
    /// skipped by advancing `consumed` bytes.
    Ignored { opcode: OpCode, consumed: usize },
}

/// Encodes a final frame carrying `payload`.
///
/// When `masked` is set, a fresh 4-byte key is drawn from `rng` and the payload is XORed with
/// it, as required for frames sent by a client. The key is not kept anywhere once written.
pub fn encode<R: RngCore + ?Sized>(
    opcode: OpCode,
    payload: &[u8],
    masked: bool,
    rng: &mut R,
) -> BytesMut {
    let mask = masked.then(|| mask_key(rng));
    let mut dst = BytesMut::with_capacity(MAX_HEAD_SIZE + payload.len());
    write_frame(opcode, mask, payload, &mut dst);
    dst
}

/// Appends `frame` to `dst`, masked with the frame's own key if it has one.
///
/// The FIN bit is always written.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    write_frame(frame.opcode, frame.mask(), &frame.payload, dst);
}

fn write_frame(opcode: OpCode, mask: Option<[u8; 4]>, payload: &[u8], dst: &mut BytesMut) {
    let mut head = [0; MAX_HEAD_SIZE];
    let size = frame::fmt_head(opcode, mask, payload.len(), &mut head);

    dst.reserve(size + payload.len());
    dst.extend_from_slice(&head[..size]);

    let start = dst.len();
    dst.extend_from_slice(payload);
    if let Some(mask) = mask {
        apply_mask(&mut dst[start..], mask);
    }
}

fn mask_key<R: RngCore + ?Sized>(rng: &mut R) -> [u8; 4] {
    let mut key = [0u8; 4];
    rng.fill_bytes(&mut key);
    key
}

/// Decodes the frame at the start of `buf`, with no limit on the payload size.
///
/// See [`decode_with_limit`].
pub fn decode(buf: &[u8]) -> Result<Decoded> {
    decode_with_limit(buf, usize::MAX)
}

/// Decodes the frame at the start of `buf`.
///
/// Bytes after the first frame are left untouched; the returned `consumed` tells the caller
/// where the next frame begins.
///
/// # Returns
/// - `Ok(Decoded::Incomplete)` while the header or the payload is not fully buffered. A
///   partially received payload is never returned.
/// - `Ok(Decoded::Close)` as soon as the opcode nibble reads `0x8`, whatever the payload.
/// - `Ok(Decoded::Frame { .. })` for text and binary frames, unmasked.
/// - `Ok(Decoded::Ignored { .. })` for every other opcode.
/// - `Err(_)` if the frame is malformed: reserved bits set, a text/binary frame without FIN,
///   a 64-bit length with its top bit set or too large for `usize`, or a declared payload
///   above `max_payload`.
pub fn decode_with_limit(buf: &[u8], max_payload: usize) -> Result<Decoded> {
    if buf.len() < 2 {
        return Ok(Decoded::Incomplete);
    }

    let fin = buf[0] & 0b1000_0000 != 0;
    let opcode = OpCode::from(buf[0]);
    if opcode == OpCode::Close {
        return Ok(Decoded::Close);
    }

    if buf[0] & 0b0111_0000 != 0 {
        return Err(WebSocketError::ReservedBitsNotZero);
    }
    if opcode.is_data() && !fin {
        return Err(WebSocketError::FragmentedFrame);
    }

    let masked = buf[1] & 0b1000_0000 != 0;
    let length_code = buf[1] & 0x7F;

    let (payload_len, mut offset) = match length_code {
        126 => {
            if buf.len() < 4 {
                return Ok(Decoded::Incomplete);
            }
            (usize::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(Decoded::Incomplete);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[2..10]);
            let length = u64::from_be_bytes(raw);
            // RFC 6455: the most significant bit MUST be 0
            if length >> 63 != 0 {
                return Err(WebSocketError::PayloadLengthOverflow(length));
            }
            let length = usize::try_from(length)
                .map_err(|_| WebSocketError::PayloadLengthOverflow(length))?;
            (length, 10)
        }
        code => (usize::from(code), 2),
    };

    if payload_len > max_payload {
        return Err(WebSocketError::FrameTooLarge);
    }

    let mask = if masked {
        if buf.len() < offset + 4 {
            return Ok(Decoded::Incomplete);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    let consumed = offset
        .checked_add(payload_len)
        .ok_or(WebSocketError::PayloadLengthOverflow(payload_len as u64))?;
    if buf.len() < consumed {
        return Ok(Decoded::Incomplete);
    }

    if !opcode.is_data() {
        return Ok(Decoded::Ignored { opcode, consumed });
    }

    let mut payload = BytesMut::from(&buf[offset..consumed]);
    if let Some(mask) = mask {
        apply_mask(&mut payload, mask);
    }

    Ok(Decoded::Frame {
        frame: Frame::new(true, opcode, mask, payload.freeze()),
        consumed,
    })
}

/// An item produced by [`Codec`] when decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text or binary frame.
    Frame(Frame),
    /// The peer closed the connection. No further items follow.
    Close,
}

/// A `tokio_util` codec that reads and writes single WebSocket frames.
///
/// The codec applies the role-based masking rule on output: a [`Role::Client`] codec masks
/// every frame with a fresh key drawn from its random source, a [`Role::Server`] codec never
/// masks. On input it skips ignored opcodes and stops producing items after a close frame.
///
/// # Example
/// ```rust
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use wscodec::{codec::{Codec, Incoming}, Frame, Role};
///
/// let mut client = Codec::new(Role::Client);
/// let mut server = Codec::new(Role::Server).with_max_payload_read(64 * 1024);
///
/// let mut wire = BytesMut::new();
/// client.encode(Frame::text("hi"), &mut wire)?;
///
/// match server.decode(&mut wire)? {
///     Some(Incoming::Frame(frame)) => assert_eq!(frame.as_str(), Some("hi")),
///     other => panic!("unexpected {other:?}"),
/// }
/// # Ok::<(), wscodec::WebSocketError>(())
/// ```
#[derive(Debug)]
pub struct Codec<R = StdRng> {
    role: Role,
    /// Maximum allowed size for a frame payload.
    max_payload_read: usize,
    /// Source of mask keys for client frames.
    rng: R,
    /// Set once a close frame has been decoded.
    closed: bool,
}

impl Codec {
    /// Creates a codec for `role` with [`MAX_PAYLOAD_READ`] as payload limit and an
    /// entropy-seeded random source.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            max_payload_read: MAX_PAYLOAD_READ,
            rng: StdRng::from_entropy(),
            closed: false,
        }
    }
}

impl<R> Codec<R> {
    /// Sets the maximum payload size accepted when decoding.
    pub fn with_max_payload_read(self, size: usize) -> Self {
        Self {
            max_payload_read: size,
            ..self
        }
    }

    /// Replaces the random source used for mask keys.
    pub fn with_rng<T: RngCore>(self, rng: T) -> Codec<T> {
        Codec {
            role: self.role,
            max_payload_read: self.max_payload_read,
            rng,
            closed: self.closed,
        }
    }

    /// The role this codec encodes for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` once a close frame has been decoded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<R> codec::Decoder for Codec<R> {
    type Item = Incoming;
    type Error = WebSocketError;

    /// Decodes the next text, binary or close frame from `src`.
    ///
    /// # Returns
    /// - `Ok(Some(Incoming))` when a frame is complete; its bytes are removed from `src`.
    /// - `Ok(None)` when more data is needed, or after the connection was closed.
    /// - `Err(WebSocketError)` if the frame is malformed.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            if self.closed {
                src.clear();
                return Ok(None);
            }

            match decode_with_limit(&src[..], self.max_payload_read)? {
                Decoded::Incomplete => return Ok(None),
                Decoded::Frame { frame, consumed } => {
                    src.advance(consumed);
                    return Ok(Some(Incoming::Frame(frame)));
                }
                Decoded::Close => {
                    #[cfg(feature = "logging")]
                    log::debug!("{} received close frame", self.role);

                    self.closed = true;
                    src.clear();
                    return Ok(Some(Incoming::Close));
                }
                Decoded::Ignored {
                    opcode: _opcode,
                    consumed,
                } => {
                    #[cfg(feature = "logging")]
                    log::debug!("{} skipping {:?} frame ({consumed} bytes)", self.role, _opcode);

                    src.advance(consumed);
                }
            }
        }
    }
}

impl<R: RngCore> codec::Encoder<Frame> for Codec<R> {
    type Error = WebSocketError;

    /// Encodes `frame` into `dst` following the role's masking rule.
    ///
    /// Any mask key already on `frame` is discarded: a client draws a fresh key for every
    /// frame it writes.
    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let mask = match self.role {
            Role::Client => Some(mask_key(&mut self.rng)),
            Role::Server => None,
        };
        write_frame(frame.opcode, mask, &frame.payload, dst);

        Ok(())
    }
}
