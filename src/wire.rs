//! Byte layout of one framed message: start sequence, length, id, type, payload.

use bytes::{BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicU16, Ordering};

/// 4-byte magic marking the start of a frame, big-endian `0xF000000F`.
///
/// Earlier iterations of this protocol used `0x00000000`; the final one
/// deliberately breaks compatibility with those in favour of this value.
pub const START_SEQUENCE: [u8; 4] = [0xF0, 0x00, 0x00, 0x0F];

/// Size of the fixed header: START_SEQUENCE(4) + LENGTH(4) + ID(2) + TYPE(1).
pub const HEADER_LEN: usize = 11;

/// The message kind carried in the TYPE byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MessageType {
    Request = 0x00,
    Ping = 0x01,
    Reply = 0xFE,
    Error = 0xFF,
}

impl MessageType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Request),
            0x01 => Some(Self::Ping),
            0xFE => Some(Self::Reply),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }
}

/// Monotonic, wrapping allocator for outbound request/ping ids.
#[derive(Debug, Default)]
pub struct IdAllocator(AtomicU16);

impl IdAllocator {
    pub const fn new() -> Self {
        Self(AtomicU16::new(0))
    }

    /// Returns the next id, wrapping at 2^16.
    pub fn next_id(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// An immutable, cheaply-cloneable view over a framed buffer.
///
/// `Bytes` keeps this zero-copy: slicing a parsed chunk into a Message never
/// re-allocates the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    buf: Bytes,
}

impl Message {
    /// Builds a new framed message around `payload`, allocating a fresh buffer.
    pub fn create(payload: &[u8], ty: MessageType, id: u16) -> Self {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
        buf.put_slice(&START_SEQUENCE);
        buf.put_u32(payload.len() as u32);
        buf.put_u16(id);
        buf.put_u8(ty.as_u8());
        buf.put_slice(payload);
        Self { buf: buf.freeze() }
    }

    /// Wraps an already-framed, already-validated buffer. Used internally by
    /// the parser once it has confirmed `buf.len() == HEADER_LEN + length`.
    pub(crate) fn from_framed(buf: Bytes) -> Self {
        debug_assert!(buf.len() >= HEADER_LEN);
        Self { buf }
    }

    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.buf[8], self.buf[9]])
    }

    /// The raw TYPE byte, preserved even if it doesn't map to a known variant.
    pub fn type_byte(&self) -> u8 {
        self.buf[10]
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.type_byte())
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_LEN..]
    }

    /// Interprets the payload as UTF-8 text, as used for ERROR payloads.
    pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.payload())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf
    }
}
