//! Wire-level identifiers shared by every dialect.
//!
//! These enums model on-wire bytes, not a validated protocol state: a
//! testing engine has to be able to carry values a conformant peer would
//! reject, so the record-level enums preserve unknown bytes as `Opaque`
//! instead of failing the parse. The negotiation-level enums
//! ([`CompressionMethod`], [`MacAlgorithm`], [`CipherKind`]) are closed:
//! they name the transforms this engine can actually instantiate.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Content type of a record.
///
/// Unknown values are preserved as [`ContentType::Opaque`] so adversarial
/// records round-trip bit-exactly through parse and serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// Cipher-state change signal
    ChangeCipher,
    /// Alert record
    Alert,
    /// Handshake messages
    Handshake,
    /// Application payload
    Application,
    /// Any value outside the assigned range, carried verbatim
    Opaque(u8),
}

impl ContentType {
    /// Wire byte for this content type.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::ChangeCipher => 20,
            Self::Alert => 21,
            Self::Handshake => 22,
            Self::Application => 23,
            Self::Opaque(value) => value,
        }
    }

    /// Decode a wire byte. Never fails.
    #[must_use]
    pub fn from_byte(value: u8) -> Self {
        match value {
            20 => Self::ChangeCipher,
            21 => Self::Alert,
            22 => Self::Handshake,
            23 => Self::Application,
            other => Self::Opaque(other),
        }
    }
}

/// A protocol version as it appears on the wire (two bytes, big-endian).
///
/// Versions are plain data: any value is representable, and comparisons on
/// the named constants decide which transforms apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// First stream revision.
    pub const V10: Self = Self(0x0301);
    /// Second stream revision.
    pub const V11: Self = Self(0x0302);
    /// Third stream revision.
    pub const V12: Self = Self(0x0303);
    /// Latest stream revision. Compression is forced to null here.
    pub const V13: Self = Self(0x0304);
    /// First datagram revision (ones-complement encoding of V11).
    pub const D10: Self = Self(0xFEFF);
    /// Second datagram revision (ones-complement encoding of V12).
    pub const D12: Self = Self(0xFEFD);

    /// The two wire bytes, big-endian.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Decode from two wire bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Whether this is a datagram-dialect version value.
    #[must_use]
    pub fn is_datagram(self) -> bool {
        (self.0 >> 8) == 0xFE
    }

    /// Whether this revision forces the null compression method.
    #[must_use]
    pub fn forces_null_compression(self) -> bool {
        self == Self::V13
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0x0301 => write!(f, "v1.0"),
            0x0302 => write!(f, "v1.1"),
            0x0303 => write!(f, "v1.2"),
            0x0304 => write!(f, "v1.3"),
            0xFEFF => write!(f, "d1.0"),
            0xFEFD => write!(f, "d1.2"),
            raw => write!(f, "{raw:#06x}"),
        }
    }
}

/// Negotiated compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CompressionMethod {
    /// Pass-through
    Null = 0,
    /// Stateful deflate stream per direction
    Deflate = 1,
}

/// Negotiated record MAC algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MacAlgorithm {
    /// No MAC appended
    Null = 0,
    /// HMAC over SHA-256, 32-byte tag
    HmacSha256 = 1,
    /// HMAC over SHA-384, 48-byte tag
    HmacSha384 = 2,
}

impl MacAlgorithm {
    /// Tag length in bytes.
    #[must_use]
    pub fn tag_len(self) -> usize {
        match self {
            Self::Null => 0,
            Self::HmacSha256 => 32,
            Self::HmacSha384 => 48,
        }
    }
}

/// Negotiated record cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CipherKind {
    /// Identity transform
    Null = 0,
    /// AEAD cipher, 16-byte tag, 12-byte per-record nonce
    ChaCha20Poly1305 = 1,
}

/// Handshake message kind.
///
/// Like [`ContentType`], unknown kinds are preserved as `Opaque` so a
/// malformed flight can be represented and replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandshakeKind {
    /// Server-initiated renegotiation request
    HelloRequest,
    /// Client's opening flight
    ClientHello,
    /// Server's opening flight
    ServerHello,
    /// Retry token for the datagram dialect
    HelloVerifyRequest,
    /// Certificate chain
    Certificate,
    /// Server key material
    ServerKeyExchange,
    /// Certificate request
    CertificateRequest,
    /// End of server flight
    ServerHelloDone,
    /// Client certificate proof
    CertificateVerify,
    /// Client key material
    ClientKeyExchange,
    /// Handshake integrity check
    Finished,
    /// Any unassigned kind, carried verbatim
    Opaque(u8),
}

impl HandshakeKind {
    /// Wire byte for this message kind.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::HelloRequest => 0,
            Self::ClientHello => 1,
            Self::ServerHello => 2,
            Self::HelloVerifyRequest => 3,
            Self::Certificate => 11,
            Self::ServerKeyExchange => 12,
            Self::CertificateRequest => 13,
            Self::ServerHelloDone => 14,
            Self::CertificateVerify => 15,
            Self::ClientKeyExchange => 16,
            Self::Finished => 20,
            Self::Opaque(value) => value,
        }
    }

    /// Decode a wire byte. Never fails.
    #[must_use]
    pub fn from_byte(value: u8) -> Self {
        match value {
            0 => Self::HelloRequest,
            1 => Self::ClientHello,
            2 => Self::ServerHello,
            3 => Self::HelloVerifyRequest,
            11 => Self::Certificate,
            12 => Self::ServerKeyExchange,
            13 => Self::CertificateRequest,
            14 => Self::ServerHelloDone,
            15 => Self::CertificateVerify,
            16 => Self::ClientKeyExchange,
            20 => Self::Finished,
            other => Self::Opaque(other),
        }
    }
}

/// Which of the three wire dialects a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Record-over-byte-stream
    Stream,
    /// Records with epoch and explicit sequence numbers over datagrams
    Datagram,
    /// Legacy handshake framing (2/3-byte headers, explicit padding byte)
    Legacy,
}
