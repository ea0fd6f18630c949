//! Wire formats for the Wringer protocol family.
//!
//! This crate is the parsing and serialization substrate of a
//! protocol-torture engine: it must decode anything a peer might send —
//! truncated, oversized, lying about its lengths — without ever faulting,
//! and it must encode anything a test wants to send, including records that
//! are wrong on purpose. Three dialects share the substrate: stream records
//! (5-byte header), datagram records (13-byte header with epoch and 48-bit
//! sequence number), and the legacy handshake framing (2/3-byte headers
//! with an explicit padding byte).
//!
//! Parsing is cursor-based rather than cast-based: every length-prefixed
//! structure pushes a boundary onto an explicit stack, and every read is
//! checked against the innermost budget first. Boundaries are configurable
//! per parse as throwing (reject the overrun) or logging (diagnose and
//! continue), because a fuzzing run must be able to keep reading past a
//! hostile length field.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod boundary;
pub mod cursor;
pub mod datagram;
pub mod errors;
pub mod legacy;
pub mod message;
pub mod packet;
pub mod record;
pub mod types;

pub use boundary::{Boundary, BoundaryStack};
pub use cursor::{Cursor, Writer};
pub use datagram::{DatagramPrefix, DatagramRecord, SEQUENCE_MASK};
pub use errors::{ParseError, Result};
pub use legacy::LegacyRecord;
pub use message::{Fragment, FragmentHeader, Message};
pub use packet::DatagramPacket;
pub use record::Record;
pub use types::{
    CipherKind, CompressionMethod, ContentType, Dialect, HandshakeKind, MacAlgorithm,
    ProtocolVersion,
};
