//! Stream-dialect record codec.
//!
//! A record is the on-wire unit of the stream dialect: a 5-byte header
//! (content type, version, length) followed by exactly `length` payload
//! bytes. The struct keeps every field independently settable so a test can
//! serialize records that lie about any of them, and it carries the
//! transform bookkeeping (`mac`, `padding`, `padding_length`) so each
//! intermediate stage of protection is inspectable after the fact.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::errors::{ParseError, Result};
use crate::types::{ContentType, ProtocolVersion};

/// One stream-dialect record.
///
/// # Invariants
///
/// - On parse, exactly the declared `length` bytes are consumed as payload;
///   a declared length exceeding the available bytes surfaces
///   [`ParseError::EndOfStream`] or [`ParseError::BoundaryExceeded`], never
///   an index fault.
/// - On serialize, the written length equals the payload length unless the
///   `length` field has been explicitly overridden — this is a testing
///   tool, and lying headers are a feature.
///
/// `mac`, `padding` and `padding_length` are not serialized separately;
/// after protection they are part of `payload`. They record what the
/// transform pipeline did so a test can assert on each stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Content type byte
    pub content_type: ContentType,
    /// Protocol version advertised in the header
    pub version: ProtocolVersion,
    /// Length override; `None` serializes the actual payload length
    pub length: Option<u16>,
    /// Record payload (clean before protection, transformed after)
    pub payload: Bytes,
    /// MAC appended by the transform pipeline, if any
    pub mac: Bytes,
    /// Padding appended by the transform pipeline, if any
    pub padding: Bytes,
    /// Padding length byte recorded by the transform pipeline
    pub padding_length: Option<u8>,
}

impl Record {
    /// Header size on the wire: type (1) + version (2) + length (2).
    pub const HEADER_SIZE: usize = 5;

    /// Create a clean record around a payload.
    #[must_use]
    pub fn new(
        content_type: ContentType,
        version: ProtocolVersion,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            content_type,
            version,
            length: None,
            payload: payload.into(),
            mac: Bytes::new(),
            padding: Bytes::new(),
            padding_length: None,
        }
    }

    /// The length value that will be serialized.
    pub fn wire_length(&self) -> Result<u16> {
        match self.length {
            Some(value) => Ok(value),
            None => u16::try_from(self.payload.len()).map_err(|_| ParseError::InvalidLength {
                field: "record.length".into(),
                value: self.payload.len() as u64,
            }),
        }
    }

    /// Serialize header and payload.
    ///
    /// All payload bytes are written even when the length field lies; the
    /// receiving side's reaction to the mismatch is exactly what a torture
    /// trace wants to observe.
    pub fn serialize(&self, writer: &mut Writer) -> Result<()> {
        let length = self.wire_length()?;
        writer.put_u8(self.content_type.to_byte());
        writer.put_slice(&self.version.to_bytes());
        writer.put_u16(length);
        writer.put_slice(&self.payload);
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Parse one record, enforcing the declared length as a throwing
    /// boundary.
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        Self::parse_with_policy(cursor, true)
    }

    /// Parse one record with an explicit boundary policy.
    ///
    /// With `throwing = false` a lying outer length still yields
    /// `EndOfStream` when the source is exhausted, but overruns of
    /// enclosing boundaries are logged instead of raised.
    pub fn parse_with_policy(cursor: &mut Cursor<'_>, throwing: bool) -> Result<Self> {
        let content_type = ContentType::from_byte(cursor.read_u8()?);
        let version_bytes = cursor.read_fixed(2)?;
        let version = ProtocolVersion::from_bytes([version_bytes[0], version_bytes[1]]);
        let length = cursor.read_u16()?;

        cursor.push_boundary(length as usize, "record", throwing);
        let payload = cursor.read_fixed(length as usize);
        // Pop before propagating so a failed parse leaves the stack balanced.
        let leftover = cursor.pop_boundary()?;
        let payload = payload?;
        debug_assert_eq!(leftover, 0);

        Ok(Self {
            content_type,
            version,
            length: Some(length),
            payload: Bytes::copy_from_slice(payload),
            mac: Bytes::new(),
            padding: Bytes::new(),
            padding_length: None,
        })
    }
}
