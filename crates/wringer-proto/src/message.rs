//! Handshake message framing.
//!
//! Above the record layer, handshake data is framed as messages: a kind
//! byte, a 24-bit length, and the body. The datagram dialect additionally
//! sub-frames each message into fragments carrying a message sequence
//! number, a fragment offset, and a fragment length, because one message
//! may span several records and records may arrive out of order.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::errors::{ParseError, Result};
use crate::types::HandshakeKind;

/// One handshake message (stream dialect framing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind byte
    pub kind: HandshakeKind,
    /// Length override; `None` serializes the actual body length
    pub length: Option<u32>,
    /// Message body
    pub body: Bytes,
}

impl Message {
    /// Header size on the wire: kind (1) + length (3).
    pub const HEADER_SIZE: usize = 4;
    /// Maximum body length representable in the 24-bit length field.
    pub const MAX_LENGTH: u32 = 0x00FF_FFFF;

    /// Create a message around a body.
    #[must_use]
    pub fn new(kind: HandshakeKind, body: impl Into<Bytes>) -> Self {
        Self { kind, length: None, body: body.into() }
    }

    /// The length value that will be serialized.
    pub fn wire_length(&self) -> Result<u32> {
        match self.length {
            Some(value) => Ok(value),
            None => {
                let len = self.body.len();
                if len > Self::MAX_LENGTH as usize {
                    return Err(ParseError::InvalidLength {
                        field: "message.length".into(),
                        value: len as u64,
                    });
                }
                Ok(len as u32)
            },
        }
    }

    /// Serialize header and body.
    pub fn serialize(&self, writer: &mut Writer) -> Result<()> {
        writer.put_u8(self.kind.to_byte());
        writer.put_u24(self.wire_length()?);
        writer.put_slice(&self.body);
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Parse one message, enforcing the declared length as a throwing
    /// boundary.
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        Self::parse_with_policy(cursor, true)
    }

    /// Parse one message with an explicit boundary policy.
    pub fn parse_with_policy(cursor: &mut Cursor<'_>, throwing: bool) -> Result<Self> {
        let kind = HandshakeKind::from_byte(cursor.read_u8()?);
        let length = cursor.read_u24()?;

        cursor.push_boundary(length as usize, "message", throwing);
        let body = cursor.read_fixed(length as usize);
        let _ = cursor.pop_boundary()?;
        let body = body?;

        Ok(Self { kind, length: Some(length), body: Bytes::copy_from_slice(body) })
    }
}

/// Fragment bookkeeping for the datagram dialect's message sub-framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentHeader {
    /// Message sequence number within the handshake
    pub message_seq: u16,
    /// Byte offset of this fragment within the full message body
    pub fragment_offset: u32,
    /// Number of body bytes in this fragment
    pub fragment_length: u32,
}

/// One datagram-dialect handshake fragment.
///
/// Wire layout: kind (1), total message length (3), message_seq (2),
/// fragment_offset (3), fragment_length (3), then `fragment_length` body
/// bytes. A fragment whose offset + length exceeds the declared total is
/// rejected with [`ParseError::InvalidLength`] — out-of-range fragments
/// cannot be placed in any reassembly buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Message kind byte
    pub kind: HandshakeKind,
    /// Declared length of the complete message body
    pub total_length: u32,
    /// Fragment placement within the message
    pub header: FragmentHeader,
    /// Fragment body bytes
    pub body: Bytes,
}

impl Fragment {
    /// Header size on the wire: kind (1) + total length (3) + seq (2) +
    /// offset (3) + fragment length (3).
    pub const HEADER_SIZE: usize = 12;

    /// Create a fragment covering `body` at `offset` of a message of
    /// `total_length` bytes.
    #[must_use]
    pub fn new(
        kind: HandshakeKind,
        total_length: u32,
        message_seq: u16,
        fragment_offset: u32,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        let fragment_length = body.len() as u32;
        Self {
            kind,
            total_length,
            header: FragmentHeader { message_seq, fragment_offset, fragment_length },
            body,
        }
    }

    /// Whether this fragment alone covers its entire message.
    #[must_use]
    pub fn is_complete_message(&self) -> bool {
        self.header.fragment_offset == 0 && self.header.fragment_length == self.total_length
    }

    /// Serialize header and body.
    pub fn serialize(&self, writer: &mut Writer) -> Result<()> {
        writer.put_u8(self.kind.to_byte());
        writer.put_u24(self.total_length);
        writer.put_u16(self.header.message_seq);
        writer.put_u24(self.header.fragment_offset);
        writer.put_u24(self.header.fragment_length);
        writer.put_slice(&self.body);
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Parse one fragment, enforcing the declared fragment length as a
    /// throwing boundary.
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        Self::parse_with_policy(cursor, true)
    }

    /// Parse one fragment with an explicit boundary policy.
    pub fn parse_with_policy(cursor: &mut Cursor<'_>, throwing: bool) -> Result<Self> {
        let kind = HandshakeKind::from_byte(cursor.read_u8()?);
        let total_length = cursor.read_u24()?;
        let message_seq = cursor.read_u16()?;
        let fragment_offset = cursor.read_u24()?;
        let fragment_length = cursor.read_u24()?;

        if u64::from(fragment_offset) + u64::from(fragment_length) > u64::from(total_length) {
            return Err(ParseError::InvalidLength {
                field: "fragment.range".into(),
                value: u64::from(fragment_offset) + u64::from(fragment_length),
            });
        }

        cursor.push_boundary(fragment_length as usize, "fragment", throwing);
        let body = cursor.read_fixed(fragment_length as usize);
        let _ = cursor.pop_boundary()?;
        let body = body?;

        Ok(Self {
            kind,
            total_length,
            header: FragmentHeader { message_seq, fragment_offset, fragment_length },
            body: Bytes::copy_from_slice(body),
        })
    }
}
