//! Legacy handshake-dialect record codec.
//!
//! The oldest dialect frames records with a 2- or 3-byte header: when the
//! most significant bit of the first byte is set, the header is two bytes
//! and carries a 15-bit length with no padding; when clear, the header is
//! three bytes with a 14-bit length and an explicit padding-length byte.
//! The wire length counts payload plus padding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::errors::{ParseError, Result};

/// One legacy-dialect record.
///
/// `length` overrides the wire length when set; otherwise payload plus
/// padding length is written. A record with a declared length of zero is
/// rejected on parse — the legacy framing has no zero-length records, so a
/// zero there means a desynchronized or hostile peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRecord {
    /// Whether the short (2-byte, no padding) header form is used
    pub two_byte_header: bool,
    /// Length override; `None` serializes payload + padding length
    pub length: Option<u16>,
    /// Record payload
    pub payload: Bytes,
    /// Padding bytes (3-byte header form only)
    pub padding: Bytes,
}

impl LegacyRecord {
    /// Maximum length representable in the 2-byte header form.
    pub const MAX_TWO_BYTE_LENGTH: u16 = 0x7FFF;
    /// Maximum length representable in the 3-byte header form.
    pub const MAX_THREE_BYTE_LENGTH: u16 = 0x3FFF;

    /// Create an unpadded record with the short header form.
    #[must_use]
    pub fn unpadded(payload: impl Into<Bytes>) -> Self {
        Self { two_byte_header: true, length: None, payload: payload.into(), padding: Bytes::new() }
    }

    /// Create a padded record with the long header form.
    #[must_use]
    pub fn padded(payload: impl Into<Bytes>, padding: impl Into<Bytes>) -> Self {
        Self {
            two_byte_header: false,
            length: None,
            payload: payload.into(),
            padding: padding.into(),
        }
    }

    /// The length value that will be serialized.
    pub fn wire_length(&self) -> Result<u16> {
        match self.length {
            Some(value) => Ok(value),
            None => {
                let total = self.payload.len() + self.padding.len();
                let max = if self.two_byte_header {
                    Self::MAX_TWO_BYTE_LENGTH
                } else {
                    Self::MAX_THREE_BYTE_LENGTH
                };
                let value = u16::try_from(total).unwrap_or(u16::MAX);
                if value > max || total > usize::from(u16::MAX) {
                    return Err(ParseError::InvalidLength {
                        field: "legacy_record.length".into(),
                        value: total as u64,
                    });
                }
                Ok(value)
            },
        }
    }

    /// Serialize header, payload, and padding.
    pub fn serialize(&self, writer: &mut Writer) -> Result<()> {
        let length = self.wire_length()?;
        if self.two_byte_header {
            writer.put_u8(0x80 | (length >> 8) as u8);
            writer.put_u8((length & 0xFF) as u8);
        } else {
            writer.put_u8((length >> 8) as u8 & 0x3F);
            writer.put_u8((length & 0xFF) as u8);
            writer.put_u8(self.padding.len() as u8);
        }
        writer.put_slice(&self.payload);
        writer.put_slice(&self.padding);
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
    pub fn parse_with_policy(cursor: &mut Cursor<'_>, throwing: bool) -> Result<Self> {
        let first = cursor.read_u8()?;
        let two_byte_header = first & 0x80 != 0;

        let (length, padding_length) = if two_byte_header {
            let length = u16::from(first & 0x7F) << 8 | u16::from(cursor.read_u8()?);
            (length, 0usize)
        } else {
            let length = u16::from(first & 0x3F) << 8 | u16::from(cursor.read_u8()?);
            let padding_length = usize::from(cursor.read_u8()?);
            (length, padding_length)
        };

        if length == 0 {
            return Err(ParseError::InvalidLength { field: "legacy_record.length".into(), value: 0 });
        }
        if padding_length > usize::from(length) {
            return Err(ParseError::InvalidLength {
                field: "legacy_record.padding".into(),
                value: padding_length as u64,
            });
        }

        cursor.push_boundary(usize::from(length), "legacy-record", throwing);
        let body = cursor.read_fixed(usize::from(length));
        let _ = cursor.pop_boundary()?;
        let body = body?;

        let payload_len = usize::from(length) - padding_length;
        Ok(Self {
            two_byte_header,
            length: Some(length),
            payload: Bytes::copy_from_slice(&body[..payload_len]),
            padding: Bytes::copy_from_slice(&body[payload_len..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn unpadded_round_trip(payload in prop::collection::vec(any::<u8>(), 1..256)) {
            let record = LegacyRecord::unpadded(payload);
            let wire = record.to_wire().unwrap();
            let mut cursor = Cursor::new(&wire);
            let parsed = LegacyRecord::parse(&mut cursor).unwrap();

            prop_assert!(parsed.two_byte_header);
            prop_assert_eq!(&parsed.payload, &record.payload);
            prop_assert!(parsed.padding.is_empty());
        }

        #[test]
        fn padded_round_trip(
            payload in prop::collection::vec(any::<u8>(), 1..256),
            padding in prop::collection::vec(any::<u8>(), 0..16),
        ) {
            let record = LegacyRecord::padded(payload, padding);
            let wire = record.to_wire().unwrap();
            let mut cursor = Cursor::new(&wire);
            let parsed = LegacyRecord::parse(&mut cursor).unwrap();

            prop_assert!(!parsed.two_byte_header);
            prop_assert_eq!(&parsed.payload, &record.payload);
            prop_assert_eq!(&parsed.padding, &record.padding);
        }
    }

    #[test]
    fn short_header_sets_high_bit() {
        let record = LegacyRecord::unpadded(vec![0x01, 0x02]);
        let wire = record.to_wire().unwrap();
        assert_eq!(hex::encode(wire), "80020102");
    }

    #[test]
    fn long_header_carries_padding_byte() {
        let record = LegacyRecord::padded(vec![0x01], vec![0x00, 0x00]);
        let wire = record.to_wire().unwrap();
        // length = 3 (payload 1 + padding 2), padding byte = 2
        assert_eq!(hex::encode(wire), "000302010000");
    }

    #[test]
    fn zero_length_is_invalid() {
        let wire = [0x80, 0x00];
        let mut cursor = Cursor::new(&wire);
        let err = LegacyRecord::parse(&mut cursor).unwrap_err();
        assert_eq!(err, ParseError::InvalidLength { field: "legacy_record.length".into(), value: 0 });
    }

    #[test]
    fn padding_longer_than_record_is_invalid() {
        // 3-byte header: length 2, padding byte 5
        let wire = [0x00, 0x02, 0x05, 0xAA, 0xBB];
        let mut cursor = Cursor::new(&wire);
        let err = LegacyRecord::parse(&mut cursor).unwrap_err();
        assert!(matches!(err, ParseError::InvalidLength { ref field, .. } if field == "legacy_record.padding"));
    }

    #[test]
    fn truncated_body_is_end_of_stream() {
        let wire = [0x80, 0x08, 0xAA];
        let mut cursor = Cursor::new(&wire);
        let err = LegacyRecord::parse(&mut cursor).unwrap_err();
        assert_eq!(err, ParseError::EndOfStream { requested: 8, available: 1 });
    }
}
