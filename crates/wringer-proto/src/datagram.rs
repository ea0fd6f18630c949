//! Datagram-dialect record codec.
//!
//! Datagram records extend the stream header with an explicit epoch and a
//! 48-bit sequence number between version and length, because datagrams
//! arrive unordered and the receiver must reconstruct cipher-state scoping
//! from the wire. The fixed 13-byte prefix is additionally exposed as a
//! `zerocopy` view so a receiver can peek epoch and sequence for
//! demultiplexing without running the full codec.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::cursor::{Cursor, Writer};
use crate::errors::{ParseError, Result};
use crate::types::{ContentType, ProtocolVersion};

/// Mask for the 48-bit sequence number space.
pub const SEQUENCE_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// One datagram-dialect record.
///
/// Same override and bookkeeping semantics as
/// [`Record`](crate::record::Record); the additional `epoch` and
/// `sequence_number` fields are on the wire and scoped per cipher state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatagramRecord {
    /// Content type byte
    pub content_type: ContentType,
    /// Protocol version advertised in the header
    pub version: ProtocolVersion,
    /// Cipher-state epoch
    pub epoch: u16,
    /// 48-bit record sequence number within the epoch
    pub sequence_number: u64,
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

impl DatagramRecord {
    /// Header size on the wire: type (1) + version (2) + epoch (2) +
    /// sequence (6) + length (2).
    pub const HEADER_SIZE: usize = 13;

    /// Create a clean record around a payload.
    #[must_use]
    pub fn new(
        content_type: ContentType,
        version: ProtocolVersion,
        epoch: u16,
        sequence_number: u64,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            content_type,
            version,
            epoch,
            sequence_number: sequence_number & SEQUENCE_MASK,
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
                field: "datagram_record.length".into(),
                value: self.payload.len() as u64,
            }),
        }
    }

    /// The 64-bit MAC sequence field: epoch in the top 16 bits, sequence
    /// number in the low 48.
    #[must_use]
    pub fn scoped_sequence(&self) -> u64 {
        (u64::from(self.epoch) << 48) | (self.sequence_number & SEQUENCE_MASK)
    }

    /// Serialize header and payload.
    pub fn serialize(&self, writer: &mut Writer) -> Result<()> {
        let length = self.wire_length()?;
        writer.put_u8(self.content_type.to_byte());
        writer.put_slice(&self.version.to_bytes());
        writer.put_u16(self.epoch);
        writer.put_u48(self.sequence_number & SEQUENCE_MASK);
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
    pub fn parse_with_policy(cursor: &mut Cursor<'_>, throwing: bool) -> Result<Self> {
        let content_type = ContentType::from_byte(cursor.read_u8()?);
        let version_bytes = cursor.read_fixed(2)?;
        let version = ProtocolVersion::from_bytes([version_bytes[0], version_bytes[1]]);
        let epoch = cursor.read_u16()?;
        let sequence_number = cursor.read_u48()?;
        let length = cursor.read_u16()?;

        cursor.push_boundary(length as usize, "datagram-record", throwing);
        let payload = cursor.read_fixed(length as usize);
        let _ = cursor.pop_boundary()?;
        let payload = payload?;

        Ok(Self {
            content_type,
            version,
            epoch,
            sequence_number,
            length: Some(length),
            payload: Bytes::copy_from_slice(payload),
            mac: Bytes::new(),
            padding: Bytes::new(),
            padding_length: None,
        })
    }
}

/// Zero-copy view of the fixed 13-byte datagram record prefix.
///
/// All fields are raw big-endian byte arrays, so any 13-byte pattern is a
/// valid view and casting untrusted bytes cannot misbehave. Used for
/// epoch/sequence peeking before the full parse.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct DatagramPrefix {
    content_type: u8,
    version: [u8; 2],
    epoch: [u8; 2],
    sequence: [u8; 6],
    length: [u8; 2],
}

impl DatagramPrefix {
    /// Size of the prefix in bytes.
    pub const SIZE: usize = 13;

    /// View the prefix of a datagram without copying.
    pub fn peek(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(bytes)
            .map(|(prefix, _)| prefix)
            .map_err(|_| ParseError::EndOfStream { requested: Self::SIZE, available: bytes.len() })
    }

    /// Content type byte.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        ContentType::from_byte(self.content_type)
    }

    /// Protocol version.
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        ProtocolVersion::from_bytes(self.version)
    }

    /// Cipher-state epoch.
    #[must_use]
    pub fn epoch(&self) -> u16 {
        u16::from_be_bytes(self.epoch)
    }

    /// 48-bit sequence number.
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        let s = self.sequence;
        u64::from_be_bytes([0, 0, s[0], s[1], s[2], s[3], s[4], s[5]])
    }

    /// Declared payload length.
    #[must_use]
    pub fn declared_length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }
}

impl std::fmt::Debug for DatagramPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramPrefix")
            .field("content_type", &self.content_type())
            .field("version", &self.version())
            .field("epoch", &self.epoch())
            .field("sequence_number", &self.sequence_number())
            .field("declared_length", &self.declared_length())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    impl Arbitrary for DatagramRecord {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            (
                any::<u8>(),
                any::<u16>(),
                any::<u16>(),
                0u64..=SEQUENCE_MASK,
                prop::collection::vec(any::<u8>(), 0..512),
            )
                .prop_map(|(content_type, version, epoch, sequence, payload)| {
                    DatagramRecord::new(
                        ContentType::from_byte(content_type),
                        ProtocolVersion(version),
                        epoch,
                        sequence,
                        payload,
                    )
                })
                .boxed()
        }
    }

    proptest! {
        #[test]
        fn datagram_record_round_trip(record in any::<DatagramRecord>()) {
            let wire = record.to_wire().unwrap();
            let mut cursor = Cursor::new(&wire);
            let parsed = DatagramRecord::parse(&mut cursor).unwrap();

            prop_assert_eq!(parsed.content_type, record.content_type);
            prop_assert_eq!(parsed.version, record.version);
            prop_assert_eq!(parsed.epoch, record.epoch);
            prop_assert_eq!(parsed.sequence_number, record.sequence_number);
            prop_assert_eq!(&parsed.payload, &record.payload);
        }

        #[test]
        fn prefix_view_agrees_with_codec(record in any::<DatagramRecord>()) {
            let wire = record.to_wire().unwrap();
            let prefix = DatagramPrefix::peek(&wire).unwrap();

            prop_assert_eq!(prefix.epoch(), record.epoch);
            prop_assert_eq!(prefix.sequence_number(), record.sequence_number);
            prop_assert_eq!(prefix.declared_length() as usize, record.payload.len());
        }
    }

    #[test]
    fn prefix_size_matches_header() {
        assert_eq!(std::mem::size_of::<DatagramPrefix>(), DatagramRecord::HEADER_SIZE);
    }

    #[test]
    fn known_datagram_wire_image() {
        let record = DatagramRecord::new(
            ContentType::Handshake,
            ProtocolVersion::D12,
            1,
            7,
            vec![0xAB, 0xCD],
        );
        let wire = record.to_wire().unwrap();
        assert_eq!(hex::encode(wire), "16fefd00010000000000070002abcd");
    }

    #[test]
    fn scoped_sequence_packs_epoch_high() {
        let record =
            DatagramRecord::new(ContentType::Application, ProtocolVersion::D12, 2, 5, vec![]);
        assert_eq!(record.scoped_sequence(), (2u64 << 48) | 5);
    }

    #[test]
    fn truncated_datagram_is_end_of_stream() {
        let record =
            DatagramRecord::new(ContentType::Handshake, ProtocolVersion::D12, 0, 0, vec![0u8; 10]);
        let mut wire = record.to_wire().unwrap();
        wire.truncate(DatagramRecord::HEADER_SIZE + 4);

        let mut cursor = Cursor::new(&wire);
        let err = DatagramRecord::parse(&mut cursor).unwrap_err();
        assert_eq!(err, ParseError::EndOfStream { requested: 10, available: 4 });
    }

    #[test]
    fn prefix_peek_requires_full_header() {
        let err = DatagramPrefix::peek(&[0u8; 5]).unwrap_err();
        assert_eq!(err, ParseError::EndOfStream { requested: 13, available: 5 });
    }
}
