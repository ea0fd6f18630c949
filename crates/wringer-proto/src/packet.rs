//! Generic datagram packet.
//!
//! Datagram transports deliver opaque packets with no framing of their
//! own: one transport read, one packet. Records are parsed *out of* a
//! packet's payload; whatever does not parse stays addressable as raw
//! bytes, which is exactly what a deviation wants to capture.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::errors::Result;

/// One datagram as it came off the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DatagramPacket {
    /// The packet's bytes, verbatim
    pub payload: Bytes,
}

impl DatagramPacket {
    /// Wrap one transport read.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into() }
    }

    /// Packet size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the packet carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serialize the packet (raw passthrough).
    pub fn serialize(&self, writer: &mut Writer) -> Result<()> {
        writer.put_slice(&self.payload);
        Ok(())
    }

    /// Serialize into a fresh byte vector.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Parse a packet: everything the cursor still has, boundary-checked.
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self> {
        let body = cursor.read_fixed(cursor.remaining())?;
        Ok(Self { payload: Bytes::copy_from_slice(body) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ParseError;

    #[test]
    fn packet_takes_all_remaining_bytes() {
        let mut cursor = Cursor::new(&[1, 2, 3, 4]);
        let packet = DatagramPacket::parse(&mut cursor).unwrap();
        assert_eq!(packet.payload.as_ref(), &[1, 2, 3, 4]);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn empty_packet_is_valid() {
        let mut cursor = Cursor::new(&[]);
        let packet = DatagramPacket::parse(&mut cursor).unwrap();
        assert!(packet.is_empty());
    }

    #[test]
    fn packet_respects_boundaries() {
        let mut cursor = Cursor::new(&[1, 2, 3, 4]);
        cursor.push_boundary(2, "packet", true);
        let err = DatagramPacket::parse(&mut cursor).unwrap_err();
        assert!(matches!(err, ParseError::BoundaryExceeded { ref qualifier, .. } if qualifier == "packet"));
    }

    #[test]
    fn round_trip() {
        let packet = DatagramPacket::new(vec![9, 8, 7]);
        let wire = packet.to_wire().unwrap();
        let mut cursor = Cursor::new(&wire);
        assert_eq!(DatagramPacket::parse(&mut cursor).unwrap(), packet);
    }
}
