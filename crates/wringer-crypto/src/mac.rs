//! Record MAC computation and verification.
//!
//! The MAC covers the scoped sequence number, the record header fields,
//! and the compressed payload:
//!
//! `seq(8) ‖ content_type(1) ‖ version(2) ‖ length(2) ‖ payload`
//!
//! where `length` is the compressed payload length and `seq` packs
//! `epoch(2) ‖ sequence(6)` for the datagram dialect. Verification is
//! constant-time via the `hmac` crate.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};
use wringer_proto::MacAlgorithm;

use crate::error::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;

/// Per-direction record MAC.
pub enum RecordMac {
    /// No MAC appended
    Null,
    /// HMAC-SHA256, 32-byte tag
    HmacSha256 {
        /// MAC key for this direction
        key: Vec<u8>,
    },
    /// HMAC-SHA384, 48-byte tag
    HmacSha384 {
        /// MAC key for this direction
        key: Vec<u8>,
    },
}

impl RecordMac {
    /// Build a MAC for the negotiated algorithm.
    pub fn new(algorithm: MacAlgorithm, key: &[u8]) -> Result<Self> {
        match algorithm {
            MacAlgorithm::Null => Ok(Self::Null),
            MacAlgorithm::HmacSha256 => Ok(Self::HmacSha256 { key: key.to_vec() }),
            MacAlgorithm::HmacSha384 => Ok(Self::HmacSha384 { key: key.to_vec() }),
        }
    }

    /// Tag length in bytes.
    #[must_use]
    pub fn tag_len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::HmacSha256 { .. } => MacAlgorithm::HmacSha256.tag_len(),
            Self::HmacSha384 { .. } => MacAlgorithm::HmacSha384.tag_len(),
        }
    }

    /// Compute the tag over one record.
    pub fn compute(
        &self,
        scoped_sequence: u64,
        content_type: u8,
        version: u16,
        length: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let header = mac_input_header(scoped_sequence, content_type, version, length);
        match self {
            Self::Null => Ok(Vec::new()),
            Self::HmacSha256 { key } => {
                let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
                mac.update(&header);
                mac.update(payload);
                Ok(mac.finalize().into_bytes().to_vec())
            },
            Self::HmacSha384 { key } => {
                let mut mac = <HmacSha384 as Mac>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
                mac.update(&header);
                mac.update(payload);
                Ok(mac.finalize().into_bytes().to_vec())
            },
        }
    }

    /// Verify a received tag in constant time.
    pub fn verify(
        &self,
        scoped_sequence: u64,
        content_type: u8,
        version: u16,
        length: u16,
        payload: &[u8],
        tag: &[u8],
    ) -> Result<()> {
        let header = mac_input_header(scoped_sequence, content_type, version, length);
        match self {
            Self::Null => {
                if tag.is_empty() { Ok(()) } else { Err(CryptoError::MacMismatch) }
            },
            Self::HmacSha256 { key } => {
                let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
                mac.update(&header);
                mac.update(payload);
                mac.verify_slice(tag).map_err(|_| CryptoError::MacMismatch)
            },
            Self::HmacSha384 { key } => {
                let mut mac = <HmacSha384 as Mac>::new_from_slice(key)
                    .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
                mac.update(&header);
                mac.update(payload);
                mac.verify_slice(tag).map_err(|_| CryptoError::MacMismatch)
            },
        }
    }
}

impl std::fmt::Debug for RecordMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("RecordMac::Null"),
            Self::HmacSha256 { .. } => f.write_str("RecordMac::HmacSha256"),
            Self::HmacSha384 { .. } => f.write_str("RecordMac::HmacSha384"),
        }
    }
}

fn mac_input_header(scoped_sequence: u64, content_type: u8, version: u16, length: u16) -> [u8; 13] {
    let mut header = [0u8; 13];
    header[..8].copy_from_slice(&scoped_sequence.to_be_bytes());
    header[8] = content_type;
    header[9..11].copy_from_slice(&version.to_be_bytes());
    header[11..13].copy_from_slice(&length.to_be_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn compute_then_verify() {
        let mac = RecordMac::new(MacAlgorithm::HmacSha256, KEY).unwrap();
        let tag = mac.compute(7, 22, 0x0303, 5, b"hello").unwrap();
        assert_eq!(tag.len(), 32);
        mac.verify(7, 22, 0x0303, 5, b"hello", &tag).unwrap();
    }

    #[test]
    fn sequence_number_is_bound() {
        let mac = RecordMac::new(MacAlgorithm::HmacSha256, KEY).unwrap();
        let tag = mac.compute(7, 22, 0x0303, 5, b"hello").unwrap();
        assert_eq!(mac.verify(8, 22, 0x0303, 5, b"hello", &tag), Err(CryptoError::MacMismatch));
    }

    #[test]
    fn header_fields_are_bound() {
        let mac = RecordMac::new(MacAlgorithm::HmacSha384, KEY).unwrap();
        let tag = mac.compute(1, 23, 0x0303, 3, b"abc").unwrap();
        assert_eq!(tag.len(), 48);
        assert_eq!(mac.verify(1, 22, 0x0303, 3, b"abc", &tag), Err(CryptoError::MacMismatch));
        assert_eq!(mac.verify(1, 23, 0x0302, 3, b"abc", &tag), Err(CryptoError::MacMismatch));
    }

    #[test]
    fn null_mac_is_empty() {
        let mac = RecordMac::new(MacAlgorithm::Null, &[]).unwrap();
        assert!(mac.compute(0, 22, 0x0303, 0, b"").unwrap().is_empty());
        mac.verify(0, 22, 0x0303, 0, b"", &[]).unwrap();
        assert_eq!(mac.verify(0, 22, 0x0303, 0, b"", &[1]), Err(CryptoError::MacMismatch));
    }
}
