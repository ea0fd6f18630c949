//! The per-direction record transform pipeline.
//!
//! Protecting a record is a fixed sequence: compress, MAC, pad, encrypt.
//! Unprotecting is the exact inverse: decrypt, unpad, split and verify the
//! MAC, decompress. Each stage's output is reported back to the caller so
//! a record's intermediate fields stay inspectable, and every defensive
//! edge case on the receive side fails with a distinct [`CryptoError`]
//! rather than an out-of-bounds access.

use wringer_proto::{CipherKind, CompressionMethod, MacAlgorithm, ProtocolVersion};

use crate::cipher::{PaddingScheme, RecordCipher, unpad};
use crate::compress::{Compressor, Decompressor};
use crate::error::{CryptoError, Result};
use crate::mac::RecordMac;
use crate::schedule::DirectionKeys;

/// The negotiated algorithm set one transform is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSuite {
    /// Compression method
    pub compression: CompressionMethod,
    /// Record MAC algorithm
    pub mac: MacAlgorithm,
    /// Record cipher
    pub cipher: CipherKind,
    /// Padding scheme (honored by padding-capable ciphers only)
    pub padding: PaddingScheme,
}

impl TransformSuite {
    /// The initial, unprotected state of every connection.
    #[must_use]
    pub fn plaintext() -> Self {
        Self {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::Null,
            cipher: CipherKind::Null,
            padding: PaddingScheme::None,
        }
    }
}

/// What the protect stage did to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protected {
    /// Final wire payload (output of the encrypt stage)
    pub payload: Vec<u8>,
    /// MAC tag that was appended
    pub mac: Vec<u8>,
    /// Padding bytes that were appended
    pub padding: Vec<u8>,
    /// Padding length byte, when padding applied
    pub padding_length: Option<u8>,
}

/// What the unprotect stage recovered from one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unprotected {
    /// Clean payload (output of the decompress stage)
    pub payload: Vec<u8>,
    /// MAC tag that was split off
    pub mac: Vec<u8>,
    /// Padding bytes that were stripped
    pub padding: Vec<u8>,
    /// Padding length byte, when padding applied
    pub padding_length: Option<u8>,
}

/// One direction's record transform: compression, MAC, padding, cipher.
///
/// The compressor state persists across records, so one `RecordTransform`
/// must only ever serve one direction of one connection.
#[derive(Debug)]
pub struct RecordTransform {
    compressor: Compressor,
    decompressor: Decompressor,
    mac: RecordMac,
    cipher: RecordCipher,
    padding: PaddingScheme,
}

impl RecordTransform {
    /// The identity transform every connection starts with.
    #[must_use]
    pub fn plaintext(version: ProtocolVersion) -> Self {
        Self {
            compressor: Compressor::select(version, CompressionMethod::Null),
            decompressor: Decompressor::select(version, CompressionMethod::Null),
            mac: RecordMac::Null,
            cipher: RecordCipher::Null,
            padding: PaddingScheme::None,
        }
    }

    /// Build a transform for a negotiated suite and one direction's keys.
    pub fn select(
        version: ProtocolVersion,
        suite: TransformSuite,
        keys: &DirectionKeys,
    ) -> Result<Self> {
        Ok(Self {
            compressor: Compressor::select(version, suite.compression),
            decompressor: Decompressor::select(version, suite.compression),
            mac: RecordMac::new(suite.mac, &keys.mac_key)?,
            cipher: RecordCipher::new(suite.cipher, &keys.cipher_key, &keys.iv)?,
            padding: suite.padding,
        })
    }

    /// MAC tag length of the active algorithm.
    #[must_use]
    pub fn mac_len(&self) -> usize {
        self.mac.tag_len()
    }

    /// Records compressed so far on this direction's stream.
    #[must_use]
    pub fn compressed_blocks(&self) -> u64 {
        self.compressor.blocks_processed()
    }

    /// Protect one clean payload: compress, MAC, pad, encrypt.
    pub fn protect(
        &mut self,
        scoped_sequence: u64,
        content_type: u8,
        version: u16,
        clean: &[u8],
    ) -> Result<Protected> {
        let compressed = self.compressor.compress(clean)?;

        let compressed_len =
            u16::try_from(compressed.len()).map_err(|_| CryptoError::Compression(
                format!("compressed payload of {} bytes exceeds record capacity", compressed.len()),
            ))?;
        let mac =
            self.mac.compute(scoped_sequence, content_type, version, compressed_len, &compressed)?;

        let mut assembled = compressed;
        assembled.extend_from_slice(&mac);

        let mut padding = Vec::new();
        let mut padding_length = None;
        if self.cipher.supports_padding() {
            if let Some((pad, length)) = self.padding.pad_for(assembled.len()) {
                assembled.extend_from_slice(&pad);
                assembled.push(length);
                padding = pad;
                padding_length = Some(length);
            }
        }

        let payload = self.cipher.encrypt(scoped_sequence, &assembled)?;
        Ok(Protected { payload, mac, padding, padding_length })
    }

    /// Unprotect one wire payload: decrypt, unpad, verify MAC, decompress.
    pub fn unprotect(
        &mut self,
        scoped_sequence: u64,
        content_type: u8,
        version: u16,
        wire: &[u8],
    ) -> Result<Unprotected> {
        let plaintext = self.cipher.decrypt(scoped_sequence, wire)?;

        let (after_pad, padding, padding_length) =
            if self.cipher.supports_padding() && self.padding != PaddingScheme::None {
                let (content, pad, length) = unpad(&plaintext)?;
                (content.to_vec(), pad.to_vec(), Some(length))
            } else {
                (plaintext, Vec::new(), None)
            };

        let mac_len = self.mac.tag_len();
        if after_pad.len() < mac_len {
            return Err(CryptoError::MacTruncated { needed: mac_len, available: after_pad.len() });
        }
        let (compressed, mac) = after_pad.split_at(after_pad.len() - mac_len);

        let compressed_len = u16::try_from(compressed.len())
            .map_err(|_| CryptoError::Decompression("compressed payload exceeds record capacity".to_owned()))?;
        self.mac.verify(scoped_sequence, content_type, version, compressed_len, compressed, mac)?;

        let payload = self.decompressor.decompress(compressed)?;
        Ok(Unprotected {
            payload,
            mac: mac.to_vec(),
            padding,
            padding_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use wringer_proto::{CipherKind, CompressionMethod, MacAlgorithm};

    use super::*;
    use crate::schedule::{KeyBlock, SessionSecrets};

    fn secrets() -> SessionSecrets {
        SessionSecrets {
            master_secret: [0xA5; 48],
            client_random: [0x01; 32],
            server_random: [0x02; 32],
        }
    }

    fn transform_pair(suite: TransformSuite) -> (RecordTransform, RecordTransform) {
        let block = KeyBlock::derive(&secrets(), suite.mac, suite.cipher).unwrap();
        let sender =
            RecordTransform::select(ProtocolVersion::V12, suite, &block.client).unwrap();
        let receiver =
            RecordTransform::select(ProtocolVersion::V12, suite, &block.client).unwrap();
        (sender, receiver)
    }

    fn all_suites() -> Vec<TransformSuite> {
        vec![
            TransformSuite::plaintext(),
            TransformSuite {
                compression: CompressionMethod::Deflate,
                mac: MacAlgorithm::HmacSha256,
                cipher: CipherKind::Null,
                padding: PaddingScheme::BlockAlign(16),
            },
            TransformSuite {
                compression: CompressionMethod::Null,
                mac: MacAlgorithm::HmacSha384,
                cipher: CipherKind::ChaCha20Poly1305,
                padding: PaddingScheme::None,
            },
            TransformSuite {
                compression: CompressionMethod::Deflate,
                mac: MacAlgorithm::HmacSha256,
                cipher: CipherKind::ChaCha20Poly1305,
                padding: PaddingScheme::None,
            },
        ]
    }

    #[test]
    fn full_round_trip_all_suites() {
        for suite in all_suites() {
            let (mut sender, mut receiver) = transform_pair(suite);
            for (seq, payload) in
                [b"first payload".to_vec(), b"second payload".to_vec(), Vec::new()]
                    .into_iter()
                    .enumerate()
            {
                let protected =
                    sender.protect(seq as u64, 22, 0x0303, &payload).unwrap();
                let unprotected = receiver
                    .unprotect(seq as u64, 22, 0x0303, &protected.payload)
                    .unwrap();

                assert_eq!(unprotected.payload, payload, "suite {suite:?}");
                assert_eq!(unprotected.mac, protected.mac);
                assert_eq!(unprotected.padding, protected.padding);
                assert_eq!(unprotected.padding_length, protected.padding_length);
            }
        }
    }

    #[test]
    fn mac_mismatch_on_tampered_payload() {
        let suite = TransformSuite {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::HmacSha256,
            cipher: CipherKind::Null,
            padding: PaddingScheme::None,
        };
        let (mut sender, mut receiver) = transform_pair(suite);

        let mut protected = sender.protect(0, 22, 0x0303, b"payload").unwrap();
        protected.payload[0] ^= 0xFF;

        assert_eq!(
            receiver.unprotect(0, 22, 0x0303, &protected.payload),
            Err(CryptoError::MacMismatch)
        );
    }

    #[test]
    fn empty_decryption_fails_padding_extraction() {
        let suite = TransformSuite {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::Null,
            cipher: CipherKind::Null,
            padding: PaddingScheme::BlockAlign(16),
        };
        let (_, mut receiver) = transform_pair(suite);
        assert_eq!(receiver.unprotect(0, 23, 0x0303, &[]), Err(CryptoError::EmptyPlaintext));
    }

    #[test]
    fn oversized_padding_claim_is_a_crypto_error() {
        let suite = TransformSuite {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::Null,
            cipher: CipherKind::Null,
            padding: PaddingScheme::BlockAlign(16),
        };
        let (_, mut receiver) = transform_pair(suite);
        // One content byte, then a padding length byte claiming 250
        assert_eq!(
            receiver.unprotect(0, 23, 0x0303, &[0x41, 250]),
            Err(CryptoError::BadPadding { claimed: 250, available: 1 })
        );
    }

    #[test]
    fn record_shorter_than_mac_is_a_crypto_error() {
        let suite = TransformSuite {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::HmacSha256,
            cipher: CipherKind::Null,
            padding: PaddingScheme::None,
        };
        let (_, mut receiver) = transform_pair(suite);
        assert_eq!(
            receiver.unprotect(0, 22, 0x0303, &[0u8; 5]),
            Err(CryptoError::MacTruncated { needed: 32, available: 5 })
        );
    }

    #[test]
    fn deflate_state_survives_the_pipeline() {
        let suite = TransformSuite {
            compression: CompressionMethod::Deflate,
            mac: MacAlgorithm::HmacSha256,
            cipher: CipherKind::ChaCha20Poly1305,
            padding: PaddingScheme::None,
        };
        let (mut sender, mut receiver) = transform_pair(suite);

        assert_eq!(sender.compressed_blocks(), 0);
        let p1 = sender.protect(0, 22, 0x0303, b"stateful one").unwrap();
        assert_eq!(sender.compressed_blocks(), 1);
        let p2 = sender.protect(1, 22, 0x0303, b"stateful two").unwrap();
        assert_eq!(sender.compressed_blocks(), 2);

        assert_eq!(receiver.unprotect(0, 22, 0x0303, &p1.payload).unwrap().payload, b"stateful one");
        assert_eq!(receiver.unprotect(1, 22, 0x0303, &p2.payload).unwrap().payload, b"stateful two");
    }

    proptest! {
        #[test]
        fn pipeline_round_trip_property(
            payload in prop::collection::vec(any::<u8>(), 0..768),
            seq in any::<u32>(),
        ) {
            let suite = TransformSuite {
                compression: CompressionMethod::Deflate,
                mac: MacAlgorithm::HmacSha256,
                cipher: CipherKind::ChaCha20Poly1305,
                padding: PaddingScheme::None,
            };
            let (mut sender, mut receiver) = transform_pair(suite);

            let protected = sender.protect(u64::from(seq), 23, 0x0303, &payload).unwrap();
            let unprotected =
                receiver.unprotect(u64::from(seq), 23, 0x0303, &protected.payload).unwrap();
            prop_assert_eq!(unprotected.payload, payload);
        }
    }
}
