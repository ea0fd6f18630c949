//! Per-direction record compression.
//!
//! Compression state is carried across records within one connection
//! direction: the deflate method keeps one `flate2` stream alive per
//! direction, so the first record emits the stream header and later
//! records continue the same dictionary. The processed-block counter makes
//! that first/subsequent distinction observable in tests.
//!
//! Selection is a pure function of `(version, method)`; the latest stream
//! revision always selects the null method regardless of negotiation.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use wringer_proto::{CompressionMethod, ProtocolVersion};

use crate::error::{CryptoError, Result};

/// Select the effective compression method for a direction.
///
/// Pure: no state is consulted. [`ProtocolVersion::V13`] forces
/// [`CompressionMethod::Null`] no matter what was negotiated.
#[must_use]
pub fn effective_method(version: ProtocolVersion, method: CompressionMethod) -> CompressionMethod {
    if version.forces_null_compression() { CompressionMethod::Null } else { method }
}

/// Send-direction compressor, one per connection direction.
pub enum Compressor {
    /// Pass-through
    Null,
    /// One deflate stream carried across records
    Deflate {
        /// Live flate2 stream state
        state: Box<Compress>,
        /// Records compressed so far on this stream
        blocks: u64,
    },
}

impl Compressor {
    /// Build a fresh compressor for `(version, method)`.
    #[must_use]
    pub fn select(version: ProtocolVersion, method: CompressionMethod) -> Self {
        match effective_method(version, method) {
            CompressionMethod::Null => Self::Null,
            CompressionMethod::Deflate => Self::Deflate {
                state: Box::new(Compress::new(Compression::default(), true)),
                blocks: 0,
            },
        }
    }

    /// Records processed since this compressor was built.
    ///
    /// Zero means the next call is the first block of the stream (the one
    /// that carries the stream header).
    #[must_use]
    pub fn blocks_processed(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Deflate { blocks, .. } => *blocks,
        }
    }

    /// Compress one record payload, advancing the stream state.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Null => Ok(input.to_vec()),
            Self::Deflate { state, blocks } => {
                let mut out = Vec::with_capacity(input.len() / 2 + 128);
                let start_in = state.total_in();
                loop {
                    let consumed = (state.total_in() - start_in) as usize;
                    let status = state
                        .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)
                        .map_err(|e| CryptoError::Compression(e.to_string()))?;
                    let consumed = (state.total_in() - start_in) as usize;
                    let flushed = consumed == input.len() && out.len() < out.capacity();
                    match status {
                        Status::StreamEnd => break,
                        Status::Ok | Status::BufError if flushed => break,
                        Status::Ok | Status::BufError => out.reserve(out.capacity().max(128)),
                    }
                }
                *blocks += 1;
                Ok(out)
            },
        }
    }
}

impl std::fmt::Debug for Compressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("Compressor::Null"),
            Self::Deflate { blocks, .. } => {
                f.debug_struct("Compressor::Deflate").field("blocks", blocks).finish()
            },
        }
    }
}

/// Receive-direction decompressor, one per connection direction.
pub enum Decompressor {
    /// Pass-through
    Null,
    /// One inflate stream carried across records
    Deflate {
        /// Live flate2 stream state
        state: Box<Decompress>,
        /// Records decompressed so far on this stream
        blocks: u64,
    },
}

impl Decompressor {
    /// Build a fresh decompressor for `(version, method)`.
    #[must_use]
    pub fn select(version: ProtocolVersion, method: CompressionMethod) -> Self {
        match effective_method(version, method) {
            CompressionMethod::Null => Self::Null,
            CompressionMethod::Deflate => {
                Self::Deflate { state: Box::new(Decompress::new(true)), blocks: 0 }
            },
        }
    }

    /// Records processed since this decompressor was built.
    #[must_use]
    pub fn blocks_processed(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Deflate { blocks, .. } => *blocks,
        }
    }

    /// Decompress one record payload, advancing the stream state.
    pub fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Null => Ok(input.to_vec()),
            Self::Deflate { state, blocks } => {
                let mut out = Vec::with_capacity(input.len() * 2 + 128);
                let start_in = state.total_in();
                loop {
                    let consumed = (state.total_in() - start_in) as usize;
                    let status = state
                        .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
                        .map_err(|e| CryptoError::Decompression(e.to_string()))?;
                    let consumed = (state.total_in() - start_in) as usize;
                    let flushed = consumed == input.len() && out.len() < out.capacity();
                    match status {
                        Status::StreamEnd => break,
                        Status::Ok | Status::BufError if flushed => break,
                        Status::Ok | Status::BufError => out.reserve(out.capacity().max(128)),
                    }
                }
                *blocks += 1;
                Ok(out)
            },
        }
    }
}

impl std::fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("Decompressor::Null"),
            Self::Deflate { blocks, .. } => {
                f.debug_struct("Decompressor::Deflate").field("blocks", blocks).finish()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn null_is_identity() {
        let mut c = Compressor::select(ProtocolVersion::V12, CompressionMethod::Null);
        let mut d = Decompressor::select(ProtocolVersion::V12, CompressionMethod::Null);
        let payload = b"hello".to_vec();
        assert_eq!(c.compress(&payload).unwrap(), payload);
        assert_eq!(d.decompress(&payload).unwrap(), payload);
    }

    #[test]
    fn latest_revision_forces_null() {
        let c = Compressor::select(ProtocolVersion::V13, CompressionMethod::Deflate);
        assert!(matches!(c, Compressor::Null));
        let d = Decompressor::select(ProtocolVersion::V13, CompressionMethod::Deflate);
        assert!(matches!(d, Decompressor::Null));
    }

    #[test]
    fn deflate_round_trip_single_block() {
        let mut c = Compressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);
        let mut d = Decompressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);

        let payload = vec![0x41u8; 300];
        let compressed = c.compress(&payload).unwrap();
        assert!(compressed.len() < payload.len());
        assert_eq!(d.decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn deflate_state_carries_across_blocks() {
        let mut c = Compressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);
        let mut d = Decompressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);

        let first = b"first record payload".to_vec();
        let second = b"second record payload".to_vec();

        let c1 = c.compress(&first).unwrap();
        assert_eq!(c.blocks_processed(), 1);
        let c2 = c.compress(&second).unwrap();
        assert_eq!(c.blocks_processed(), 2);

        // The second block continues the stream: it only inflates on the
        // decompressor that already consumed the first block.
        assert_eq!(d.decompress(&c1).unwrap(), first);
        assert_eq!(d.decompress(&c2).unwrap(), second);
        assert_eq!(d.blocks_processed(), 2);
    }

    #[test]
    fn second_block_alone_does_not_decompress() {
        let mut c = Compressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);
        let _ = c.compress(b"first").unwrap();
        let c2 = c.compress(b"second").unwrap();

        let mut fresh = Decompressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);
        assert!(fresh.decompress(&c2).is_err());
    }

    proptest! {
        #[test]
        fn deflate_symmetry(payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..4)) {
            let mut c = Compressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);
            let mut d = Decompressor::select(ProtocolVersion::V12, CompressionMethod::Deflate);

            for payload in payloads {
                let compressed = c.compress(&payload).unwrap();
                prop_assert_eq!(d.decompress(&compressed).unwrap(), payload);
            }
        }
    }
}
