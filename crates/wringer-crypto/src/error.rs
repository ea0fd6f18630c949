//! Error type for the record transform pipeline.

use thiserror::Error;

/// Failures while protecting or unprotecting a record payload.
///
/// Every variant is a *local* condition: it invalidates one record, not
/// the connection. The layer that ran the transform wraps the error into a
/// deviation; nothing here is allowed to surface as an index fault or a
/// panic, no matter how hostile the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Decryption produced zero bytes, so no padding length can exist.
    #[error("decrypted record is empty, cannot extract padding length")]
    EmptyPlaintext,

    /// The claimed padding does not fit the decrypted data.
    #[error("bad padding: claimed {claimed} bytes, {available} available")]
    BadPadding {
        /// Padding length byte read from the plaintext
        claimed: usize,
        /// Plaintext bytes available before the length byte
        available: usize,
    },

    /// Padding bytes do not all match the padding length byte.
    #[error("inconsistent padding bytes")]
    PaddingContent,

    /// Fewer bytes remain after unpadding than the MAC tag needs.
    #[error("record too short for MAC: need {needed} bytes, {available} remain")]
    MacTruncated {
        /// Tag length of the active MAC
        needed: usize,
        /// Bytes left after unpadding
        available: usize,
    },

    /// The record MAC did not verify.
    #[error("record MAC mismatch")]
    MacMismatch,

    /// AEAD encryption failed.
    #[error("record encryption failed")]
    EncryptFailed,

    /// AEAD decryption or tag verification failed.
    #[error("record decryption failed")]
    DecryptFailed,

    /// The compressor could not process the payload.
    #[error("compression failed: {0}")]
    Compression(String),

    /// The decompressor could not process the payload.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Key material had the wrong shape for the selected algorithm.
    #[error("invalid key material: {0}")]
    KeyMaterial(String),
}

/// Convenient Result type alias for transform operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
