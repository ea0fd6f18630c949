//! Error types for wire parsing and serialization.
//!
//! All errors are structured, testable, and carry the numbers a test or an
//! analysis tool needs to reconstruct what the parser saw. None of them is
//! fatal by itself: the layer that triggered the parse decides severity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the cursor, the boundary stack, and the record codecs.
///
/// The taxonomy is deliberately small and stable, because higher layers
/// match on it to classify peer behavior:
///
/// - [`ParseError::EndOfStream`] — the source ran out before the requested
///   length. Distinct from a boundary violation: the bytes simply are not
///   there.
/// - [`ParseError::BoundaryExceeded`] — a nested length budget was violated
///   while more bytes were still available underneath it.
/// - [`ParseError::InvalidLength`] — a length field whose value is not
///   usable (zero where the encoding requires at least one byte, or
///   internally inconsistent).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseError {
    /// The input ended before the requested number of bytes was available.
    #[error("end of stream: requested {requested} bytes, {available} available")]
    EndOfStream {
        /// Bytes the caller asked for
        requested: usize,
        /// Bytes actually left in the source
        available: usize,
    },

    /// A read would cross the innermost active length boundary.
    #[error("boundary '{qualifier}' exceeded: requested {requested} bytes, budget {available}")]
    BoundaryExceeded {
        /// Human label of the violated boundary
        qualifier: String,
        /// Bytes the caller asked for
        requested: usize,
        /// Remaining budget of the boundary
        available: usize,
    },

    /// A length field is malformed (zero where the encoding requires data,
    /// or inconsistent with its container).
    #[error("invalid length in {field}: {value}")]
    InvalidLength {
        /// Name of the offending field
        field: String,
        /// The value that was rejected
        value: u64,
    },

    /// A delimiter search ran off the end of the input.
    #[error("delimiter {delimiter:#04x} not found in remaining {available} bytes")]
    DelimiterNotFound {
        /// The byte that was searched for
        delimiter: u8,
        /// Bytes that were scanned without a match
        available: usize,
    },

    /// Bytes were left over after a structure that must consume its input
    /// exactly.
    #[error("{count} trailing bytes after {context}")]
    TrailingBytes {
        /// Number of unconsumed bytes
        count: usize,
        /// What was being parsed
        context: String,
    },

    /// The boundary stack was popped while empty.
    #[error("boundary stack underflow")]
    BoundaryUnderflow,
}

/// Convenient Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, ParseError>;
