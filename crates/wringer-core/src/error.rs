//! Error and deviation types for the layer stack.
//!
//! The severity split is the heart of this engine: transport failures kill
//! the connection and therefore the running trace, while parse and crypto
//! failures only invalidate the unit they occurred in. The latter are
//! wrapped into a [`Deviation`] naming the layer that hit them, together
//! with the raw bytes involved, and travel *upward as data* — the layer
//! above (ultimately the execution engine) decides what they mean.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wringer_proto::ParseError;

/// Fatal connection-level failures.
///
/// Any of these aborts the remainder of the running trace. They are never
/// downgraded to deviations.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// The configured receive timeout elapsed without data.
    #[error("receive timed out")]
    Timeout,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// An I/O failure on the underlying socket.
    #[error("transport I/O error: {message}")]
    Io {
        /// Stringified cause
        message: String,
    },

    /// A layer tried to reach below the bottom of the stack.
    #[error("no layer below to delegate to")]
    NoLowerLayer,
}

impl TransportError {
    /// Wrap a std I/O error, classifying timeouts and closures.
    #[must_use]
    pub fn from_io(error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Self::Timeout,
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => Self::Closed,
            _ => Self::Io { message: error.to_string() },
        }
    }
}

/// What went wrong inside a deviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationKind {
    /// A codec rejected the bytes.
    Parse(ParseError),
    /// The transform pipeline rejected the record.
    Crypto(String),
    /// The unit was structurally valid but not what the caller declared.
    Unexpected(String),
}

impl std::fmt::Display for DeviationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::Unexpected(e) => write!(f, "unexpected: {e}"),
        }
    }
}

/// A non-fatal processing failure, attributed to one layer.
///
/// Deviations keep the raw bytes that provoked them so a failed exchange
/// stays reconstructible after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    /// Name of the layer that hit the failure
    pub layer: String,
    /// What went wrong
    pub kind: DeviationKind,
    /// The bytes involved, as far as they were captured
    pub raw: Bytes,
}

impl Deviation {
    /// Build a deviation attributed to `layer`.
    #[must_use]
    pub fn new(layer: impl Into<String>, kind: DeviationKind, raw: impl Into<Bytes>) -> Self {
        Self { layer: layer.into(), kind, raw: raw.into() }
    }
}

impl std::fmt::Display for Deviation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.layer, self.kind)
    }
}

/// Outcome of one layer operation: a value, or a recorded deviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed<T> {
    /// The operation produced its unit.
    Ok(T),
    /// The operation failed locally; the unit is unusable but the
    /// connection lives on.
    Deviation(Deviation),
}

impl<T> Processed<T> {
    /// Map the success value, keeping deviations untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Processed<U> {
        match self {
            Self::Ok(value) => Processed::Ok(f(value)),
            Self::Deviation(deviation) => Processed::Deviation(deviation),
        }
    }

    /// The success value, if any.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Deviation(_) => None,
        }
    }
}

/// Result of a layer call: fatal transport errors short-circuit, local
/// failures ride inside [`Processed`].
pub type LayerResult<T> = std::result::Result<Processed<T>, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_classification() {
        let timeout = std::io::Error::new(std::io::ErrorKind::WouldBlock, "t");
        assert_eq!(TransportError::from_io(&timeout), TransportError::Timeout);

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "r");
        assert_eq!(TransportError::from_io(&reset), TransportError::Closed);

        let other = std::io::Error::other("boom");
        assert!(matches!(TransportError::from_io(&other), TransportError::Io { .. }));
    }

    #[test]
    fn processed_map_preserves_deviation() {
        let deviation = Deviation::new(
            "record",
            DeviationKind::Crypto("mac mismatch".to_owned()),
            Bytes::new(),
        );
        let processed: Processed<u32> = Processed::Deviation(deviation.clone());
        match processed.map(|v| v + 1) {
            Processed::Deviation(d) => assert_eq!(d, deviation),
            Processed::Ok(_) => unreachable!("deviation must survive map"),
        }
    }
}
