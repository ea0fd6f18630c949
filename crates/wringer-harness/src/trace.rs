//! Traces and their versioned serialized form.
//!
//! A trace is the ordered list of actions describing one intended
//! exchange. Before execution it is a script; after execution it carries
//! every action's recorded outcome and becomes a replayable audit log. The
//! on-disk form is a CBOR envelope with an explicit format version, and
//! round-trips exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Action, ReceiveAction, SendAction};
use crate::expect::ExpectedEntry;

/// Ordered sequence of actions describing one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Trace {
    /// Actions in execution order
    pub actions: Vec<Action>,
}

impl Trace {
    /// An empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    #[must_use]
    pub fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append a send action.
    #[must_use]
    pub fn then_send(self, action: SendAction) -> Self {
        self.with(Action::Send(action))
    }

    /// Append a receive action expecting the given ordered list.
    #[must_use]
    pub fn then_expect(self, expected: Vec<ExpectedEntry>) -> Self {
        self.with(Action::Receive(ReceiveAction::expecting(expected)))
    }

    /// Whether every executed action matched the plan and none was
    /// skipped.
    #[must_use]
    pub fn executed_as_planned(&self) -> bool {
        !self.actions.is_empty() && self.actions.iter().all(Action::as_planned)
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the trace has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Current trace file format version.
pub const TRACE_FORMAT_VERSION: u32 = 1;

/// Errors reading or writing the trace envelope.
#[derive(Error, Debug)]
pub enum TraceCodecError {
    /// Serialization failed.
    #[error("failed to encode trace: {0}")]
    Encode(String),

    /// Deserialization failed.
    #[error("failed to decode trace: {0}")]
    Decode(String),

    /// The envelope's format version is not supported.
    #[error("unsupported trace format version {0}")]
    UnsupportedVersion(u32),
}

/// Versioned on-disk envelope around a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFile {
    /// Format version, checked on read
    pub format_version: u32,
    /// The trace itself
    pub trace: Trace,
}

impl TraceFile {
    /// Wrap a trace in the current-version envelope.
    #[must_use]
    pub fn new(trace: Trace) -> Self {
        Self { format_version: TRACE_FORMAT_VERSION, trace }
    }

    /// Serialize to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, TraceCodecError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| TraceCodecError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Deserialize from CBOR bytes, rejecting unknown versions.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TraceCodecError> {
        let file: Self = ciborium::de::from_reader(bytes)
            .map_err(|e| TraceCodecError::Decode(e.to_string()))?;
        if file.format_version != TRACE_FORMAT_VERSION {
            return Err(TraceCodecError::UnsupportedVersion(file.format_version));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use wringer_proto::{HandshakeKind, Message};

    use super::*;
    use crate::expect::{ContainerKind, ExpectedEntry};

    fn sample_trace() -> Trace {
        Trace::new()
            .then_send(SendAction::message(Message::new(
                HandshakeKind::ClientHello,
                vec![1, 2, 3],
            )))
            .then_expect(vec![
                ExpectedEntry::required(ContainerKind::Handshake(HandshakeKind::ServerHello)),
                ExpectedEntry::optional(ContainerKind::Handshake(HandshakeKind::Certificate)),
            ])
    }

    #[test]
    fn cbor_round_trip() {
        let file = TraceFile::new(sample_trace());
        let bytes = file.to_cbor().unwrap();
        let parsed = TraceFile::from_cbor(&bytes).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn unknown_version_rejected() {
        let mut file = TraceFile::new(sample_trace());
        file.format_version = 99;
        let bytes = file.to_cbor().unwrap();
        assert!(matches!(
            TraceFile::from_cbor(&bytes),
            Err(TraceCodecError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(matches!(
            TraceFile::from_cbor(&[0xFF, 0x00, 0x13, 0x37]),
            Err(TraceCodecError::Decode(_))
        ));
    }

    #[test]
    fn unexecuted_trace_is_not_as_planned() {
        assert!(!sample_trace().executed_as_planned());
        assert!(!Trace::new().executed_as_planned());
    }
}
