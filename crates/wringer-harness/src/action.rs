//! Trace actions and their recorded outcomes.
//!
//! An action is one step of an exchange. It is constructed with the data
//! or expectation it operates on, executed exactly once by the engine, and
//! immutable afterwards except for the outcome recorded into it — the
//! bytes actually sent, the containers actually received, and any
//! deviation diagnosed along the way. A fully executed trace doubles as an
//! audit log of what really happened on the wire.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use wringer_core::{Container, Deviation, TransportError};
use wringer_crypto::{PaddingScheme, TransformSuite};
use wringer_proto::{
    CipherKind, CompressionMethod, DatagramRecord, LegacyRecord, MacAlgorithm, Message, Record,
};

use crate::expect::{ContainerKind, ExpectedEntry};

/// One unit a send action puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendUnit {
    /// A framed handshake message (framed and fragmented by the stack)
    Message(Message),
    /// A pre-built stream record, fields taken verbatim
    Record(Record),
    /// A pre-built datagram record, fields taken verbatim
    Datagram(DatagramRecord),
    /// A pre-built legacy record
    Legacy(LegacyRecord),
    /// Application payload, framed by the stack as application data
    Application(Bytes),
    /// Raw bytes, bypassing all framing
    Raw(Bytes),
}

impl SendUnit {
    /// Convert into the stack's container vocabulary.
    #[must_use]
    pub fn into_container(self) -> Container {
        match self {
            Self::Message(message) => Container::Message(message),
            Self::Record(record) => Container::Record(record),
            Self::Datagram(record) => Container::Datagram(record),
            Self::Legacy(record) => Container::Legacy(record),
            Self::Application(bytes) | Self::Raw(bytes) => Container::Bytes(bytes),
        }
    }

    /// Whether this unit wants the framing bypassed.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// Outcome of a send action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SendOutcome {
    /// Wire bytes written, one entry per unit that made it out
    pub wire: Vec<Bytes>,
    /// Deviations hit while protecting or serializing
    pub deviations: Vec<Deviation>,
}

/// Send one or more units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAction {
    /// Units to send, in order
    pub units: Vec<SendUnit>,
    /// Recorded outcome, set by the engine
    pub result: Option<SendOutcome>,
}

impl SendAction {
    /// Send a single handshake message.
    #[must_use]
    pub fn message(message: Message) -> Self {
        Self { units: vec![SendUnit::Message(message)], result: None }
    }

    /// Send units in order.
    #[must_use]
    pub fn units(units: Vec<SendUnit>) -> Self {
        Self { units, result: None }
    }
}

/// Outcome of a receive-style action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReceiveOutcome {
    /// Containers received, in arrival order
    pub observed: Vec<Container>,
    /// Deviations diagnosed while receiving
    pub deviations: Vec<Deviation>,
    /// Whether the observation matched the declared expectation
    pub as_planned: bool,
}

/// Receive against an ordered expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveAction {
    /// Ordered expected container kinds, some optional
    pub expected: Vec<ExpectedEntry>,
    /// Recorded outcome, set by the engine
    pub result: Option<ReceiveOutcome>,
}

impl ReceiveAction {
    /// Expect exactly this ordered list.
    #[must_use]
    pub fn expecting(expected: Vec<ExpectedEntry>) -> Self {
        Self { expected, result: None }
    }
}

/// Receive until a container of the target kind arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveUntilAction {
    /// The kind that ends the loop
    pub target: ContainerKind,
    /// Upper bound on receive attempts before giving up
    pub max_attempts: usize,
    /// Recorded outcome, set by the engine
    pub result: Option<ReceiveOutcome>,
}

impl ReceiveUntilAction {
    /// Receive until `target` arrives, at most `max_attempts` units.
    #[must_use]
    pub fn new(target: ContainerKind, max_attempts: usize) -> Self {
        Self { target, max_attempts, result: None }
    }
}

/// Which direction a cipher activation applies to (serializable mirror of
/// the engine's direction type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivateDirection {
    /// Outbound records only
    Outbound,
    /// Inbound records only
    Inbound,
    /// Both directions
    Both,
}

impl ActivateDirection {
    /// Convert to the engine's direction type.
    #[must_use]
    pub fn to_direction(self) -> wringer_core::Direction {
        match self {
            Self::Outbound => wringer_core::Direction::Outbound,
            Self::Inbound => wringer_core::Direction::Inbound,
            Self::Both => wringer_core::Direction::Both,
        }
    }
}

/// Serializable description of a transform suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Compression method
    pub compression: CompressionMethod,
    /// Record MAC algorithm
    pub mac: MacAlgorithm,
    /// Record cipher
    pub cipher: CipherKind,
    /// Block size for the padding scheme, if padding applies
    pub padding_block: Option<u8>,
}

impl SuiteSpec {
    /// The unprotected initial suite.
    #[must_use]
    pub fn plaintext() -> Self {
        Self {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::Null,
            cipher: CipherKind::Null,
            padding_block: None,
        }
    }

    /// Convert to the transform pipeline's suite type.
    #[must_use]
    pub fn to_suite(self) -> TransformSuite {
        TransformSuite {
            compression: self.compression,
            mac: self.mac,
            cipher: self.cipher,
            padding: self
                .padding_block
                .map_or(PaddingScheme::None, PaddingScheme::BlockAlign),
        }
    }
}

/// Install the pending suite for a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateCipherAction {
    /// Direction(s) to switch over
    pub direction: ActivateDirection,
    /// Suite to install
    pub suite: SuiteSpec,
    /// Recorded failure, if activation deviated
    pub result: Option<Result<(), String>>,
}

impl ActivateCipherAction {
    /// Activate `suite` for `direction`.
    #[must_use]
    pub fn new(direction: ActivateDirection, suite: SuiteSpec) -> Self {
        Self { direction, suite, result: None }
    }
}

/// Pause trace execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitAction {
    /// How long to pause
    pub duration: Duration,
    /// Whether the pause ran
    pub result: Option<bool>,
}

/// One step of a trace.
///
/// Closed by design: the engine dispatches over this enum, and new
/// behavior arrives as new variants rather than open-ended subclassing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Put units on the wire
    Send(SendAction),
    /// Receive against an ordered expectation
    Receive(ReceiveAction),
    /// Receive until a target kind arrives
    ReceiveUntil(ReceiveUntilAction),
    /// Install the pending cipher state
    ActivateCipher(ActivateCipherAction),
    /// Pause
    Wait(WaitAction),
}

impl Action {
    /// Whether this action has been executed.
    #[must_use]
    pub fn executed(&self) -> bool {
        match self {
            Self::Send(a) => a.result.is_some(),
            Self::Receive(a) => a.result.is_some(),
            Self::ReceiveUntil(a) => a.result.is_some(),
            Self::ActivateCipher(a) => a.result.is_some(),
            Self::Wait(a) => a.result.is_some(),
        }
    }

    /// Whether this action executed without deviation.
    ///
    /// Unexecuted actions are not as-planned.
    #[must_use]
    pub fn as_planned(&self) -> bool {
        match self {
            Self::Send(a) => a.result.as_ref().is_some_and(|r| r.deviations.is_empty()),
            Self::Receive(a) => a.result.as_ref().is_some_and(|r| r.as_planned),
            Self::ReceiveUntil(a) => a.result.as_ref().is_some_and(|r| r.as_planned),
            Self::ActivateCipher(a) => a.result.as_ref().is_some_and(|r| r.is_ok()),
            Self::Wait(a) => a.result.is_some(),
        }
    }
}

/// Per-action summary the engine reports alongside the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Executed, matched the plan
    AsPlanned,
    /// Executed, but something deviated
    Deviated(String),
    /// A fatal transport error ended the trace here
    Aborted(TransportError),
    /// Never reached because an earlier action aborted
    Skipped,
}
