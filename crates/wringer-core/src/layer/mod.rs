//! The layer abstraction and its cross-layer vocabulary.
//!
//! A layer stack is an ordered composition of independently replaceable
//! layers. Sending walks top to bottom, each layer wrapping its unit and
//! handing bytes-in-progress down; receiving walks bottom to top, each
//! layer unwrapping and handing its natural unit up. The *only* channel
//! through which one layer influences another's receive policy is the
//! [`ProcessingHint`] passed alongside each call — no layer reaches into
//! another's state.
//!
//! Failure flow follows the severity split in [`crate::error`]: transport
//! errors propagate upward unchanged and end the connection; parse and
//! transform failures are wrapped into deviations attributed to the layer
//! that hit them, and travel upward as ordinary values.

mod message;
mod record;
mod transport;

pub use message::MessageLayer;
pub use record::RecordLayer;
pub use transport::TransportLayer;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use wringer_proto::{
    ContentType, DatagramRecord, HandshakeKind, LegacyRecord, Message, Record,
};

use crate::context::Context;
use crate::error::LayerResult;

/// Information a layer passes to the layer directly below (on send) or
/// receives back (on receive) to steer what happens next.
///
/// Hints are immutable values scoped to a single call; they never carry
/// cross-call state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingHint {
    /// The caller wants to end up with this handshake message kind.
    ExpectHandshake(HandshakeKind),
    /// The caller wants records of this content type.
    ExpectContent(ContentType),
    /// The unit being sent is the first piece of a new logical message.
    FirstFragment,
    /// Frame the bytes being sent under this content type.
    Framing(ContentType),
    /// Bypass parsing: deliver or accept raw bytes however they arrive.
    Drain,
}

/// The unit a layer naturally produces or consumes.
///
/// Closed by design: the execution engine classifies observed containers
/// against expectations, so every kind is enumerable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    /// Raw transport bytes
    Bytes(Bytes),
    /// A stream-dialect record
    Record(Record),
    /// A datagram-dialect record
    Datagram(DatagramRecord),
    /// A legacy-dialect record
    Legacy(LegacyRecord),
    /// A framed handshake message
    Message(Message),
}

impl Container {
    /// Short label for logs and diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Record(_) => "record",
            Self::Datagram(_) => "datagram",
            Self::Legacy(_) => "legacy",
            Self::Message(_) => "message",
        }
    }
}

/// Access to the part of the stack below one layer.
///
/// A layer never holds a reference to its neighbors; it is handed a
/// channel to the sub-stack below for the duration of one call.
pub trait LayerChannel {
    /// Send a unit down the remaining stack.
    fn send(
        &mut self,
        ctx: &mut Context,
        unit: Container,
        hint: Option<&ProcessingHint>,
    ) -> LayerResult<Bytes>;

    /// Receive a unit from the remaining stack.
    fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
    ) -> LayerResult<Container>;
}

/// One element of the layer stack.
pub trait Layer: Send {
    /// Stable name, used to attribute deviations.
    fn name(&self) -> &'static str;

    /// Wrap `unit` and send it down through `below`.
    ///
    /// Returns the bytes that actually went on the wire.
    fn send(
        &mut self,
        ctx: &mut Context,
        unit: Container,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes>;

    /// Pull from `below` until this layer's unit is complete, then hand it
    /// up.
    fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container>;

    /// The most recent hint this layer passed downward, for introspection.
    fn last_hint(&self) -> Option<ProcessingHint>;
}
