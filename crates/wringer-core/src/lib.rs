//! Layered protocol engine for the Wringer family.
//!
//! This crate composes the wire codecs and record transforms into a stack
//! of independently replaceable layers around one mutable per-connection
//! [`Context`]. The stack's contract is deliberately tolerant: transport
//! failures are fatal, but anything a peer sends — malformed, truncated,
//! misframed — surfaces as a structured deviation that travels up the
//! stack as data, so callers can characterize wrong behavior instead of
//! crashing on it.
//!
//! I/O is blocking with a per-connection timeout; there is no async model
//! here. One context plus one stack serve exactly one connection attempt.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod layer;
pub mod stack;
pub mod transport;

pub use context::{ConnectionConfig, Context, Direction, RecordOverrides, Role, SequenceState};
pub use error::{Deviation, DeviationKind, LayerResult, Processed, TransportError};
pub use layer::{
    Container, Layer, LayerChannel, MessageLayer, ProcessingHint, RecordLayer, TransportLayer,
};
pub use stack::{EmptyChannel, LayerStack};
pub use transport::{
    LoopbackEndpoint, TcpEndpoint, TransportEndpoint, UdpEndpoint, loopback_pair,
};
