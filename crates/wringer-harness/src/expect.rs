//! Expectation matching for receive-style actions.
//!
//! A declared expectation is an ordered list of container kinds, some
//! marked optional. The matcher answers two questions:
//!
//! - [`executed_as_planned`]: does the full observed sequence equal the
//!   expectation with optional entries freely droppable — no reordering,
//!   no insertions, no missing required entries?
//! - [`failed_early`]: is a *partial* observed sequence already
//!   unextendable into any match? This short-circuits a receive loop
//!   before a timeout has to decide.
//!
//! Matching backtracks over optional entries, so an observed unit is never
//! mis-attributed to an optional entry when attributing it to a later
//! required entry would make the sequence match.

use serde::{Deserialize, Serialize};
use wringer_core::Container;
use wringer_proto::{ContentType, HandshakeKind};

/// Classification of an observed container for matching purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// A framed handshake message of this kind
    Handshake(HandshakeKind),
    /// A record (stream or datagram) of this content type
    Content(ContentType),
    /// A legacy-dialect record
    Legacy,
    /// Raw unparsed bytes
    Raw,
}

impl ContainerKind {
    /// Classify a container.
    #[must_use]
    pub fn of(container: &Container) -> Self {
        match container {
            Container::Message(message) => Self::Handshake(message.kind),
            Container::Record(record) => Self::Content(record.content_type),
            Container::Datagram(record) => Self::Content(record.content_type),
            Container::Legacy(_) => Self::Legacy,
            Container::Bytes(_) => Self::Raw,
        }
    }
}

/// One entry of a declared expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEntry {
    /// The container kind this entry matches
    pub kind: ContainerKind,
    /// Whether the peer may omit it without breaking the match
    pub optional: bool,
}

impl ExpectedEntry {
    /// A required entry.
    #[must_use]
    pub fn required(kind: ContainerKind) -> Self {
        Self { kind, optional: false }
    }

    /// An optional entry.
    #[must_use]
    pub fn optional(kind: ContainerKind) -> Self {
        Self { kind, optional: true }
    }
}

/// Whether `observed` is `expected` with optional entries dropped.
#[must_use]
pub fn executed_as_planned(expected: &[ExpectedEntry], observed: &[ContainerKind]) -> bool {
    match (expected.split_first(), observed.split_first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some((entry, rest)), None) => entry.optional && executed_as_planned(rest, observed),
        (Some((entry, rest_expected)), Some((kind, rest_observed))) => {
            (entry.kind == *kind && executed_as_planned(rest_expected, rest_observed))
                || (entry.optional && executed_as_planned(rest_expected, observed))
        },
    }
}

/// Whether `partial` is still a prefix of some sequence that matches.
#[must_use]
pub fn can_extend(expected: &[ExpectedEntry], partial: &[ContainerKind]) -> bool {
    match (expected.split_first(), partial.split_first()) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some((entry, rest_expected)), Some((kind, rest_partial))) => {
            (entry.kind == *kind && can_extend(rest_expected, rest_partial))
                || (entry.optional && can_extend(rest_expected, partial))
        },
    }
}

/// Whether `partial` already cannot be extended into any match.
#[must_use]
pub fn failed_early(expected: &[ExpectedEntry], partial: &[ContainerKind]) -> bool {
    !can_extend(expected, partial)
}

/// Whether, with `observed` consumed as a prefix, any expected entry could
/// still consume a further unit.
///
/// The receive loop stops once this is false: nothing more is awaited.
#[must_use]
pub fn remaining_possible(expected: &[ExpectedEntry], observed: &[ContainerKind]) -> bool {
    match (expected.split_first(), observed.split_first()) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some((entry, rest_expected)), Some((kind, rest_observed))) => {
            (entry.kind == *kind && remaining_possible(rest_expected, rest_observed))
                || (entry.optional && remaining_possible(rest_expected, observed))
        },
    }
}

/// The kind the next received unit should satisfy, for hint derivation.
///
/// Walks the greedy match of `observed` against `expected` and returns the
/// first unconsumed entry's kind, if any.
#[must_use]
pub fn next_expected(expected: &[ExpectedEntry], observed: &[ContainerKind]) -> Option<ContainerKind> {
    let mut index = 0;
    for kind in observed {
        while index < expected.len() {
            if expected[index].kind == *kind {
                index += 1;
                break;
            }
            if expected[index].optional {
                index += 1;
                continue;
            }
            // Diverged; the caller will notice via failed_early
            return None;
        }
    }
    expected.get(index).map(|entry| entry.kind)
}
