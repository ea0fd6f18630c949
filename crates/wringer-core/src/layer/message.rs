//! Message layer: handshake framing and datagram reassembly.
//!
//! The stream dialect concatenates record payloads into a byte stream and
//! frames messages out of it; one message may span records and one record
//! may carry several messages. The datagram dialect instead sub-frames
//! each message into fragments that can arrive out of order, so this layer
//! keeps per-message reassembly buffers and delivers messages as they
//! complete, lowest sequence first.
//!
//! Records of other content types pass through unchanged — classifying
//! them against expectations is the execution engine's job, not ours.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use wringer_proto::{
    ContentType, Cursor, Dialect, Fragment, HandshakeKind, Message, ParseError,
};

use crate::context::Context;
use crate::error::{Deviation, DeviationKind, LayerResult, Processed};
use crate::layer::{Container, Layer, LayerChannel, ProcessingHint};

const LAYER_NAME: &str = "message";

/// Reassembly state for one in-flight datagram message.
#[derive(Debug)]
struct PartialMessage {
    kind: HandshakeKind,
    total_length: u32,
    data: Vec<u8>,
    filled: Vec<bool>,
}

impl PartialMessage {
    fn new(kind: HandshakeKind, total_length: u32) -> Self {
        let len = total_length as usize;
        Self { kind, total_length, data: vec![0u8; len], filled: vec![false; len] }
    }

    fn insert(&mut self, offset: usize, body: &[u8]) {
        self.data[offset..offset + body.len()].copy_from_slice(body);
        for slot in &mut self.filled[offset..offset + body.len()] {
            *slot = true;
        }
    }

    fn is_complete(&self) -> bool {
        self.filled.iter().all(|&f| f)
    }
}

/// The message layer. One instance per connection.
#[derive(Debug, Default)]
pub struct MessageLayer {
    /// Concatenated handshake payload bytes (stream dialect)
    stream_buf: Vec<u8>,
    /// In-flight reassembly, keyed by message sequence (datagram dialect)
    reassembly: BTreeMap<u16, PartialMessage>,
    /// Next message sequence to assign on send (datagram dialect)
    next_send_seq: u16,
    last_hint: Option<ProcessingHint>,
}

impl MessageLayer {
    /// Create an empty message layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn deviation(kind: DeviationKind, raw: impl Into<Bytes>) -> Deviation {
        Deviation::new(LAYER_NAME, kind, raw)
    }

    /// Pop the lowest-sequence complete message, if any.
    fn take_complete(&mut self) -> Option<Message> {
        let seq = self
            .reassembly
            .iter()
            .find(|(_, partial)| partial.is_complete())
            .map(|(&seq, _)| seq)?;
        let partial = self.reassembly.remove(&seq)?;
        Some(Message::new(partial.kind, partial.data))
    }

    fn insert_fragment(&mut self, fragment: &Fragment) -> Result<(), Deviation> {
        let seq = fragment.header.message_seq;
        let partial = self
            .reassembly
            .entry(seq)
            .or_insert_with(|| PartialMessage::new(fragment.kind, fragment.total_length));

        if partial.total_length != fragment.total_length || partial.kind != fragment.kind {
            return Err(Self::deviation(
                DeviationKind::Unexpected(format!(
                    "fragment of message {seq} disagrees on kind or total length"
                )),
                fragment.body.clone(),
            ));
        }

        partial.insert(fragment.header.fragment_offset as usize, &fragment.body);
        Ok(())
    }

    /// Try to frame one message out of the stream buffer.
    fn try_parse_stream(&self) -> Option<Result<(Message, usize), ParseError>> {
        if self.stream_buf.is_empty() {
            return None;
        }
        let mut cursor = Cursor::new(&self.stream_buf);
        match Message::parse(&mut cursor) {
            Ok(message) => Some(Ok((message, cursor.position()))),
            Err(ParseError::EndOfStream { .. }) => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn send_datagram_message(
        &mut self,
        ctx: &mut Context,
        message: &Message,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes> {
        let total_length = match message.wire_length() {
            Ok(length) => length,
            Err(e) => {
                return Ok(Processed::Deviation(Self::deviation(
                    DeviationKind::Parse(e),
                    message.body.clone(),
                )));
            },
        };

        let seq = self.next_send_seq;
        self.next_send_seq = self.next_send_seq.wrapping_add(1);

        let max_fragment = ctx.config().max_fragment.max(1);
        let mut sent = BytesMut::new();
        let mut offset = 0usize;
        let framed = ProcessingHint::Framing(ContentType::Handshake);

        loop {
            let end = (offset + max_fragment).min(message.body.len());
            let chunk = message.body.slice(offset..end);
            let fragment = Fragment::new(message.kind, total_length, seq, offset as u32, chunk);

            let wire = match fragment.to_wire() {
                Ok(wire) => wire,
                Err(e) => {
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Parse(e),
                        message.body.clone(),
                    )));
                },
            };

            let first = offset == 0;
            let hint =
                if first { ProcessingHint::FirstFragment } else { framed.clone() };
            match below.send(ctx, Container::Bytes(Bytes::from(wire)), Some(&hint))? {
                Processed::Ok(bytes) => sent.extend_from_slice(&bytes),
                Processed::Deviation(deviation) => return Ok(Processed::Deviation(deviation)),
            }

            offset = end;
            if offset >= message.body.len() {
                break;
            }
        }

        Ok(Processed::Ok(sent.freeze()))
    }

    fn receive_stream(
        &mut self,
        ctx: &mut Context,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        let expect = ProcessingHint::ExpectContent(ContentType::Handshake);
        loop {
            match self.try_parse_stream() {
                Some(Ok((message, consumed))) => {
                    self.stream_buf.drain(..consumed);
                    return Ok(Processed::Ok(Container::Message(message)));
                },
                Some(Err(e)) => {
                    let raw = std::mem::take(&mut self.stream_buf);
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Parse(e),
                        raw,
                    )));
                },
                None => match below.receive(ctx, Some(&expect))? {
                    Processed::Ok(Container::Record(record)) => {
                        if record.content_type == ContentType::Handshake {
                            self.stream_buf.extend_from_slice(&record.payload);
                        } else {
                            return Ok(Processed::Ok(Container::Record(record)));
                        }
                    },
                    Processed::Ok(other) => return Ok(Processed::Ok(other)),
                    Processed::Deviation(deviation) => {
                        return Ok(Processed::Deviation(deviation));
                    },
                },
            }
        }
    }

    fn receive_datagram(
        &mut self,
        ctx: &mut Context,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        let expect = ProcessingHint::ExpectContent(ContentType::Handshake);
        loop {
            if let Some(message) = self.take_complete() {
                return Ok(Processed::Ok(Container::Message(message)));
            }

            match below.receive(ctx, Some(&expect))? {
                Processed::Ok(Container::Datagram(record)) => {
                    if record.content_type != ContentType::Handshake {
                        return Ok(Processed::Ok(Container::Datagram(record)));
                    }
                    let mut cursor = Cursor::new(&record.payload);
                    while cursor.remaining() > 0 {
                        match Fragment::parse(&mut cursor) {
                            Ok(fragment) => {
                                if let Err(deviation) = self.insert_fragment(&fragment) {
                                    return Ok(Processed::Deviation(deviation));
                                }
                            },
                            Err(e) => {
                                return Ok(Processed::Deviation(Self::deviation(
                                    DeviationKind::Parse(e),
                                    record.payload.clone(),
                                )));
                            },
                        }
                    }
                },
                Processed::Ok(other) => return Ok(Processed::Ok(other)),
                Processed::Deviation(deviation) => return Ok(Processed::Deviation(deviation)),
            }
        }
    }
}

impl Layer for MessageLayer {
    fn name(&self) -> &'static str {
        LAYER_NAME
    }

    fn send(
        &mut self,
        ctx: &mut Context,
        unit: Container,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes> {
        self.last_hint = hint.cloned();

        let Container::Message(message) = unit else {
            // Not our unit: records, datagrams and raw bytes pass through.
            return below.send(ctx, unit, hint);
        };

        match ctx.dialect() {
            Dialect::Stream | Dialect::Legacy => match message.to_wire() {
                Ok(wire) => {
                    let framed = ProcessingHint::Framing(ContentType::Handshake);
                    below.send(ctx, Container::Bytes(Bytes::from(wire)), Some(&framed))
                },
                Err(e) => Ok(Processed::Deviation(Self::deviation(
                    DeviationKind::Parse(e),
                    message.body,
                ))),
            },
            Dialect::Datagram => self.send_datagram_message(ctx, &message, below),
        }
    }

    fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        self.last_hint = hint.cloned();

        if matches!(hint, Some(ProcessingHint::Drain | ProcessingHint::ExpectContent(_))) {
            // The caller wants lower-layer units, not framed messages.
            return below.receive(ctx, hint);
        }

        match ctx.dialect() {
            Dialect::Stream => self.receive_stream(ctx, below),
            Dialect::Datagram => self.receive_datagram(ctx, below),
            Dialect::Legacy => below.receive(ctx, hint),
        }
    }

    fn last_hint(&self) -> Option<ProcessingHint> {
        self.last_hint.clone()
    }
}
