//! Record layer: framing, protection, and sequence bookkeeping.
//!
//! On send, this layer turns payload bytes (or a pre-built, possibly lying
//! record) into one protected on-wire record. On receive, it reassembles
//! transport bytes into records, runs the inverse transform, and hands the
//! opened record upward. All three dialects live here, selected by the
//! connection context.
//!
//! Protection always uses the context's own sequence accounting; the
//! header fields that go on the wire come from the record and the
//! configured overrides. The two can disagree — that is how a trace lies
//! about an epoch or a length while remaining decryptable, or vice versa.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};
use wringer_proto::{
    ContentType, Cursor, DatagramPacket, DatagramRecord, Dialect, LegacyRecord, ParseError, Record,
};

use crate::context::Context;
use crate::error::{Deviation, DeviationKind, LayerResult, Processed};
use crate::layer::{Container, Layer, LayerChannel, ProcessingHint};

const LAYER_NAME: &str = "record";

/// The record layer. One instance per connection.
#[derive(Debug, Default)]
pub struct RecordLayer {
    /// Unparsed received bytes (stream and legacy dialects)
    stream_buf: Vec<u8>,
    /// Received, not yet parsed packets (datagram dialect)
    datagrams: VecDeque<DatagramPacket>,
    last_hint: Option<ProcessingHint>,
}

impl RecordLayer {
    /// Create an empty record layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn deviation(kind: DeviationKind, raw: impl Into<Bytes>) -> Deviation {
        Deviation::new(LAYER_NAME, kind, raw)
    }

    fn framing_content_type(hint: Option<&ProcessingHint>) -> ContentType {
        match hint {
            Some(ProcessingHint::Framing(ct) | ProcessingHint::ExpectContent(ct)) => *ct,
            // The first fragment of a logical message is handshake framing
            Some(ProcessingHint::FirstFragment) => ContentType::Handshake,
            _ => ContentType::Application,
        }
    }

    fn apply_overrides_stream(ctx: &Context, record: &mut Record) {
        let overrides = ctx.overrides();
        if let Some(ct) = overrides.content_type {
            record.content_type = ct;
        }
        if let Some(version) = overrides.version {
            record.version = version;
        }
        if let Some(length) = overrides.length {
            record.length = Some(length);
        }
    }

    fn apply_overrides_datagram(ctx: &Context, record: &mut DatagramRecord) {
        let overrides = ctx.overrides();
        if let Some(ct) = overrides.content_type {
            record.content_type = ct;
        }
        if let Some(version) = overrides.version {
            record.version = version;
        }
        if let Some(length) = overrides.length {
            record.length = Some(length);
        }
        if let Some(epoch) = overrides.epoch {
            record.epoch = epoch;
        }
        if let Some(sequence) = overrides.sequence_number {
            record.sequence_number = sequence;
        }
    }

    /// Protect and serialize a stream record, sending it below.
    fn send_stream(
        &mut self,
        ctx: &mut Context,
        mut record: Record,
        scoped: u64,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes> {
        let content_type = record.content_type.to_byte();
        let version = record.version.0;
        let clean = record.payload.clone();

        let protected =
            match ctx.send_transform_mut().protect(scoped, content_type, version, &clean) {
                Ok(protected) => protected,
                Err(e) => {
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Crypto(e.to_string()),
                        clean,
                    )));
                },
            };

        record.payload = Bytes::from(protected.payload);
        record.mac = Bytes::from(protected.mac);
        record.padding = Bytes::from(protected.padding);
        record.padding_length = protected.padding_length;
        Self::apply_overrides_stream(ctx, &mut record);

        match record.to_wire() {
            Ok(wire) => below.send(ctx, Container::Bytes(Bytes::from(wire)), hint),
            Err(e) => {
                Ok(Processed::Deviation(Self::deviation(DeviationKind::Parse(e), record.payload)))
            },
        }
    }

    /// Protect and serialize a datagram record, sending it below.
    fn send_datagram(
        &mut self,
        ctx: &mut Context,
        mut record: DatagramRecord,
        scoped: u64,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes> {
        let content_type = record.content_type.to_byte();
        let version = record.version.0;
        let clean = record.payload.clone();

        let protected =
            match ctx.send_transform_mut().protect(scoped, content_type, version, &clean) {
                Ok(protected) => protected,
                Err(e) => {
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Crypto(e.to_string()),
                        clean,
                    )));
                },
            };

        record.payload = Bytes::from(protected.payload);
        record.mac = Bytes::from(protected.mac);
        record.padding = Bytes::from(protected.padding);
        record.padding_length = protected.padding_length;
        Self::apply_overrides_datagram(ctx, &mut record);

        match record.to_wire() {
            Ok(wire) => below.send(ctx, Container::Bytes(Bytes::from(wire)), hint),
            Err(e) => {
                Ok(Processed::Deviation(Self::deviation(DeviationKind::Parse(e), record.payload)))
            },
        }
    }

    fn send_legacy(
        &mut self,
        ctx: &mut Context,
        record: LegacyRecord,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes> {
        match record.to_wire() {
            Ok(wire) => below.send(ctx, Container::Bytes(Bytes::from(wire)), hint),
            Err(e) => {
                Ok(Processed::Deviation(Self::deviation(DeviationKind::Parse(e), record.payload)))
            },
        }
    }

    /// Try to parse one record from the stream buffer.
    ///
    /// `None` means the buffer is merely incomplete and more transport
    /// bytes are needed.
    fn try_parse_stream(&self, throwing: bool) -> Option<Result<(Record, usize), ParseError>> {
        if self.stream_buf.is_empty() {
            return None;
        }
        let mut cursor = Cursor::new(&self.stream_buf);
        match Record::parse_with_policy(&mut cursor, throwing) {
            Ok(record) => Some(Ok((record, cursor.position()))),
            Err(ParseError::EndOfStream { .. }) => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn try_parse_legacy(&self, throwing: bool) -> Option<Result<(LegacyRecord, usize), ParseError>> {
        if self.stream_buf.is_empty() {
            return None;
        }
        let mut cursor = Cursor::new(&self.stream_buf);
        match LegacyRecord::parse_with_policy(&mut cursor, throwing) {
            Ok(record) => Some(Ok((record, cursor.position()))),
            Err(ParseError::EndOfStream { .. }) => None,
            Err(e) => Some(Err(e)),
        }
    }

    /// Run the inverse transform over a parsed stream record.
    fn open_stream_record(ctx: &mut Context, mut record: Record) -> Processed<Container> {
        let scoped = ctx.next_recv_sequence();
        let content_type = record.content_type.to_byte();
        let version = record.version.0;
        let wire_payload = record.payload.clone();

        match ctx.recv_transform_mut().unprotect(scoped, content_type, version, &wire_payload) {
            Ok(opened) => {
                record.payload = Bytes::from(opened.payload);
                record.mac = Bytes::from(opened.mac);
                record.padding = Bytes::from(opened.padding);
                record.padding_length = opened.padding_length;
                Processed::Ok(Container::Record(record))
            },
            Err(e) => Processed::Deviation(Self::deviation(
                DeviationKind::Crypto(e.to_string()),
                wire_payload,
            )),
        }
    }

    /// Run the inverse transform over a parsed datagram record, keyed by
    /// the wire's own epoch and sequence.
    fn open_datagram_record(ctx: &mut Context, mut record: DatagramRecord) -> Processed<Container> {
        let scoped = record.scoped_sequence();
        let content_type = record.content_type.to_byte();
        let version = record.version.0;
        let wire_payload = record.payload.clone();

        match ctx.recv_transform_mut().unprotect(scoped, content_type, version, &wire_payload) {
            Ok(opened) => {
                record.payload = Bytes::from(opened.payload);
                record.mac = Bytes::from(opened.mac);
                record.padding = Bytes::from(opened.padding);
                record.padding_length = opened.padding_length;
                Processed::Ok(Container::Datagram(record))
            },
            Err(e) => Processed::Deviation(Self::deviation(
                DeviationKind::Crypto(e.to_string()),
                wire_payload,
            )),
        }
    }

    fn receive_stream(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        let throwing = ctx.config().throwing_boundaries;
        loop {
            match self.try_parse_stream(throwing) {
                Some(Ok((record, consumed))) => {
                    self.stream_buf.drain(..consumed);
                    return Ok(Self::open_stream_record(ctx, record));
                },
                Some(Err(e)) => {
                    // A malformed record poisons the buffered bytes; hand
                    // them over with the diagnosis and start clean.
                    let raw = std::mem::take(&mut self.stream_buf);
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Parse(e),
                        raw,
                    )));
                },
                None => match below.receive(ctx, hint)? {
                    Processed::Ok(Container::Bytes(bytes)) => {
                        self.stream_buf.extend_from_slice(&bytes);
                    },
                    Processed::Ok(other) => {
                        return Ok(Processed::Deviation(Self::deviation(
                            DeviationKind::Unexpected(format!(
                                "expected raw bytes from below, got {}",
                                other.label()
                            )),
                            Bytes::new(),
                        )));
                    },
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
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        let throwing = ctx.config().throwing_boundaries;
        loop {
            if let Some(front) = self.datagrams.front() {
                let mut cursor = Cursor::new(&front.payload);
                let parsed = DatagramRecord::parse_with_policy(&mut cursor, throwing);
                let consumed = cursor.position();
                match parsed {
                    Ok(record) => {
                        let exhausted = consumed >= front.len();
                        if exhausted {
                            self.datagrams.pop_front();
                        } else if let Some(front) = self.datagrams.front_mut() {
                            front.payload.advance(consumed);
                        }
                        return Ok(Self::open_datagram_record(ctx, record));
                    },
                    Err(e) => {
                        // Truncated or malformed within its packet: the
                        // packet cannot recover, drop it whole.
                        let raw = self.datagrams.pop_front().unwrap_or_default();
                        return Ok(Processed::Deviation(Self::deviation(
                            DeviationKind::Parse(e),
                            raw.payload,
                        )));
                    },
                }
            }

            match below.receive(ctx, hint)? {
                Processed::Ok(Container::Bytes(bytes)) => {
                    self.datagrams.push_back(DatagramPacket::new(bytes));
                },
                Processed::Ok(other) => {
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Unexpected(format!(
                            "expected raw bytes from below, got {}",
                            other.label()
                        )),
                        Bytes::new(),
                    )));
                },
                Processed::Deviation(deviation) => return Ok(Processed::Deviation(deviation)),
            }
        }
    }

    fn receive_legacy(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        let throwing = ctx.config().throwing_boundaries;
        loop {
            match self.try_parse_legacy(throwing) {
                Some(Ok((record, consumed))) => {
                    self.stream_buf.drain(..consumed);
                    return Ok(Processed::Ok(Container::Legacy(record)));
                },
                Some(Err(e)) => {
                    let raw = std::mem::take(&mut self.stream_buf);
                    return Ok(Processed::Deviation(Self::deviation(
                        DeviationKind::Parse(e),
                        raw,
                    )));
                },
                None => match below.receive(ctx, hint)? {
                    Processed::Ok(Container::Bytes(bytes)) => {
                        self.stream_buf.extend_from_slice(&bytes);
                    },
                    Processed::Ok(other) => {
                        return Ok(Processed::Deviation(Self::deviation(
                            DeviationKind::Unexpected(format!(
                                "expected raw bytes from below, got {}",
                                other.label()
                            )),
                            Bytes::new(),
                        )));
                    },
                    Processed::Deviation(deviation) => {
                        return Ok(Processed::Deviation(deviation));
                    },
                },
            }
        }
    }
}

impl Layer for RecordLayer {
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

        if matches!(hint, Some(ProcessingHint::Drain)) {
            return below.send(ctx, unit, hint);
        }

        match unit {
            Container::Bytes(payload) => {
                let content_type = Self::framing_content_type(hint);
                match ctx.dialect() {
                    Dialect::Stream => {
                        let record = Record::new(content_type, ctx.version(), payload);
                        let (_, scoped) = ctx.next_send_sequence();
                        self.send_stream(ctx, record, scoped, hint, below)
                    },
                    Dialect::Datagram => {
                        let (sequence, scoped) = ctx.next_send_sequence();
                        let record = DatagramRecord::new(
                            content_type,
                            ctx.version(),
                            ctx.send_sequence().epoch(),
                            sequence,
                            payload,
                        );
                        self.send_datagram(ctx, record, scoped, hint, below)
                    },
                    Dialect::Legacy => {
                        let record = LegacyRecord::unpadded(payload);
                        self.send_legacy(ctx, record, hint, below)
                    },
                }
            },
            Container::Record(record) => {
                let (_, scoped) = ctx.next_send_sequence();
                self.send_stream(ctx, record, scoped, hint, below)
            },
            Container::Datagram(record) => {
                // Pre-built datagram records carry their own epoch and
                // sequence; protection is keyed by exactly those values.
                let scoped = record.scoped_sequence();
                self.send_datagram(ctx, record, scoped, hint, below)
            },
            Container::Legacy(record) => self.send_legacy(ctx, record, hint, below),
            Container::Message(message) => match message.to_wire() {
                Ok(wire) => {
                    let framed = ProcessingHint::Framing(ContentType::Handshake);
                    self.send(ctx, Container::Bytes(Bytes::from(wire)), Some(&framed), below)
                },
                Err(e) => Ok(Processed::Deviation(Self::deviation(
                    DeviationKind::Parse(e),
                    message.body,
                ))),
            },
        }
    }

    fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
        below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        self.last_hint = hint.cloned();

        if matches!(hint, Some(ProcessingHint::Drain)) {
            return below.receive(ctx, hint);
        }

        match ctx.dialect() {
            Dialect::Stream => self.receive_stream(ctx, hint, below),
            Dialect::Datagram => self.receive_datagram(ctx, hint, below),
            Dialect::Legacy => self.receive_legacy(ctx, hint, below),
        }
    }

    fn last_hint(&self) -> Option<ProcessingHint> {
        self.last_hint.clone()
    }
}
