//! Ordered composition of layers.
//!
//! The stack owns its layers bottom-first. A send enters at the top and
//! walks down; a receive enters at the top, which recursively pulls from
//! the layers below it. Each layer sees only a channel to the sub-stack
//! underneath — never its neighbors directly — so layers stay
//! independently replaceable.

use bytes::Bytes;

use crate::context::Context;
use crate::error::{LayerResult, TransportError};
use crate::layer::{Container, Layer, LayerChannel, MessageLayer, ProcessingHint, RecordLayer, TransportLayer};
use crate::transport::TransportEndpoint;

/// A channel below the bottom layer: always an error to use.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyChannel;

impl LayerChannel for EmptyChannel {
    fn send(
        &mut self,
        _ctx: &mut Context,
        _unit: Container,
        _hint: Option<&ProcessingHint>,
    ) -> LayerResult<Bytes> {
        Err(TransportError::NoLowerLayer)
    }

    fn receive(
        &mut self,
        _ctx: &mut Context,
        _hint: Option<&ProcessingHint>,
    ) -> LayerResult<Container> {
        Err(TransportError::NoLowerLayer)
    }
}

/// Channel view over a contiguous lower part of a stack.
struct SubStack<'a> {
    layers: &'a mut [Box<dyn Layer>],
}

impl LayerChannel for SubStack<'_> {
    fn send(
        &mut self,
        ctx: &mut Context,
        unit: Container,
        hint: Option<&ProcessingHint>,
    ) -> LayerResult<Bytes> {
        match self.layers.split_last_mut() {
            Some((top, rest)) => top.send(ctx, unit, hint, &mut SubStack { layers: rest }),
            None => Err(TransportError::NoLowerLayer),
        }
    }

    fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
    ) -> LayerResult<Container> {
        match self.layers.split_last_mut() {
            Some((top, rest)) => top.receive(ctx, hint, &mut SubStack { layers: rest }),
            None => Err(TransportError::NoLowerLayer),
        }
    }
}

/// An ordered stack of layers, bottom first.
pub struct LayerStack {
    layers: Vec<Box<dyn Layer>>,
}

impl LayerStack {
    /// Compose a stack from layers ordered bottom first.
    #[must_use]
    pub fn new(layers: Vec<Box<dyn Layer>>) -> Self {
        Self { layers }
    }

    /// The standard stream-dialect stack: transport, record, message.
    #[must_use]
    pub fn for_stream(endpoint: Box<dyn TransportEndpoint>) -> Self {
        Self::new(vec![
            Box::new(TransportLayer::new(endpoint)),
            Box::new(RecordLayer::new()),
            Box::new(MessageLayer::new()),
        ])
    }

    /// The standard datagram-dialect stack: transport, record, message.
    #[must_use]
    pub fn for_datagram(endpoint: Box<dyn TransportEndpoint>) -> Self {
        Self::for_stream(endpoint)
    }

    /// The legacy-dialect stack: transport and record framing only.
    #[must_use]
    pub fn for_legacy(endpoint: Box<dyn TransportEndpoint>) -> Self {
        Self::new(vec![
            Box::new(TransportLayer::new(endpoint)),
            Box::new(RecordLayer::new()),
        ])
    }

    /// Number of layers in the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Send a unit down the whole stack; returns the wire bytes written.
    pub fn send(
        &mut self,
        ctx: &mut Context,
        unit: Container,
        hint: Option<&ProcessingHint>,
    ) -> LayerResult<Bytes> {
        SubStack { layers: &mut self.layers }.send(ctx, unit, hint)
    }

    /// Receive the top layer's unit, pulling bottom-up as needed.
    pub fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
    ) -> LayerResult<Container> {
        SubStack { layers: &mut self.layers }.receive(ctx, hint)
    }

    /// The last hint each layer passed downward, top first.
    #[must_use]
    pub fn last_hints(&self) -> Vec<(&'static str, Option<ProcessingHint>)> {
        self.layers.iter().rev().map(|layer| (layer.name(), layer.last_hint())).collect()
    }
}

impl std::fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerStack")
            .field("layers", &self.layers.iter().map(|l| l.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use wringer_crypto::SessionSecrets;
    use wringer_proto::{ContentType, HandshakeKind, Message};

    use super::*;
    use crate::context::{ConnectionConfig, Role};
    use crate::error::Processed;
    use crate::transport::loopback_pair;

    fn test_config(dialect_config: ConnectionConfig) -> ConnectionConfig {
        ConnectionConfig { timeout: std::time::Duration::from_millis(100), ..dialect_config }
    }

    fn contexts(config: ConnectionConfig) -> (Context, Context) {
        let secrets = SessionSecrets::random();
        let client = Context::new(config.clone(), Role::Client, secrets.clone());
        let server = Context::new(config, Role::Server, secrets);
        (client, server)
    }

    #[test]
    fn stream_message_crosses_the_stack() {
        let (a, b) = loopback_pair();
        let mut sender = LayerStack::for_stream(Box::new(a));
        let mut receiver = LayerStack::for_stream(Box::new(b));
        let (mut client_ctx, mut server_ctx) = contexts(test_config(ConnectionConfig::stream()));

        let message = Message::new(HandshakeKind::ClientHello, vec![0x0A; 64]);
        let sent = sender
            .send(&mut client_ctx, Container::Message(message.clone()), None)
            .unwrap();
        assert!(matches!(sent, Processed::Ok(_)));

        let received = receiver.receive(&mut server_ctx, None).unwrap();
        match received {
            Processed::Ok(Container::Message(m)) => {
                assert_eq!(m.kind, message.kind);
                assert_eq!(m.body, message.body);
            },
            other => unreachable!("expected a message, got {other:?}"),
        }
    }

    #[test]
    fn datagram_message_is_fragmented_and_reassembled() {
        let (a, b) = loopback_pair();
        let mut sender = LayerStack::for_datagram(Box::new(a));
        let mut receiver = LayerStack::for_datagram(Box::new(b));
        let mut config = test_config(ConnectionConfig::datagram());
        config.max_fragment = 16;
        let (mut client_ctx, mut server_ctx) = contexts(config);

        let message = Message::new(HandshakeKind::Certificate, vec![0x42; 50]);
        let sent = sender
            .send(&mut client_ctx, Container::Message(message.clone()), None)
            .unwrap();
        assert!(matches!(sent, Processed::Ok(_)));

        let received = receiver.receive(&mut server_ctx, None).unwrap();
        match received {
            Processed::Ok(Container::Message(m)) => {
                assert_eq!(m.body, message.body);
            },
            other => unreachable!("expected a reassembled message, got {other:?}"),
        }
    }

    #[test]
    fn record_level_receive_with_content_hint() {
        let (a, b) = loopback_pair();
        let mut sender = LayerStack::for_stream(Box::new(a));
        let mut receiver = LayerStack::for_stream(Box::new(b));
        let (mut client_ctx, mut server_ctx) = contexts(test_config(ConnectionConfig::stream()));

        let hint = ProcessingHint::Framing(ContentType::Alert);
        sender
            .send(&mut client_ctx, Container::Bytes(Bytes::from_static(&[2, 40])), Some(&hint))
            .unwrap();

        let expect = ProcessingHint::ExpectContent(ContentType::Alert);
        let received = receiver.receive(&mut server_ctx, Some(&expect)).unwrap();
        match received {
            Processed::Ok(Container::Record(record)) => {
                assert_eq!(record.content_type, ContentType::Alert);
                assert_eq!(record.payload.as_ref(), &[2, 40]);
            },
            other => unreachable!("expected a record, got {other:?}"),
        }
    }

    #[test]
    fn empty_channel_refuses() {
        let mut ctx = contexts(test_config(ConnectionConfig::stream())).0;
        let mut channel = EmptyChannel;
        assert_eq!(
            channel.receive(&mut ctx, None).unwrap_err(),
            TransportError::NoLowerLayer
        );
    }

    #[test]
    fn hints_are_introspectable() {
        let (a, b) = loopback_pair();
        let mut sender = LayerStack::for_stream(Box::new(a));
        let mut receiver = LayerStack::for_stream(Box::new(b));
        let (mut client_ctx, mut server_ctx) = contexts(test_config(ConnectionConfig::stream()));

        let message = Message::new(HandshakeKind::Finished, vec![1, 2, 3]);
        sender.send(&mut client_ctx, Container::Message(message), None).unwrap();
        receiver.receive(&mut server_ctx, None).unwrap();

        let hints = receiver.last_hints();
        // The message layer passed a content expectation to the record layer
        let record_hint = hints.iter().find(|(name, _)| *name == "record").map(|(_, h)| h.clone());
        assert_eq!(
            record_hint,
            Some(Some(ProcessingHint::ExpectContent(ContentType::Handshake)))
        );
    }
}
