//! Bottom layer: blocking endpoint I/O.

use bytes::Bytes;

use crate::context::Context;
use crate::error::{Deviation, DeviationKind, LayerResult, Processed};
use crate::layer::{Container, Layer, LayerChannel, ProcessingHint};
use crate::transport::TransportEndpoint;

/// The stack's bottom element: writes bytes to and reads bytes from an
/// already-connected transport endpoint.
///
/// Timeouts and closures surface as transport errors, which are fatal to
/// the running trace; this layer never produces partial success.
pub struct TransportLayer {
    endpoint: Box<dyn TransportEndpoint>,
    last_hint: Option<ProcessingHint>,
}

impl TransportLayer {
    /// Wrap an endpoint as the bottom of a stack.
    #[must_use]
    pub fn new(endpoint: Box<dyn TransportEndpoint>) -> Self {
        Self { endpoint, last_hint: None }
    }
}

impl std::fmt::Debug for TransportLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLayer").field("last_hint", &self.last_hint).finish_non_exhaustive()
    }
}

impl Layer for TransportLayer {
    fn name(&self) -> &'static str {
        "transport"
    }

    fn send(
        &mut self,
        ctx: &mut Context,
        unit: Container,
        hint: Option<&ProcessingHint>,
        _below: &mut dyn LayerChannel,
    ) -> LayerResult<Bytes> {
        let _ = ctx;
        self.last_hint = hint.cloned();

        let Container::Bytes(bytes) = unit else {
            return Ok(Processed::Deviation(Deviation::new(
                self.name(),
                DeviationKind::Unexpected(format!(
                    "transport layer can only send raw bytes, got {}",
                    unit.label()
                )),
                Bytes::new(),
            )));
        };

        tracing::debug!(len = bytes.len(), "transport send");
        self.endpoint.send_bytes(&bytes)?;
        Ok(Processed::Ok(bytes))
    }

    fn receive(
        &mut self,
        ctx: &mut Context,
        hint: Option<&ProcessingHint>,
        _below: &mut dyn LayerChannel,
    ) -> LayerResult<Container> {
        self.last_hint = hint.cloned();

        let bytes = self.endpoint.recv_available(ctx.timeout())?;
        tracing::debug!(len = bytes.len(), "transport receive");
        Ok(Processed::Ok(Container::Bytes(Bytes::from(bytes))))
    }

    fn last_hint(&self) -> Option<ProcessingHint> {
        self.last_hint.clone()
    }
}

#[cfg(test)]
mod tests {
    use wringer_crypto::SessionSecrets;

    use super::*;
    use crate::context::{ConnectionConfig, Role};
    use crate::error::TransportError;
    use crate::stack::EmptyChannel;
    use crate::transport::loopback_pair;

    fn ctx() -> Context {
        let config = ConnectionConfig {
            timeout: std::time::Duration::from_millis(50),
            ..ConnectionConfig::stream()
        };
        Context::new(config, Role::Client, SessionSecrets::random())
    }

    #[test]
    fn sends_and_receives_raw_bytes() {
        let (a, b) = loopback_pair();
        let mut sender = TransportLayer::new(Box::new(a));
        let mut receiver = TransportLayer::new(Box::new(b));
        let mut ctx = ctx();

        let sent = sender
            .send(&mut ctx, Container::Bytes(Bytes::from_static(b"ping")), None, &mut EmptyChannel)
            .unwrap();
        assert!(matches!(sent, Processed::Ok(ref b) if b.as_ref() == b"ping"));

        let received = receiver.receive(&mut ctx, None, &mut EmptyChannel).unwrap();
        assert!(matches!(
            received,
            Processed::Ok(Container::Bytes(ref b)) if b.as_ref() == b"ping"
        ));
    }

    #[test]
    fn non_byte_unit_is_a_deviation() {
        let (a, _b) = loopback_pair();
        let mut layer = TransportLayer::new(Box::new(a));
        let mut ctx = ctx();

        let message = wringer_proto::Message::new(wringer_proto::HandshakeKind::Finished, vec![]);
        let result = layer
            .send(&mut ctx, Container::Message(message), None, &mut EmptyChannel)
            .unwrap();
        assert!(matches!(result, Processed::Deviation(ref d) if d.layer == "transport"));
    }

    #[test]
    fn timeout_is_fatal() {
        let (_a, b) = loopback_pair();
        let mut layer = TransportLayer::new(Box::new(b));
        let mut ctx = ctx();

        let err = layer.receive(&mut ctx, None, &mut EmptyChannel).unwrap_err();
        assert_eq!(err, TransportError::Timeout);
    }
}
