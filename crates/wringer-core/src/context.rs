//! Per-connection state.
//!
//! One [`Context`] exists per connection attempt. It owns everything the
//! layers need to agree on: the dialect and negotiated parameters, the
//! per-direction sequence counters (with epochs in the datagram dialect),
//! the active record transforms, and the record-field overrides a test may
//! have configured. The execution engine is the sole owner; layers receive
//! it by `&mut` for the duration of one call and never store it.

use std::time::Duration;

use wringer_crypto::{KeyBlock, RecordTransform, SessionSecrets, TransformSuite};
use wringer_proto::{ContentType, Dialect, ProtocolVersion, SEQUENCE_MASK};

/// Which peer this connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connection initiator
    Client,
    /// Connection responder
    Server,
}

/// Which direction's cipher state an activation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Records this side protects and sends
    Outbound,
    /// Records this side receives and unprotects
    Inbound,
    /// Both at once
    Both,
}

/// Static configuration of one connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Wire dialect
    pub dialect: Dialect,
    /// Version written into record headers
    pub version: ProtocolVersion,
    /// Blocking-receive timeout at the transport boundary
    pub timeout: Duration,
    /// Maximum fragment body size for datagram message sub-framing
    pub max_fragment: usize,
    /// Whether record-length boundaries are throwing or logged
    pub throwing_boundaries: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Stream,
            version: ProtocolVersion::V12,
            timeout: Duration::from_secs(5),
            max_fragment: 1024,
            throwing_boundaries: true,
        }
    }
}

impl ConnectionConfig {
    /// Stream-dialect defaults.
    #[must_use]
    pub fn stream() -> Self {
        Self::default()
    }

    /// Datagram-dialect defaults.
    #[must_use]
    pub fn datagram() -> Self {
        Self { dialect: Dialect::Datagram, version: ProtocolVersion::D12, ..Self::default() }
    }

    /// Legacy-dialect defaults.
    #[must_use]
    pub fn legacy() -> Self {
        Self { dialect: Dialect::Legacy, version: ProtocolVersion::V10, ..Self::default() }
    }
}

/// Per-test overrides for record header fields.
///
/// Any field set here is written into outgoing records verbatim, replacing
/// the value the engine would have computed. This is how traces lie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOverrides {
    /// Replace the content type of outgoing records
    pub content_type: Option<ContentType>,
    /// Replace the header version of outgoing records
    pub version: Option<ProtocolVersion>,
    /// Replace the declared length of outgoing records
    pub length: Option<u16>,
    /// Replace the epoch of outgoing datagram records
    pub epoch: Option<u16>,
    /// Replace the sequence number of outgoing datagram records
    pub sequence_number: Option<u64>,
}

/// One direction's sequence state: epoch plus 48-bit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceState {
    /// Current cipher-state epoch (datagram dialect)
    epoch: u16,
    /// Next sequence number to assign
    next: u64,
}

impl SequenceState {
    fn new() -> Self {
        Self { epoch: 0, next: 0 }
    }

    /// Current epoch.
    #[must_use]
    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    /// Next sequence number that will be assigned.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Assign the next sequence number, wrapping in the 48-bit space.
    pub fn take(&mut self) -> u64 {
        let value = self.next;
        self.next = (self.next + 1) & SEQUENCE_MASK;
        value
    }

    /// Enter the next epoch, resetting the counter.
    pub fn advance_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.next = 0;
    }

    /// The 64-bit scoped value for a given sequence number: epoch high,
    /// sequence low.
    #[must_use]
    pub fn scoped(&self, sequence: u64) -> u64 {
        (u64::from(self.epoch) << 48) | (sequence & SEQUENCE_MASK)
    }
}

/// Mutable per-connection state, owned by the execution engine.
#[derive(Debug)]
pub struct Context {
    config: ConnectionConfig,
    role: Role,
    secrets: SessionSecrets,
    pending_suite: TransformSuite,
    send_transform: RecordTransform,
    recv_transform: RecordTransform,
    send_seq: SequenceState,
    recv_seq: SequenceState,
    overrides: RecordOverrides,
    key_block: Option<KeyBlock>,
}

impl Context {
    /// Create a fresh context in the unprotected initial state.
    #[must_use]
    pub fn new(config: ConnectionConfig, role: Role, secrets: SessionSecrets) -> Self {
        let version = config.version;
        Self {
            config,
            role,
            secrets,
            pending_suite: TransformSuite::plaintext(),
            send_transform: RecordTransform::plaintext(version),
            recv_transform: RecordTransform::plaintext(version),
            send_seq: SequenceState::new(),
            recv_seq: SequenceState::new(),
            overrides: RecordOverrides::default(),
            key_block: None,
        }
    }

    /// Connection configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Wire dialect of this connection.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// This side's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Negotiated version written into record headers.
    #[must_use]
    pub fn version(&self) -> ProtocolVersion {
        self.overrides.version.unwrap_or(self.config.version)
    }

    /// The suite the next cipher activation will install.
    #[must_use]
    pub fn pending_suite(&self) -> TransformSuite {
        self.pending_suite
    }

    /// Stage the suite a later activation will install.
    pub fn set_pending_suite(&mut self, suite: TransformSuite) {
        self.pending_suite = suite;
        self.key_block = None;
    }

    /// Replace the session secrets (e.g. after a key exchange).
    pub fn set_secrets(&mut self, secrets: SessionSecrets) {
        self.secrets = secrets;
        self.key_block = None;
    }

    /// Record-field overrides for outgoing records.
    #[must_use]
    pub fn overrides(&self) -> &RecordOverrides {
        &self.overrides
    }

    /// Mutable access to the record-field overrides.
    pub fn overrides_mut(&mut self) -> &mut RecordOverrides {
        &mut self.overrides
    }

    /// Send-direction sequence state.
    #[must_use]
    pub fn send_sequence(&self) -> SequenceState {
        self.send_seq
    }

    /// Receive-direction sequence state.
    #[must_use]
    pub fn recv_sequence(&self) -> SequenceState {
        self.recv_seq
    }

    /// Assign the next send sequence number, returning `(sequence, scoped)`.
    pub fn next_send_sequence(&mut self) -> (u64, u64) {
        let sequence = self.send_seq.take();
        (sequence, self.send_seq.scoped(sequence))
    }

    /// Assign the next receive sequence number (stream dialect, where the
    /// counter is implicit), returning the scoped value.
    pub fn next_recv_sequence(&mut self) -> u64 {
        let sequence = self.recv_seq.take();
        self.recv_seq.scoped(sequence)
    }

    /// Active send-direction transform.
    pub fn send_transform_mut(&mut self) -> &mut RecordTransform {
        &mut self.send_transform
    }

    /// Active receive-direction transform.
    pub fn recv_transform_mut(&mut self) -> &mut RecordTransform {
        &mut self.recv_transform
    }

    fn derived_key_block(&mut self) -> Result<KeyBlock, wringer_crypto::CryptoError> {
        if let Some(block) = &self.key_block {
            return Ok(block.clone());
        }
        let block =
            KeyBlock::derive(&self.secrets, self.pending_suite.mac, self.pending_suite.cipher)?;
        self.key_block = Some(block.clone());
        Ok(block)
    }

    /// Install the pending suite for the given direction(s).
    ///
    /// In the datagram dialect an outbound activation also advances the
    /// send epoch and resets its sequence counter; inbound likewise.
    pub fn activate_cipher(
        &mut self,
        direction: Direction,
    ) -> Result<(), wringer_crypto::CryptoError> {
        let block = self.derived_key_block()?;
        let version = self.config.version;
        let suite = self.pending_suite;

        let (out_keys, in_keys) = match self.role {
            Role::Client => (&block.client, &block.server),
            Role::Server => (&block.server, &block.client),
        };

        if matches!(direction, Direction::Outbound | Direction::Both) {
            self.send_transform = RecordTransform::select(version, suite, out_keys)?;
            if self.config.dialect == Dialect::Datagram {
                self.send_seq.advance_epoch();
            } else {
                self.send_seq = SequenceState::new();
            }
        }
        if matches!(direction, Direction::Inbound | Direction::Both) {
            self.recv_transform = RecordTransform::select(version, suite, in_keys)?;
            if self.config.dialect == Dialect::Datagram {
                self.recv_seq.advance_epoch();
            } else {
                self.recv_seq = SequenceState::new();
            }
        }
        Ok(())
    }

    /// The transport timeout for blocking receives.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

#[cfg(test)]
mod tests {
    use wringer_crypto::PaddingScheme;
    use wringer_proto::{CipherKind, CompressionMethod, MacAlgorithm};

    use super::*;

    fn context(config: ConnectionConfig) -> Context {
        Context::new(config, Role::Client, SessionSecrets::random())
    }

    #[test]
    fn sequence_numbers_are_consecutive() {
        let mut ctx = context(ConnectionConfig::stream());
        assert_eq!(ctx.next_send_sequence().0, 0);
        assert_eq!(ctx.next_send_sequence().0, 1);
        assert_eq!(ctx.next_send_sequence().0, 2);
    }

    #[test]
    fn sequence_wraps_in_48_bits() {
        let mut seq = SequenceState::new();
        seq.next = SEQUENCE_MASK;
        assert_eq!(seq.take(), SEQUENCE_MASK);
        assert_eq!(seq.take(), 0);
    }

    #[test]
    fn datagram_activation_advances_epoch() {
        let mut ctx = context(ConnectionConfig::datagram());
        ctx.next_send_sequence();
        ctx.next_send_sequence();
        assert_eq!(ctx.send_sequence().epoch(), 0);

        ctx.set_pending_suite(TransformSuite {
            compression: CompressionMethod::Null,
            mac: MacAlgorithm::HmacSha256,
            cipher: CipherKind::ChaCha20Poly1305,
            padding: PaddingScheme::None,
        });
        ctx.activate_cipher(Direction::Outbound).unwrap();

        assert_eq!(ctx.send_sequence().epoch(), 1);
        assert_eq!(ctx.send_sequence().peek(), 0);
        // Inbound untouched
        assert_eq!(ctx.recv_sequence().epoch(), 0);
    }

    #[test]
    fn stream_activation_resets_counter_without_epoch() {
        let mut ctx = context(ConnectionConfig::stream());
        ctx.next_send_sequence();
        ctx.activate_cipher(Direction::Both).unwrap();
        assert_eq!(ctx.send_sequence().epoch(), 0);
        assert_eq!(ctx.send_sequence().peek(), 0);
    }

    #[test]
    fn scoped_sequence_packs_epoch() {
        let mut seq = SequenceState::new();
        seq.advance_epoch();
        seq.advance_epoch();
        assert_eq!(seq.scoped(5), (2u64 << 48) | 5);
    }

    #[test]
    fn version_override_wins() {
        let mut ctx = context(ConnectionConfig::stream());
        assert_eq!(ctx.version(), ProtocolVersion::V12);
        ctx.overrides_mut().version = Some(ProtocolVersion::V10);
        assert_eq!(ctx.version(), ProtocolVersion::V10);
    }
}
