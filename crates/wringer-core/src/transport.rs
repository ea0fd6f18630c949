//! Blocking transport endpoints.
//!
//! The stack's bottom layer does blocking I/O with a per-call timeout:
//! a receive blocks until data arrives, the timeout elapses, or the peer
//! closes. There is no async model and no automatic retry at this level —
//! retry policy belongs to whoever issues a fresh trace.
//!
//! Three endpoints cover the use cases: TCP for the stream and legacy
//! dialects, UDP for the datagram dialect, and an in-memory loopback pair
//! for deterministic tests.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::TransportError;

/// One blocking byte-transport endpoint.
///
/// `recv_available` returns whatever arrived — possibly short, possibly
/// unparseable. Interpreting the bytes is strictly the upper layers' job.
pub trait TransportEndpoint: Send {
    /// Write all of `bytes` to the peer.
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Block until data arrives, the timeout elapses, or the peer closes.
    fn recv_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Stream-transport endpoint over a connected TCP socket.
#[derive(Debug)]
pub struct TcpEndpoint {
    stream: TcpStream,
}

impl TcpEndpoint {
    /// Wrap an already-connected stream.
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl TransportEndpoint for TcpEndpoint {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).map_err(|e| TransportError::from_io(&e))
    }

    fn recv_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| TransportError::from_io(&e))?;

        let mut buf = vec![0u8; 16 * 1024];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            },
            Err(e) => Err(TransportError::from_io(&e)),
        }
    }
}

/// Datagram-transport endpoint over a connected UDP socket.
///
/// Each `recv_available` returns exactly one datagram.
#[derive(Debug)]
pub struct UdpEndpoint {
    socket: UdpSocket,
}

impl UdpEndpoint {
    /// Wrap an already-connected socket.
    #[must_use]
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl TransportEndpoint for UdpEndpoint {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.socket.send(bytes).map(|_| ()).map_err(|e| TransportError::from_io(&e))
    }

    fn recv_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| TransportError::from_io(&e))?;

        let mut buf = vec![0u8; 64 * 1024];
        match self.socket.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            },
            Err(e) => Err(TransportError::from_io(&e)),
        }
    }
}

#[derive(Debug, Default)]
struct LoopbackQueue {
    state: Mutex<QueueState>,
    readable: Condvar,
}

#[derive(Debug, Default)]
struct QueueState {
    data: VecDeque<u8>,
    closed: bool,
}

fn lock_error() -> TransportError {
    TransportError::Io { message: "loopback queue lock poisoned".to_owned() }
}

/// In-memory endpoint for deterministic tests.
///
/// [`loopback_pair`] returns two connected endpoints: bytes sent on one
/// side become readable on the other. Dropping an endpoint closes the
/// direction its peer reads from.
#[derive(Debug)]
pub struct LoopbackEndpoint {
    incoming: Arc<LoopbackQueue>,
    outgoing: Arc<LoopbackQueue>,
}

/// Create a connected pair of in-memory endpoints.
#[must_use]
pub fn loopback_pair() -> (LoopbackEndpoint, LoopbackEndpoint) {
    let a_to_b = Arc::new(LoopbackQueue::default());
    let b_to_a = Arc::new(LoopbackQueue::default());

    let a = LoopbackEndpoint { incoming: Arc::clone(&b_to_a), outgoing: Arc::clone(&a_to_b) };
    let b = LoopbackEndpoint { incoming: a_to_b, outgoing: b_to_a };
    (a, b)
}

impl LoopbackEndpoint {
    /// Close the outgoing direction, as a peer shutdown would.
    pub fn close(&self) {
        if let Ok(mut state) = self.outgoing.state.lock() {
            state.closed = true;
        }
        self.outgoing.readable.notify_all();
    }
}

impl Drop for LoopbackEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl TransportEndpoint for LoopbackEndpoint {
    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.outgoing.state.lock().map_err(|_| lock_error())?;
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.data.extend(bytes);
        drop(state);
        self.outgoing.readable.notify_all();
        Ok(())
    }

    fn recv_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut state = self.incoming.state.lock().map_err(|_| lock_error())?;
        let deadline = std::time::Instant::now() + timeout;

        while state.data.is_empty() {
            if state.closed {
                return Err(TransportError::Closed);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout);
            }
            let (next, result) = self
                .incoming
                .readable
                .wait_timeout(state, deadline - now)
                .map_err(|_| lock_error())?;
            state = next;
            if result.timed_out() && state.data.is_empty() {
                if state.closed {
                    return Err(TransportError::Closed);
                }
                return Err(TransportError::Timeout);
            }
        }

        Ok(state.data.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn loopback_delivers_bytes() {
        let (mut a, mut b) = loopback_pair();
        a.send_bytes(b"hello").unwrap();
        assert_eq!(b.recv_available(SHORT).unwrap(), b"hello");
    }

    #[test]
    fn loopback_times_out_when_empty() {
        let (_a, mut b) = loopback_pair();
        assert_eq!(b.recv_available(SHORT).unwrap_err(), TransportError::Timeout);
    }

    #[test]
    fn loopback_reports_peer_close() {
        let (a, mut b) = loopback_pair();
        drop(a);
        assert_eq!(b.recv_available(SHORT).unwrap_err(), TransportError::Closed);
    }

    #[test]
    fn loopback_coalesces_pending_bytes() {
        let (mut a, mut b) = loopback_pair();
        a.send_bytes(b"he").unwrap();
        a.send_bytes(b"llo").unwrap();
        assert_eq!(b.recv_available(SHORT).unwrap(), b"hello");
    }

    #[test]
    fn send_to_closed_peer_fails() {
        let (mut a, b) = loopback_pair();
        // Peer closes its read direction by closing our outgoing queue
        b.incoming.state.lock().map(|mut s| s.closed = true).ok();
        assert_eq!(a.send_bytes(b"x").unwrap_err(), TransportError::Closed);
    }
}
