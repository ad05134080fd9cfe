//! Coherence message transport. [`InProcessTransport`] is a simulated,
//! in-memory substitute for a real network link: good enough to drive
//! the directory/page-cache protocol end to end in tests and the
//! harness without an actual socket.

use crate::page::PageId;
use crate::status::DsmStatus;
use parking_lot::{Condvar, Mutex};
use seraph_clock::VectorClock;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoherenceMessage {
    /// A signed, encoded [`crate::security::Packet`] addressed to this
    /// node — the only message type a client ever originates. The
    /// receiver must run it through `PacketValidator::validate` before
    /// acting on it.
    Request { frame: Vec<u8> },
    /// The home's answer to a request.
    Response { page: PageId, status: DsmStatus, data: Option<Vec<u8>>, generation: u64, vclock: VectorClock },
    /// Stop treating `page` as exclusively writable; the data stays
    /// valid for reads.
    Downgrade { page: PageId },
    /// The local copy of `page` is stale and must be dropped (after a
    /// write-back, if dirty).
    Invalidate { page: PageId },
    /// A client flushing dirty data back to the home ahead of an
    /// invalidation or downgrade.
    WriteBack { page: PageId, data: Vec<u8> },
    /// Administrative revocation, independent of any pending request.
    Revoke { page: PageId, generation: u64 },
}

pub trait Transport {
    fn send(&self, to: u16, msg: CoherenceMessage);
    fn try_recv(&self, node: u16) -> Option<CoherenceMessage>;

    /// Block until a message for `node` arrives or `timeout` elapses.
    /// Returns `None` on timeout. The default implementation busy-polls
    /// `try_recv`; a real transport should instead block on its own I/O.
    fn recv_timeout(&self, node: u16, timeout: Duration) -> Option<CoherenceMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.try_recv(node) {
                return Some(msg);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

/// A per-node mailbox keyed by node id, guarded by a single mutex — fine
/// for the message volumes a test harness or a local simulation produces.
/// `arrived` is notified on every `send` so [`recv_timeout`](Transport::recv_timeout)
/// can block instead of busy-polling.
pub struct InProcessTransport {
    mailboxes: Mutex<HashMap<u16, VecDeque<CoherenceMessage>>>,
    arrived: Condvar,
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessTransport {
    #[must_use]
    pub fn new() -> Self {
        Self { mailboxes: Mutex::new(HashMap::new()), arrived: Condvar::new() }
    }
}

impl Transport for InProcessTransport {
    fn send(&self, to: u16, msg: CoherenceMessage) {
        self.mailboxes.lock().entry(to).or_default().push_back(msg);
        self.arrived.notify_all();
    }

    fn try_recv(&self, node: u16) -> Option<CoherenceMessage> {
        self.mailboxes.lock().get_mut(&node)?.pop_front()
    }

    fn recv_timeout(&self, node: u16, timeout: Duration) -> Option<CoherenceMessage> {
        let mut guard = self.mailboxes.lock();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = guard.get_mut(&node).and_then(VecDeque::pop_front) {
                return Some(msg);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let result = self.arrived.wait_for(&mut guard, deadline - now);
            if result.timed_out() {
                return guard.get_mut(&node).and_then(VecDeque::pop_front);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AetherAddr;

    #[test]
    fn messages_are_delivered_fifo_per_node() {
        let transport = InProcessTransport::new();
        let page = AetherAddr::new(1, 0).unwrap();
        transport.send(5, CoherenceMessage::Invalidate { page });
        transport.send(5, CoherenceMessage::Revoke { page, generation: 1 });
        assert_eq!(transport.try_recv(5), Some(CoherenceMessage::Invalidate { page }));
        assert_eq!(transport.try_recv(5), Some(CoherenceMessage::Revoke { page, generation: 1 }));
        assert_eq!(transport.try_recv(5), None);
    }

    #[test]
    fn other_nodes_mailboxes_are_independent() {
        let transport = InProcessTransport::new();
        let page = AetherAddr::new(1, 0).unwrap();
        transport.send(1, CoherenceMessage::Revoke { page, generation: 0 });
        assert_eq!(transport.try_recv(2), None);
        assert!(transport.try_recv(1).is_some());
    }

    #[test]
    fn recv_timeout_returns_immediately_once_a_message_is_queued() {
        let transport = InProcessTransport::new();
        let page = AetherAddr::new(1, 0).unwrap();
        transport.send(3, CoherenceMessage::Invalidate { page });
        let msg = transport.recv_timeout(3, Duration::from_secs(5));
        assert_eq!(msg, Some(CoherenceMessage::Invalidate { page }));
    }

    #[test]
    fn recv_timeout_gives_up_after_the_deadline() {
        let transport = InProcessTransport::new();
        let start = Instant::now();
        let msg = transport.recv_timeout(9, Duration::from_millis(20));
        assert_eq!(msg, None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
