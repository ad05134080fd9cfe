//! Home-directory DSM nodes: one [`DirectoryHome`] holds the
//! authoritative directory and backing data for a set of pages; any
//! number of [`ClientNode`]s request read/write access to them over a
//! shared [`Transport`] and react to the invalidation/downgrade/revoke
//! messages the home sends back.
//!
//! Every request crosses the wire as a signed [`Packet`] wrapped in
//! [`CoherenceMessage::Request`] and is run through a [`PacketValidator`]
//! before the home ever consults its [`Directory`] — the coherence
//! protocol and the security pipeline are the same pipeline, not two
//! parallel ones.

use crate::address::AetherAddr;
use crate::config::dsm_defaults;
use crate::directory::Directory;
use crate::page::{PageCache, PageId};
use crate::security::packet::{OPCODE_PAGE_REQ, OPCODE_WRITE_REQ};
use crate::security::{Packet, PacketValidator, PermissionMask};
use crate::status::DsmStatus;
use crate::transport::{CoherenceMessage, Transport};
use seraph_clock::{ScalarClock, VectorClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The authoritative side of the protocol: owns the [`Directory`], the
/// canonical copy of every page it is home for, and the validator that
/// gates every inbound request frame.
///
/// `causal` is a vector clock with one entry per node that has ever
/// touched this home, advanced on every granted request. It is not
/// consulted by the coherence protocol itself (the directory alone
/// decides grants) but lets a caller establish a happens-before relation
/// between two requests it observed, independent of message delivery
/// order.
pub struct DirectoryHome<T: Transport> {
    directory: Directory,
    pages: HashMap<PageId, Vec<u8>>,
    transport: Arc<T>,
    page_size: usize,
    causal: VectorClock,
    validator: PacketValidator,
}

impl<T: Transport> DirectoryHome<T> {
    /// `key` is the shared HMAC key every client signing requests to
    /// this home must also hold. Rate limiting, replay window capacity,
    /// and the default permission mask come from [`dsm_defaults`]; every
    /// node starts fully permitted and can be restricted with
    /// [`set_permissions`](Self::set_permissions).
    #[must_use]
    pub fn new(transport: Arc<T>, page_size: usize, key: Vec<u8>) -> Self {
        let defaults = dsm_defaults();
        Self {
            directory: Directory::new(),
            pages: HashMap::new(),
            transport,
            page_size,
            causal: VectorClock::new(),
            validator: PacketValidator::new(
                key,
                defaults.rate_limiter_capacity,
                defaults.rate_limiter_refill,
                PermissionMask::ALL,
                defaults.replay_log_capacity,
            ),
        }
    }

    pub fn set_permissions(&mut self, node: u16, mask: PermissionMask) {
        self.validator.set_permissions(node, mask);
    }

    #[must_use]
    pub fn causal_clock(&self) -> &VectorClock {
        &self.causal
    }

    pub fn provision(&mut self, page: PageId, data: Vec<u8>) {
        self.pages.insert(page, data);
    }

    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    fn page_data(&self, page: PageId) -> Vec<u8> {
        self.pages.get(&page).cloned().unwrap_or_else(|| vec![0u8; self.page_size])
    }

    fn respond(&self, to: u16, page: PageId, status: DsmStatus, data: Option<Vec<u8>>, generation: u64, vclock: VectorClock) {
        self.transport.send(to, CoherenceMessage::Response { page, status, data, generation, vclock });
    }

    /// Receiver logic for one inbound message.
    pub fn handle(&mut self, msg: CoherenceMessage) {
        match msg {
            CoherenceMessage::Request { frame } => self.handle_request(&frame),
            CoherenceMessage::WriteBack { page, data } => {
                self.pages.insert(page, data);
            }
            CoherenceMessage::Response { .. } | CoherenceMessage::Downgrade { .. } | CoherenceMessage::Invalidate { .. } | CoherenceMessage::Revoke { .. } => {}
        }
    }

    /// Runs the full security pipeline over a raw request frame before
    /// the directory is ever consulted. A packet that fails validation
    /// but still structurally decodes gets a `Denied` response back (so
    /// the requester isn't left hanging); one that fails to decode at
    /// all is dropped, matching real packet-loss semantics.
    fn handle_request(&mut self, frame: &[u8]) {
        match self.validator.validate(frame) {
            Ok(packet) => self.process_validated(packet),
            Err(_) => {
                if let Ok(packet) = Packet::decode(frame) {
                    if let Some(page) = AetherAddr::from_raw(packet.offset) {
                        self.respond(packet.source_node, page, DsmStatus::Denied, None, 0, VectorClock::new());
                    }
                }
            }
        }
    }

    fn process_validated(&mut self, packet: Packet) {
        let Some(page) = AetherAddr::from_raw(packet.offset) else { return };
        match packet.opcode {
            OPCODE_PAGE_REQ => self.handle_read(&packet, page),
            OPCODE_WRITE_REQ => self.handle_write(&packet, page),
            _ => self.respond(packet.source_node, page, DsmStatus::Denied, None, 0, VectorClock::new()),
        }
    }

    fn handle_read(&mut self, packet: &Packet, page: PageId) {
        self.causal.increment(packet.source_node);
        let grant = self.directory.request_read(page, packet.source_node, packet.generation, &packet.vclock);
        if let Some(prev_owner) = grant.downgraded_owner {
            self.transport.send(prev_owner, CoherenceMessage::Downgrade { page });
        }
        let data = self.page_data(page);
        let status = if grant.conflict { DsmStatus::Generation } else { DsmStatus::Ok };
        self.respond(packet.source_node, page, status, Some(data), grant.generation, grant.vclock);
    }

    fn handle_write(&mut self, packet: &Packet, page: PageId) {
        self.causal.increment(packet.source_node);
        let grant = self.directory.request_write(page, packet.source_node, packet.generation, &packet.vclock);
        for node in grant.invalidate {
            self.transport.send(node, CoherenceMessage::Invalidate { page });
        }
        let data = self.page_data(page);
        let status = if grant.conflict { DsmStatus::Generation } else { DsmStatus::Ok };
        self.respond(packet.source_node, page, status, Some(data), grant.generation, grant.vclock);
    }

    /// Administrative revocation: invalidate every outstanding copy of a
    /// page, e.g. because the arena backing it was reset.
    pub fn revoke(&mut self, page: PageId) {
        let generation = self.directory.generation(page);
        for node in self.directory.invalidate_all(page) {
            self.transport.send(node, CoherenceMessage::Revoke { page, generation });
        }
    }

    pub fn write_back(&mut self, page: PageId, data: Vec<u8>) {
        self.pages.insert(page, data);
    }
}

/// A client's local view: a page cache plus the home it defers to for
/// coherence decisions. Every outbound request carries the client's own
/// causal vclock and a Lamport timestamp, and is signed with the same
/// key the home validates against.
pub struct ClientNode<T: Transport> {
    node_id: u16,
    home: u16,
    cache: PageCache,
    transport: Arc<T>,
    key: Vec<u8>,
    clock: ScalarClock,
    vclock: VectorClock,
    next_sequence: u32,
}

impl<T: Transport> ClientNode<T> {
    #[must_use]
    pub fn new(node_id: u16, home: u16, transport: Arc<T>, capacity: usize, page_size: usize, key: Vec<u8>) -> Self {
        Self {
            node_id,
            home,
            cache: PageCache::new(capacity, page_size),
            transport,
            key,
            clock: ScalarClock::new(),
            vclock: VectorClock::new_for(node_id),
            next_sequence: 0,
        }
    }

    fn take_sequence(&mut self) -> u32 {
        let seq = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        seq
    }

    fn send_request(&mut self, page: PageId, opcode: u16) {
        let generation = self.cache.generation(page).unwrap_or(0);
        let sequence = self.take_sequence();
        let sender_time = self.clock.tick();
        let packet = Packet::new(opcode, self.node_id, self.home, sequence, page.raw(), generation, sender_time, self.vclock.clone(), Vec::new());
        let frame = packet.encode_signed(&self.key);
        self.transport.send(self.home, CoherenceMessage::Request { frame });
    }

    /// Send a read request; does not wait for the response. Paired with
    /// [`await_response`](Self::await_response) so a caller can interleave
    /// delivery (e.g. driving the home synchronously in a test) instead of
    /// blocking immediately.
    pub fn request_read(&mut self, page: PageId) {
        self.send_request(page, OPCODE_PAGE_REQ);
    }

    pub fn request_write(&mut self, page: PageId) {
        self.send_request(page, OPCODE_WRITE_REQ);
    }

    /// Block until a `Response` for `page` arrives or `deadline` elapses,
    /// applying any other inbound message (invalidate/downgrade/revoke)
    /// encountered along the way. Per the suspension-point contract,
    /// returns `DsmStatus::Timeout` rather than blocking forever.
    pub fn await_response(&mut self, page: PageId, deadline: Duration) -> (DsmStatus, Option<Vec<u8>>) {
        let start = Instant::now();
        loop {
            let Some(remaining) = deadline.checked_sub(start.elapsed()) else { return (DsmStatus::Timeout, None) };
            let Some(msg) = self.transport.recv_timeout(self.node_id, remaining) else { return (DsmStatus::Timeout, None) };
            match msg {
                CoherenceMessage::Response { page: resp_page, status, data, generation, vclock } if resp_page == page => {
                    self.vclock.merge(&vclock);
                    if matches!(status, DsmStatus::Ok | DsmStatus::Generation) {
                        if let Some(d) = data.clone() {
                            self.cache.insert_meta(page, d, self.home, generation, self.clock.timestamp(), vclock);
                        }
                    }
                    return (status, data);
                }
                other => self.apply_inbound(other),
            }
        }
    }

    /// Convenience for a caller that does not need to interleave delivery:
    /// send the request and block for up to `deadline` for the reply.
    pub fn read_through(&mut self, page: PageId, deadline: Duration) -> (DsmStatus, Option<Vec<u8>>) {
        self.request_read(page);
        self.await_response(page, deadline)
    }

    pub fn write_through(&mut self, page: PageId, deadline: Duration) -> (DsmStatus, Option<Vec<u8>>) {
        self.request_write(page);
        self.await_response(page, deadline)
    }

    fn apply_inbound(&mut self, msg: CoherenceMessage) {
        match msg {
            CoherenceMessage::Invalidate { page } => self.handle_invalidate(page),
            CoherenceMessage::Revoke { page, .. } => {
                self.cache.remove(page);
            }
            CoherenceMessage::Downgrade { .. } => {
                // Data stays valid for reads; the node simply stops treating
                // it as exclusively writable, which this cache does not
                // track per-entry (that's the directory's job).
            }
            CoherenceMessage::Request { .. } | CoherenceMessage::Response { .. } | CoherenceMessage::WriteBack { .. } => {}
        }
    }

    /// Flush dirty data back to the home before dropping the local copy,
    /// per the "write back if dirty before invalidating" rule.
    fn handle_invalidate(&mut self, page: PageId) {
        if let Some(data) = self.cache.dirty_data(page) {
            let data = data.to_vec();
            self.transport.send(self.home, CoherenceMessage::WriteBack { page, data });
        }
        self.cache.remove(page);
    }

    /// Drain and apply one inbound message without blocking; returns
    /// `false` once the mailbox is empty. A stray `Response` is applied
    /// the same way [`await_response`](Self::await_response) would.
    pub fn handle_one(&mut self) -> bool {
        let Some(msg) = self.transport.try_recv(self.node_id) else { return false };
        match msg {
            CoherenceMessage::Response { page, status, data, generation, vclock } => {
                self.vclock.merge(&vclock);
                if matches!(status, DsmStatus::Ok | DsmStatus::Generation) {
                    if let Some(d) = data {
                        self.cache.insert_meta(page, d, self.home, generation, self.clock.timestamp(), vclock);
                    }
                }
            }
            other => self.apply_inbound(other),
        }
        true
    }

    pub fn drain(&mut self) {
        while self.handle_one() {}
    }

    #[must_use]
    pub fn read(&mut self, page: PageId) -> Option<&[u8]> {
        self.cache.get(page)
    }

    pub fn write(&mut self, page: PageId, offset: usize, bytes: &[u8]) -> bool {
        let Some(data) = self.cache.get_mut(page) else { return false };
        if offset + bytes.len() > data.len() {
            return false;
        }
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        true
    }

    #[must_use]
    pub fn cached(&self, page: PageId) -> bool {
        self.cache.contains(page)
    }

    #[must_use]
    pub fn vclock(&self) -> &VectorClock {
        &self.vclock
    }
}
