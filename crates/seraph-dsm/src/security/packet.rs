//! Wire format for coherence packets and the validation pipeline that
//! gates every inbound packet: structural check, rate limit, HMAC,
//! replay, permission — in that order.

use super::event_log::{SecurityEvent, SecurityEventKind, SecurityEventLog};
use super::hmac::{hmac_sha256, verify as hmac_verify};
use super::permissions::{Operation, PermissionMask, PermissionTable};
use super::rate_limit::TokenBucket;
use super::replay::ReplayWindow;
use crate::error::DsmError;
use seraph_clock::VectorClock;
use std::collections::HashMap;
use thiserror::Error;

pub const CURRENT_VERSION: u16 = 1;
pub const MAGIC: u32 = 0x5345_5241; // "SERA"

/// Fixed prefix preceding the variable-length vclock section: magic(4) +
/// version(2) + opcode(2) + source(2) + dst(2) + sequence(4) + offset(8)
/// + generation(8) + sender_time(8) + vclock_len(2) = 42 bytes.
const FIXED_PREFIX_SIZE: usize = 42;
const HMAC_SIZE: usize = 32;
/// Each vclock entry is `(node_id: u16, pad: u16, timestamp: u64)`, same
/// layout `VectorClock::to_bytes` uses.
const VCLOCK_ENTRY_SIZE: usize = 12;

pub const OPCODE_PAGE_REQ: u16 = 0;
pub const OPCODE_PAGE_RESP: u16 = 1;
pub const OPCODE_WRITE_REQ: u16 = 2;
pub const OPCODE_REVOKE: u16 = 3;
pub const OPCODE_INVALIDATE: u16 = 4;
pub const OPCODE_GEN_QUERY: u16 = 5;
pub const OPCODE_GEN_RESP: u16 = 6;
pub const OPCODE_DOWNGRADE: u16 = 7;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet shorter than the minimum fixed-prefix+mac size")]
    TooShort,
    #[error("declared vclock or payload length does not match the buffer size")]
    LengthMismatch,
    #[error("packet magic {0:#x} does not match the expected frame magic")]
    BadMagic(u32),
    #[error("unsupported packet version {0}")]
    UnsupportedVersion(u16),
    #[error("vclock section failed to parse")]
    MalformedVclock,
}

/// A decoded coherence packet.
///
/// Wire layout, little-endian, a fixed 42-byte prefix followed by the
/// vector clock, the payload, and a trailing 32-byte HMAC-SHA256 tag:
///
/// ```text
/// [0..4]   magic       : u32
/// [4..6]   version     : u16
/// [6..8]   opcode      : u16
/// [8..10]  source_node : u16
/// [10..12] dst_node    : u16
/// [12..16] sequence    : u32
/// [16..24] offset      : u64
/// [24..32] generation  : u64
/// [32..40] sender_time : u64
/// [40..42] vclock_len  : u16
/// [42..42+vclock_len*12] vclock entries
/// [..+4]   payload_len : u32
/// [..+payload_len] payload
/// [..+32]  hmac-sha256
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u16,
    pub opcode: u16,
    pub source_node: u16,
    pub dst_node: u16,
    pub sequence: u32,
    pub offset: u64,
    pub generation: u64,
    pub sender_time: u64,
    pub vclock: VectorClock,
    pub payload: Vec<u8>,
}

impl Packet {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opcode: u16,
        source_node: u16,
        dst_node: u16,
        sequence: u32,
        offset: u64,
        generation: u64,
        sender_time: u64,
        vclock: VectorClock,
        payload: Vec<u8>,
    ) -> Self {
        Self { version: CURRENT_VERSION, opcode, source_node, dst_node, sequence, offset, generation, sender_time, vclock, payload }
    }

    fn encode_unsigned(&self) -> Vec<u8> {
        let vclock_bytes = self.vclock.to_bytes();
        // `to_bytes` itself prefixes a u16 count; strip it, we encode our
        // own `vclock_len` field and re-use only the entry bytes.
        let vclock_entries = &vclock_bytes[2..];
        let mut buf = Vec::with_capacity(FIXED_PREFIX_SIZE + vclock_entries.len() + 4 + self.payload.len());
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.opcode.to_le_bytes());
        buf.extend_from_slice(&self.source_node.to_le_bytes());
        buf.extend_from_slice(&self.dst_node.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.generation.to_le_bytes());
        buf.extend_from_slice(&self.sender_time.to_le_bytes());
        buf.extend_from_slice(&(self.vclock.entries().len() as u16).to_le_bytes());
        buf.extend_from_slice(vclock_entries);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Encode with a trailing HMAC-SHA256 over the header, vclock, and
    /// payload.
    #[must_use]
    pub fn encode_signed(&self, key: &[u8]) -> Vec<u8> {
        let mut buf = self.encode_unsigned();
        let tag = hmac_sha256(key, &buf);
        buf.extend_from_slice(&tag);
        buf
    }

    /// Structural decode only — does not check the trailing HMAC.
    pub fn decode(buf: &[u8]) -> Result<Packet, PacketError> {
        if buf.len() < FIXED_PREFIX_SIZE + HMAC_SIZE {
            return Err(PacketError::TooShort);
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().expect("slice is 4 bytes"));
        if magic != MAGIC {
            return Err(PacketError::BadMagic(magic));
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != CURRENT_VERSION {
            return Err(PacketError::UnsupportedVersion(version));
        }
        let opcode = u16::from_le_bytes([buf[6], buf[7]]);
        let source_node = u16::from_le_bytes([buf[8], buf[9]]);
        let dst_node = u16::from_le_bytes([buf[10], buf[11]]);
        let sequence = u32::from_le_bytes(buf[12..16].try_into().expect("slice is 4 bytes"));
        let offset = u64::from_le_bytes(buf[16..24].try_into().expect("slice is 8 bytes"));
        let generation = u64::from_le_bytes(buf[24..32].try_into().expect("slice is 8 bytes"));
        let sender_time = u64::from_le_bytes(buf[32..40].try_into().expect("slice is 8 bytes"));
        let vclock_len = u16::from_le_bytes([buf[40], buf[41]]) as usize;

        let vclock_bytes_start = FIXED_PREFIX_SIZE;
        let vclock_bytes_len = vclock_len * VCLOCK_ENTRY_SIZE;
        let vclock_bytes_end = vclock_bytes_start.checked_add(vclock_bytes_len).ok_or(PacketError::LengthMismatch)?;
        if buf.len() < vclock_bytes_end + 4 {
            return Err(PacketError::TooShort);
        }

        let mut vclock_wire = Vec::with_capacity(2 + vclock_bytes_len);
        vclock_wire.extend_from_slice(&(vclock_len as u16).to_le_bytes());
        vclock_wire.extend_from_slice(&buf[vclock_bytes_start..vclock_bytes_end]);
        let vclock = VectorClock::from_bytes(&vclock_wire).ok_or(PacketError::MalformedVclock)?;

        let payload_len_start = vclock_bytes_end;
        let payload_len =
            u32::from_le_bytes(buf[payload_len_start..payload_len_start + 4].try_into().expect("slice is 4 bytes")) as usize;
        let payload_start = payload_len_start + 4;
        let payload_end = payload_start.checked_add(payload_len).ok_or(PacketError::LengthMismatch)?;
        if buf.len() != payload_end + HMAC_SIZE {
            return Err(PacketError::LengthMismatch);
        }
        let payload = buf[payload_start..payload_end].to_vec();

        Ok(Packet { version, opcode, source_node, dst_node, sequence, offset, generation, sender_time, vclock, payload })
    }

    /// Verify the trailing HMAC tag against everything preceding it.
    #[must_use]
    pub fn verify_hmac(buf: &[u8], key: &[u8]) -> bool {
        if buf.len() < HMAC_SIZE {
            return false;
        }
        let (body, tag_bytes) = buf.split_at(buf.len() - HMAC_SIZE);
        let mut tag = [0u8; HMAC_SIZE];
        tag.copy_from_slice(tag_bytes);
        hmac_verify(key, body, &tag)
    }
}

#[must_use]
fn operation_for_opcode(opcode: u16) -> Option<Operation> {
    match opcode {
        OPCODE_PAGE_REQ => Some(Operation::Read),
        OPCODE_WRITE_REQ => Some(Operation::Write),
        OPCODE_INVALIDATE => Some(Operation::Invalidate),
        OPCODE_REVOKE => Some(Operation::Revoke),
        OPCODE_GEN_QUERY => Some(Operation::GenQuery),
        _ => None,
    }
}

/// Owns the per-source rate limiters, replay windows, and permission
/// table that the validation pipeline consults, plus the event log it
/// records rejections into.
pub struct PacketValidator {
    key: Vec<u8>,
    bucket_capacity: u32,
    bucket_refill: u32,
    buckets: HashMap<u16, TokenBucket>,
    replay_windows: HashMap<u16, ReplayWindow>,
    permissions: PermissionTable,
    pub log: SecurityEventLog,
}

impl PacketValidator {
    #[must_use]
    pub fn new(key: Vec<u8>, bucket_capacity: u32, bucket_refill: u32, default_perms: PermissionMask, log_capacity: usize) -> Self {
        Self {
            key,
            bucket_capacity,
            bucket_refill,
            buckets: HashMap::new(),
            replay_windows: HashMap::new(),
            permissions: PermissionTable::new(default_perms),
            log: SecurityEventLog::new(log_capacity),
        }
    }

    pub fn set_permissions(&mut self, node: u16, mask: PermissionMask) {
        self.permissions.set(node, mask);
    }

    /// Advance every known source's rate limiter by one tick.
    pub fn tick_rate_limiters(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.tick();
        }
    }

    /// Run the full pipeline over a raw wire buffer: structural decode,
    /// rate limit, HMAC, replay, permission.
    pub fn validate(&mut self, buf: &[u8]) -> Result<Packet, DsmError> {
        let packet = Packet::decode(buf).map_err(|e| match e {
            PacketError::TooShort => DsmError::PacketTooShort,
            PacketError::LengthMismatch => DsmError::PacketLengthMismatch,
            PacketError::BadMagic(_) => DsmError::PacketLengthMismatch,
            PacketError::UnsupportedVersion(v) => DsmError::UnsupportedVersion(v),
            PacketError::MalformedVclock => DsmError::PacketLengthMismatch,
        })?;

        let bucket_capacity = self.bucket_capacity;
        let bucket_refill = self.bucket_refill;
        let bucket = self
            .buckets
            .entry(packet.source_node)
            .or_insert_with(|| TokenBucket::new(bucket_capacity, bucket_refill));
        if !bucket.try_consume() {
            self.log.record(SecurityEvent {
                kind: SecurityEventKind::RateLimited,
                source_node: packet.source_node,
                sequence: u64::from(packet.sequence),
            });
            return Err(DsmError::RateLimited(packet.source_node));
        }

        if !Packet::verify_hmac(buf, &self.key) {
            self.log.record(SecurityEvent {
                kind: SecurityEventKind::AuthenticationFailed,
                source_node: packet.source_node,
                sequence: u64::from(packet.sequence),
            });
            return Err(DsmError::AuthenticationFailed);
        }

        let window = self.replay_windows.entry(packet.source_node).or_default();
        if !window.check_and_record(u64::from(packet.sequence)) {
            self.log.record(SecurityEvent {
                kind: SecurityEventKind::ReplayDetected,
                source_node: packet.source_node,
                sequence: u64::from(packet.sequence),
            });
            return Err(DsmError::ReplayDetected);
        }

        if let Some(op) = operation_for_opcode(packet.opcode) {
            if !self.permissions.check(packet.source_node, op) {
                self.log.record(SecurityEvent {
                    kind: SecurityEventKind::PermissionDenied,
                    source_node: packet.source_node,
                    sequence: u64::from(packet.sequence),
                });
                return Err(DsmError::PermissionDenied(packet.source_node, op));
            }
        }

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test-key";

    fn signed_read_request(source: u16, seq: u32) -> Vec<u8> {
        Packet::new(OPCODE_PAGE_REQ, source, 0, seq, 0xAB, 1, 1, VectorClock::new(), vec![1, 2, 3]).encode_signed(KEY)
    }

    #[test]
    fn encode_decode_roundtrips_fields() {
        let mut vclock = VectorClock::new();
        vclock.set(1, 5);
        vclock.set(2, 3);
        let packet = Packet::new(OPCODE_WRITE_REQ, 42, 7, 7, 0x1234, 3, 9, vclock, vec![9, 9]);
        let bytes = packet.encode_signed(KEY);
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert!(Packet::verify_hmac(&bytes, KEY));
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = signed_read_request(1, 1);
        bytes[0] ^= 0xFF;
        assert!(matches!(Packet::decode(&bytes), Err(PacketError::BadMagic(_))));
    }

    #[test]
    fn tampered_payload_fails_hmac() {
        let mut bytes = signed_read_request(1, 1);
        let last = bytes.len() - 1 - HMAC_SIZE;
        bytes[last] ^= 0xFF;
        assert!(!Packet::verify_hmac(&bytes, KEY));
    }

    #[test]
    fn pipeline_accepts_a_well_formed_authorized_packet() {
        let mut validator = PacketValidator::new(KEY.to_vec(), 10, 10 * super::super::rate_limit::ONE_TOKEN, PermissionMask::ALL, 16);
        let bytes = signed_read_request(1, 1);
        assert!(validator.validate(&bytes).is_ok());
    }

    #[test]
    fn pipeline_rejects_replayed_sequence() {
        let mut validator = PacketValidator::new(KEY.to_vec(), 10, 10 * super::super::rate_limit::ONE_TOKEN, PermissionMask::ALL, 16);
        let bytes = signed_read_request(1, 5);
        assert!(validator.validate(&bytes).is_ok());
        assert!(matches!(validator.validate(&bytes), Err(DsmError::ReplayDetected)));
    }

    #[test]
    fn pipeline_rejects_unauthenticated_packet() {
        let mut validator = PacketValidator::new(b"other-key".to_vec(), 10, 10 * super::super::rate_limit::ONE_TOKEN, PermissionMask::ALL, 16);
        let bytes = signed_read_request(1, 1);
        assert!(matches!(validator.validate(&bytes), Err(DsmError::AuthenticationFailed)));
    }

    #[test]
    fn pipeline_rejects_denied_permission() {
        let mut validator = PacketValidator::new(KEY.to_vec(), 10, 10 * super::super::rate_limit::ONE_TOKEN, PermissionMask::NONE, 16);
        let bytes = signed_read_request(1, 1);
        assert!(matches!(validator.validate(&bytes), Err(DsmError::PermissionDenied(1, Operation::Read))));
    }

    #[test]
    fn pipeline_rejects_exhausted_rate_limit() {
        let mut validator = PacketValidator::new(KEY.to_vec(), 1, 0, PermissionMask::ALL, 16);
        assert!(validator.validate(&signed_read_request(1, 1)).is_ok());
        assert!(matches!(validator.validate(&signed_read_request(1, 2)), Err(DsmError::RateLimited(1))));
    }

    #[test]
    fn rejected_packets_are_recorded_newest_first() {
        let mut validator = PacketValidator::new(KEY.to_vec(), 10, 10 * super::super::rate_limit::ONE_TOKEN, PermissionMask::ALL, 16);
        let bytes = signed_read_request(1, 9);
        validator.validate(&bytes).unwrap();
        validator.validate(&bytes).unwrap_err();
        let kinds: Vec<_> = validator.log.iter_newest_first().map(|e| e.kind).collect();
        assert_eq!(kinds[0], SecurityEventKind::ReplayDetected);
    }

    #[test]
    fn packet_carries_a_nonempty_vclock_through_the_wire() {
        let mut vclock = VectorClock::new();
        vclock.set(3, 11);
        let packet = Packet::new(OPCODE_PAGE_RESP, 2, 1, 4, 0, 1, 1, vclock.clone(), Vec::new());
        let bytes = packet.encode_signed(KEY);
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.vclock.entries(), vclock.entries());
    }
}
