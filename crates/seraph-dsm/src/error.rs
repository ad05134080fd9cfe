//! Tooling-level errors for DSM setup and packet decoding. The coherence
//! hot path itself stays sentinel/absence-based; this enum is for the
//! boundary where a caller needs to know *why* something was rejected.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DsmError {
    #[error("node id {0} exceeds the 14-bit Aether address space")]
    NodeIdOutOfRange(u16),
    #[error("packet is shorter than the minimum header size")]
    PacketTooShort,
    #[error("packet length field does not match the received buffer")]
    PacketLengthMismatch,
    #[error("unsupported packet version {0}")]
    UnsupportedVersion(u16),
    #[error("HMAC verification failed")]
    AuthenticationFailed,
    #[error("packet sequence number was already seen (replay window)")]
    ReplayDetected,
    #[error("rate limit exceeded for source node {0}")]
    RateLimited(u16),
    #[error("source node {0} lacks permission for operation {1:?}")]
    PermissionDenied(u16, crate::security::permissions::Operation),
    #[error("page {0:?} is not present in this node's cache")]
    PageNotResident(crate::page::PageId),
}
