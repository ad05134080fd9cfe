//! Packet security pipeline, in order: structural validation, rate
//! limiting, HMAC authentication, replay detection, then permission
//! check. Cheapest and most likely to reject (malformed, flooding)
//! stages run before the HMAC computation so a flood of garbage can't
//! be used to burn CPU on cryptography.

pub mod event_log;
pub mod hmac;
pub mod packet;
pub mod permissions;
pub mod rate_limit;
pub mod replay;

pub use event_log::{SecurityEvent, SecurityEventKind, SecurityEventLog};
pub use hmac::hmac_sha256;
pub use packet::{Packet, PacketError, PacketValidator};
pub use permissions::{Operation, PermissionMask, PermissionTable};
pub use rate_limit::TokenBucket;
pub use replay::ReplayWindow;
