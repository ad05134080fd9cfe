//! Absence-propagating primitives for SERAPH.
//!
//! Every width reserves one bit pattern as "no value" (VOID). These
//! sentinels flow through tri-valued logic, entropic arithmetic, and bit
//! operations without an out-of-band error channel: a caller distinguishes
//! absence from a valid value by comparing against the sentinel, or by
//! matching on [`Absent`].

#![deny(unsafe_code)]

pub mod absence;
pub mod bits;
pub mod entropic;
pub mod vbit;

pub use absence::{Sentinel, is_absent, mask_of, select};
pub use entropic::OverflowMode;
pub use vbit::Vbit;
