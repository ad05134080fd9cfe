//! Bump-allocator arena, generation epochs, capabilities, and SoA storage.
//!
//! Every pointer in this crate is an arena-relative offset paired with a
//! generation number rather than a raw address: a capability fails its
//! check the moment the arena it came from is reset, which is how cyclic
//! references stay safe without a borrow checker watching them.

#![allow(unsafe_code)]

pub mod arena;
pub mod backing;
pub mod capability;
pub mod cdt;
pub mod config;
pub mod soa;

pub use arena::{Arena, ArenaFlags};
pub use capability::{Capability, Perms};
pub use cdt::{CompactCapability, DescriptorTable};
pub use soa::{FieldDescriptor, Prism, Schema, SoaArray};
