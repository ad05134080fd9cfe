//! Logical time for SERAPH: a scalar Lamport clock with hash-chained
//! events, and a sparse vector clock for distributed causality tracking.

#![deny(unsafe_code)]

pub mod event;
pub mod scalar;
pub mod vector;

pub use event::Event;
pub use scalar::ScalarClock;
pub use vector::{Order, VectorClock};
