//! Scenario library backing the `seraph-harness` CLI.
//!
//! Each scenario wires together a handful of `seraph-*` crates and checks
//! one end-to-end behavior, returning a JSON-serializable [`ScenarioReport`]
//! rather than panicking, so the CLI can run every scenario and report
//! which ones failed instead of stopping at the first one.

pub mod scenarios;

pub use scenarios::{ScenarioReport, run_all, run_one};
