//! Integration tests for the six end-to-end scenarios, run directly
//! against the scenario library rather than through the CLI binary.

use seraph_harness::{run_all, run_one};

#[test]
fn every_scenario_passes() {
    let results = run_all();
    assert_eq!(results.len(), 6, "expected exactly six scenarios");
    for r in &results {
        assert!(r.pass, "scenario {} failed: {}", r.name, r.detail);
    }
}

#[test]
fn arena_reset_invalidates_capability() {
    let r = run_one("arena-reset-invalidates-capability").expect("scenario exists");
    assert!(r.pass, "{}", r.detail);
}

#[test]
fn sealed_capability_denies_access() {
    let r = run_one("sealed-capability-denies-access").expect("scenario exists");
    assert!(r.pass, "{}", r.detail);
}

#[test]
fn vector_clock_causality_detection() {
    let r = run_one("vector-clock-causality").expect("scenario exists");
    assert!(r.pass, "{}", r.detail);
}

#[test]
fn replay_detection_sequence() {
    let r = run_one("replay-detection").expect("scenario exists");
    assert!(r.pass, "{}", r.detail);
}

#[test]
fn saturating_add_on_signed_boundary() {
    let r = run_one("saturating-add-signed").expect("scenario exists");
    assert!(r.pass, "{}", r.detail);
}

#[test]
fn sparse_vclock_merge_preserves_order() {
    let r = run_one("sparse-vclock-merge").expect("scenario exists");
    assert!(r.pass, "{}", r.detail);
}

#[test]
fn unknown_scenario_name_returns_none() {
    assert!(run_one("does-not-exist").is_none());
}
