//! The six end-to-end scenarios: each exercises a slice of the substrate
//! that no single crate's unit tests cover end to end (arena + capability,
//! capability sealing, DSM causality, replay windows, saturating
//! arithmetic, sparse vector-clock merge).

use seraph_arena::{Arena, ArenaFlags, Perms};
use seraph_clock::{Order, VectorClock};
use seraph_dsm::security::ReplayWindow;
use seraph_dsm::transport::InProcessTransport;
use seraph_dsm::{AetherAddr, ClientNode, DirectoryHome, DsmStatus, Transport};
use seraph_primitives::entropic::{add_i64, mul_i64};
use seraph_primitives::vbit::Vbit;
use seraph_primitives::{OverflowMode, Sentinel};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub pass: bool,
    pub detail: String,
}

impl ScenarioReport {
    fn ok(name: &'static str, detail: impl Into<String>) -> Self {
        Self { name, pass: true, detail: detail.into() }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self { name, pass: false, detail: detail.into() }
    }
}

const ALL: &[(&str, fn() -> ScenarioReport)] = &[
    ("arena-reset-invalidates-capability", arena_reset_invalidates_capability),
    ("sealed-capability-denies-access", sealed_capability_denies_access),
    ("vector-clock-causality", vector_clock_causality),
    ("replay-detection", replay_detection),
    ("saturating-add-signed", saturating_add_signed),
    ("sparse-vclock-merge", sparse_vclock_merge),
];

/// Run every named scenario, in declaration order.
#[must_use]
pub fn run_all() -> Vec<ScenarioReport> {
    ALL.iter().map(|(_, f)| f()).collect()
}

/// Run one scenario by name; `None` if the name is unknown.
#[must_use]
pub fn run_one(name: &str) -> Option<ScenarioReport> {
    ALL.iter().find(|(n, _)| *n == name).map(|(_, f)| f())
}

fn arena_reset_invalidates_capability() -> ScenarioReport {
    let name = "arena-reset-invalidates-capability";
    let mut arena = Arena::create(4096, 8, ArenaFlags::default());
    let base = arena.allocate(128);
    let cap = arena.get_capability(base, 128, Perms::READ | Perms::WRITE);

    let wrote = arena.write_u8(&cap, 0, 0x42);
    if wrote != Vbit::True {
        return ScenarioReport::fail(name, "write before reset did not report VBIT_TRUE");
    }
    let read_back = arena.read_u8(&cap, 0);
    if read_back != 0x42 {
        return ScenarioReport::fail(name, format!("expected 0x42 before reset, got {read_back:#x}"));
    }

    arena.reset();
    let after_reset = arena.read_u8(&cap, 0);
    if after_reset != u8::ABSENT {
        return ScenarioReport::fail(name, format!("expected absent after reset, got {after_reset:#x}"));
    }
    ScenarioReport::ok(name, "write/read succeeded pre-reset, read absent post-reset")
}

fn sealed_capability_denies_access() -> ScenarioReport {
    let name = "sealed-capability-denies-access";
    let mut arena = Arena::create(4096, 8, ArenaFlags::default());
    let base = arena.allocate(64);
    let cap = arena.get_capability(base, 64, Perms::READ | Perms::WRITE | Perms::SEAL | Perms::UNSEAL);
    arena.write_u8(&cap, 0, 0x7a);

    let sealed = cap.seal(42);
    if arena.read_u8(&sealed, 0) != u8::ABSENT {
        return ScenarioReport::fail(name, "sealed capability allowed a read");
    }

    let wrong_unseal = sealed.unseal(99);
    if !wrong_unseal.is_absent() {
        return ScenarioReport::fail(name, "unsealing with the wrong tag produced a live capability");
    }

    let unsealed = sealed.unseal(42);
    if unsealed.is_sealed() || unsealed.perms.contains(Perms::SEAL) || unsealed.perms.contains(Perms::UNSEAL) {
        return ScenarioReport::fail(name, "unsealing with the right tag left seal bits set");
    }
    let value = arena.read_u8(&unsealed, 0);
    if value != 0x7a {
        return ScenarioReport::fail(name, format!("expected 0x7a after unseal, got {value:#x}"));
    }
    ScenarioReport::ok(name, "seal denies access, wrong tag stays absent, right tag restores the byte")
}

/// Drives two real `ClientNode`s against a `DirectoryHome` over an
/// `InProcessTransport`: node A writes a page, node B reads it (pulling
/// A's causal history in through the response's vclock), then B writes.
/// The two observed vclocks must compare `Before`, proving the
/// directory/packet/transport pipeline — not a bare `VectorClock` call —
/// actually propagates causality across a request/response round trip.
fn vector_clock_causality() -> ScenarioReport {
    let name = "vector-clock-causality";
    const HOME: u16 = 0;
    const A: u16 = 1;
    const B: u16 = 2;
    const KEY: &[u8] = b"harness-scenario-key";
    let deadline = Duration::from_secs(1);

    let transport = Arc::new(InProcessTransport::new());
    let mut home = DirectoryHome::new(Arc::clone(&transport), 8, KEY.to_vec());
    let page = match AetherAddr::new(1, 0) {
        Some(p) => p,
        None => return ScenarioReport::fail(name, "failed to build a page address"),
    };
    home.provision(page, vec![0u8; 8]);

    let mut node_a = ClientNode::new(A, HOME, Arc::clone(&transport), 4, 8, KEY.to_vec());
    let mut node_b = ClientNode::new(B, HOME, Arc::clone(&transport), 4, 8, KEY.to_vec());

    node_a.request_write(page);
    let Some(msg) = transport.try_recv(HOME) else {
        return ScenarioReport::fail(name, "home never received node A's write request");
    };
    home.handle(msg);
    let (status, _) = node_a.await_response(page, deadline);
    if status != DsmStatus::Ok {
        return ScenarioReport::fail(name, format!("node A's write was not granted cleanly: {status:?}"));
    }
    let a_vclock = node_a.vclock().clone();

    node_b.request_read(page);
    let Some(msg) = transport.try_recv(HOME) else {
        return ScenarioReport::fail(name, "home never received node B's read request");
    };
    home.handle(msg);
    let (status, _) = node_b.await_response(page, deadline);
    if status != DsmStatus::Ok {
        return ScenarioReport::fail(name, format!("node B's read was not granted cleanly: {status:?}"));
    }

    node_b.request_write(page);
    let Some(msg) = transport.try_recv(HOME) else {
        return ScenarioReport::fail(name, "home never received node B's write request");
    };
    home.handle(msg);
    let (status, _) = node_b.await_response(page, deadline);
    if status != DsmStatus::Ok {
        return ScenarioReport::fail(name, format!("node B's write was not granted cleanly: {status:?}"));
    }
    let b_vclock = node_b.vclock().clone();

    match a_vclock.compare(&b_vclock) {
        Order::Before => ScenarioReport::ok(name, "node A's write-observed vclock compares Before node B's, across a real request/response round trip"),
        other => ScenarioReport::fail(name, format!("expected Before, got {other:?}")),
    }
}

fn replay_detection() -> ScenarioReport {
    let name = "replay-detection";
    let mut window = ReplayWindow::default();

    if !window.check_and_record(100) {
        return ScenarioReport::fail(name, "seq=100 was rejected on first receipt");
    }
    if window.check_and_record(100) {
        return ScenarioReport::fail(name, "seq=100 duplicate was accepted");
    }
    if !window.check_and_record(99) {
        return ScenarioReport::fail(name, "seq=99 (within window, unseen) was rejected");
    }
    if window.check_and_record(35) {
        return ScenarioReport::fail(name, "seq=35 (too old) was accepted");
    }
    ScenarioReport::ok(name, "accept/duplicate/accept/too-old matched the expected sequence")
}

fn saturating_add_signed() -> ScenarioReport {
    let name = "saturating-add-signed";
    let high = add_i64(i64::MAX - 3, 10, OverflowMode::Saturate);
    let low = add_i64(i64::MIN + 3, -10, OverflowMode::Saturate);
    // mul_i64 is exercised here too so the harness covers more than one
    // entropic operation, not just the scenario's literal add.
    let _ = mul_i64(2, 2, OverflowMode::Saturate);
    if high != i64::SAT_MAX {
        return ScenarioReport::fail(name, format!("expected SAT_MAX, got {high}"));
    }
    if low != i64::SAT_MIN {
        return ScenarioReport::fail(name, format!("expected SAT_MIN, got {low}"));
    }
    ScenarioReport::ok(name, "both near-boundary adds saturated to the signed extremes")
}

fn sparse_vclock_merge() -> ScenarioReport {
    let name = "sparse-vclock-merge";
    let mut a = VectorClock::new();
    a.set(1, 5);
    a.set(3, 7);

    let mut b = VectorClock::new();
    b.set(2, 4);
    b.set(3, 6);
    b.set(5, 9);

    a.merge(&b);
    let expected = [(1, 5), (2, 4), (3, 7), (5, 9)];
    let got: Vec<(u16, u64)> = a.entries().to_vec();
    if got.as_slice() != expected.as_slice() {
        return ScenarioReport::fail(name, format!("expected {expected:?}, got {got:?}"));
    }
    ScenarioReport::ok(name, "merge took the per-node maximum and stayed strictly sorted")
}
