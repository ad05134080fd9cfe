#![no_main]
use libfuzzer_sys::fuzz_target;
use seraph_arena::{Capability, Perms};

fuzz_target!(|data: &[u8]| {
    if data.len() < 24 {
        return;
    }
    let base = u64::from_le_bytes(data[0..8].try_into().unwrap());
    let length = u64::from_le_bytes(data[8..16].try_into().unwrap());
    let generation = u32::from_le_bytes(data[16..20].try_into().unwrap());
    let perms = Perms(u16::from_le_bytes(data[20..22].try_into().unwrap()));
    let derive_offset = u64::from(data[22]);
    let derive_length = u64::from(data[23]);

    let root = Capability::new(base, length, generation, perms, 0);

    let child = root.derive(derive_offset, derive_length, perms);
    if !child.is_absent() {
        // A surviving derivation must never widen the window or the
        // permission set beyond the parent's.
        assert!(child.perms.is_subset_of(root.perms));
        assert!(child.base >= root.base);
        assert!(child.base.saturating_add(child.length) <= root.end());
    }

    let shrunk = root.shrink(derive_offset, derive_length);
    if !shrunk.is_absent() {
        assert_eq!(shrunk.perms, root.perms);
    }

    // restrict(perms) clears exactly the bits it was given; since we pass
    // the capability's own full permission set, nothing should remain.
    let restricted = root.restrict(perms);
    if !restricted.is_absent() {
        assert_eq!(restricted.perms, Perms::NONE);
    }
});
