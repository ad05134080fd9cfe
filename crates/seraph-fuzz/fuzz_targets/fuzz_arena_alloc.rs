#![no_main]
use libfuzzer_sys::fuzz_target;
use seraph_arena::{Arena, ArenaFlags, Perms};
use seraph_primitives::Sentinel;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let capacity = 4096usize;
    let mut arena = Arena::create(capacity, 8, ArenaFlags::default());

    let mut total_issued = 0u64;
    for chunk in data.chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let size = u32::from_le_bytes(chunk.try_into().unwrap()) as usize % (capacity + 1);
        let addr = arena.allocate(size);
        if addr != u64::ABSENT {
            // A successful allocation must fit inside the arena and never
            // overlap already-used space.
            assert!(addr as usize + size <= arena.capacity());
            total_issued += size as u64;
            assert!(total_issued <= capacity as u64);

            let cap = arena.get_capability(addr, size as u64, Perms::READ | Perms::WRITE);
            if size > 0 {
                assert!(arena.check_capability(&cap));
            }
        }
    }

    // A capability captured before reset must fail its check afterward.
    let cap_before_reset = arena.get_capability(0, 1, Perms::READ);
    arena.reset();
    if !cap_before_reset.is_absent() {
        assert!(!arena.check_capability(&cap_before_reset));
    }
});
