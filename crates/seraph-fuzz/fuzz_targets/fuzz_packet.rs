#![no_main]
use libfuzzer_sys::fuzz_target;
use seraph_dsm::security::{Packet, PacketValidator, PermissionMask};

fuzz_target!(|data: &[u8]| {
    // Structural decode must never panic on arbitrary bytes.
    let _ = Packet::decode(data);

    // Nor may the full validation pipeline, regardless of whether the
    // HMAC, replay window, or permission table accepts the input.
    let mut validator = PacketValidator::new(b"fuzz-key".to_vec(), 64, 1 << 16, PermissionMask::ALL, 32);
    let _ = validator.validate(data);
});
