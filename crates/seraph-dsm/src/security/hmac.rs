//! HMAC-SHA256 authentication for coherence packets, built on the
//! workspace's `sha2` dependency — RFC 2104's key-padding construction is
//! thin glue around the hash, not something worth a whole extra crate for.

use sha2::{Digest, Sha256};

const BLOCK_SIZE: usize = 64;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// Compute HMAC-SHA256(key, message).
#[must_use]
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut block_key = [0u8; BLOCK_SIZE];
    if key.len() > BLOCK_SIZE {
        let digest = Sha256::digest(key);
        block_key[..32].copy_from_slice(&digest);
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut ipad_key = [0u8; BLOCK_SIZE];
    let mut opad_key = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        ipad_key[i] = block_key[i] ^ IPAD;
        opad_key[i] = block_key[i] ^ OPAD;
    }

    let mut inner = Sha256::new();
    inner.update(ipad_key);
    inner.update(message);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(opad_key);
    outer.update(inner_digest);
    outer.finalize().into()
}

/// Verify a tag in constant time (XOR-then-OR accumulation, no early
/// return on mismatch) so a failing comparison can't be distinguished by
/// timing from one that fails later in the buffer.
#[must_use]
pub fn verify(key: &[u8], message: &[u8], tag: &[u8; 32]) -> bool {
    let expected = hmac_sha256(key, message);
    let mut diff = 0u8;
    for (a, b) in expected.iter().zip(tag.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_and_message_reproduces_the_same_tag() {
        let a = hmac_sha256(b"secret", b"payload");
        let b = hmac_sha256(b"secret", b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_produce_different_tags() {
        let a = hmac_sha256(b"secret-a", b"payload");
        let b = hmac_sha256(b"secret-b", b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn oversize_key_is_hashed_down_first() {
        let long_key = vec![0x41u8; 200];
        let tag = hmac_sha256(&long_key, b"payload");
        let tag_again = hmac_sha256(&long_key, b"payload");
        assert_eq!(tag, tag_again);
    }

    #[test]
    fn verify_accepts_correct_tag_and_rejects_tampered() {
        let tag = hmac_sha256(b"key", b"message");
        assert!(verify(b"key", b"message", &tag));
        let mut tampered = tag;
        tampered[0] ^= 1;
        assert!(!verify(b"key", b"message", &tampered));
    }
}
