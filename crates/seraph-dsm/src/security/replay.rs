//! Sliding-window replay suppression: a 64-bit bitmap trailing the
//! highest sequence number seen from a given source, the same scheme
//! IPsec anti-replay windows use.

/// Per-source replay detector over a 64-packet window.
#[derive(Debug, Clone, Default)]
pub struct ReplayWindow {
    highest_seen: Option<u64>,
    bitmap: u64,
}

impl ReplayWindow {
    #[must_use]
    pub fn new() -> Self {
        Self { highest_seen: None, bitmap: 0 }
    }

    /// Record `seq`, returning `true` if it is accepted (new, within or
    /// ahead of the window) and `false` if it is a replay or too old to
    /// be represented in the window.
    pub fn check_and_record(&mut self, seq: u64) -> bool {
        match self.highest_seen {
            None => {
                self.highest_seen = Some(seq);
                self.bitmap = 1;
                true
            }
            Some(highest) if seq > highest => {
                let shift = seq - highest;
                self.bitmap = if shift >= 64 { 1 } else { (self.bitmap << shift) | 1 };
                self.highest_seen = Some(seq);
                true
            }
            Some(highest) => {
                let back = highest - seq;
                if back >= 64 {
                    return false;
                }
                let bit = 1u64 << back;
                if self.bitmap & bit != 0 {
                    false
                } else {
                    self.bitmap |= bit;
                    true
                }
            }
        }
    }
}
