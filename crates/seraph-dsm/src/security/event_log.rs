//! A fixed-capacity ring buffer of security events. Readers always walk
//! newest-first, since an operator reading this log almost always wants
//! "what just happened" rather than "what happened first".

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    AuthenticationFailed,
    ReplayDetected,
    RateLimited,
    PermissionDenied,
    PacketMalformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub source_node: u16,
    pub sequence: u64,
}

/// Ring buffer over the last `capacity` security events. Once full, the
/// oldest entry is overwritten on the next `record`.
pub struct SecurityEventLog {
    buffer: Vec<Option<SecurityEvent>>,
    capacity: usize,
    next: usize,
    filled: bool,
    total_recorded: u64,
}

impl SecurityEventLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { buffer: vec![None; capacity.max(1)], capacity: capacity.max(1), next: 0, filled: false, total_recorded: 0 }
    }

    pub fn record(&mut self, event: SecurityEvent) {
        self.buffer[self.next] = Some(event);
        self.next = (self.next + 1) % self.capacity;
        if self.next == 0 {
            self.filled = true;
        }
        self.total_recorded += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.filled { self.capacity } else { self.next }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Walk entries most-recently-recorded first.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &SecurityEvent> {
        let len = self.len();
        let capacity = self.capacity;
        let next = self.next;
        (0..len).map(move |i| {
            let idx = (next + capacity - 1 - i) % capacity;
            self.buffer[idx].as_ref().expect("index within len() must be populated")
        })
    }
}
