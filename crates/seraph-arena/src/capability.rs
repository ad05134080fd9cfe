//! Capability tokens: unforgeable `{base, length, generation, perms}`
//! windows into an arena. Every derivation narrows, it never widens.

use seraph_primitives::absence::Sentinel;

/// Bitmask of operations a capability authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Perms(pub u16);

impl Perms {
    pub const NONE: Perms = Perms(0);
    pub const READ: Perms = Perms(1 << 0);
    pub const WRITE: Perms = Perms(1 << 1);
    pub const EXEC: Perms = Perms(1 << 2);
    pub const DERIVE: Perms = Perms(1 << 3);
    pub const SEAL: Perms = Perms(1 << 4);
    pub const UNSEAL: Perms = Perms(1 << 5);
    pub const GLOBAL: Perms = Perms(1 << 6);
    pub const LOCAL: Perms = Perms(1 << 7);

    #[must_use]
    pub const fn contains(self, other: Perms) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Perms) -> Perms {
        Perms(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersect(self, other: Perms) -> Perms {
        Perms(self.0 & other.0)
    }

    #[must_use]
    pub const fn remove(self, other: Perms) -> Perms {
        Perms(self.0 & !other.0)
    }

    #[must_use]
    pub const fn is_subset_of(self, parent: Perms) -> bool {
        self.0 & !parent.0 == 0
    }
}

impl std::ops::BitOr for Perms {
    type Output = Perms;
    fn bitor(self, rhs: Perms) -> Perms {
        self.union(rhs)
    }
}

/// A capability token: a bounds-checked, generation-stamped window with an
/// attached permission set and an optional seal tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub base: u64,
    pub length: u64,
    pub generation: u32,
    pub perms: Perms,
    pub seal_type: u16,
    pub reserved: u64,
}

impl Capability {
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            base: u64::MAX,
            length: u64::MAX,
            generation: u32::MAX,
            perms: Perms::NONE,
            seal_type: 0,
            reserved: 0,
        }
    }

    #[must_use]
    pub fn new(base: u64, length: u64, generation: u32, perms: Perms, seal_type: u16) -> Self {
        if base == u64::ABSENT || length == u64::ABSENT || generation == u32::ABSENT {
            return Self::absent();
        }
        Self { base, length, generation, perms, seal_type, reserved: 0 }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.base == u64::ABSENT || self.length == u64::ABSENT || self.generation == u32::ABSENT
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.seal_type != 0
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }

    /// Carve a `[offset, offset+length)` sub-window with a permission set
    /// that must be a subset of `self`'s. Requires `DERIVE`. Any violation
    /// yields [`Capability::absent`].
    #[must_use]
    pub fn derive(&self, offset: u64, length: u64, new_perms: Perms) -> Capability {
        if self.is_absent() || self.is_sealed() || !self.perms.contains(Perms::DERIVE) {
            return Capability::absent();
        }
        if offset > self.length || length > self.length - offset {
            return Capability::absent();
        }
        if !new_perms.is_subset_of(self.perms) {
            return Capability::absent();
        }
        Capability::new(self.base + offset, length, self.generation, new_perms, 0)
    }

    /// Narrow the window in place, keeping permissions and seal status.
    /// Unlike [`derive`](Self::derive), this does not require `DERIVE`.
    #[must_use]
    pub fn shrink(&self, offset: u64, length: u64) -> Capability {
        if self.is_absent() {
            return Capability::absent();
        }
        if offset > self.length || length > self.length - offset {
            return Capability::absent();
        }
        let mut c = Capability::new(self.base + offset, length, self.generation, self.perms, self.seal_type);
        c.reserved = self.reserved;
        c
    }

    /// Clear bits from the permission set; never adds any.
    #[must_use]
    pub fn restrict(&self, remove: Perms) -> Capability {
        if self.is_absent() {
            return Capability::absent();
        }
        let mut c = *self;
        c.perms = c.perms.remove(remove);
        c
    }

    /// Stamp a nonzero opaque type tag and drop `SEAL`, so the result can
    /// only be unsealed by a holder with `UNSEAL` and the matching tag.
    #[must_use]
    pub fn seal(&self, type_tag: u16) -> Capability {
        if self.is_absent() || self.is_sealed() || type_tag == 0 || !self.perms.contains(Perms::SEAL) {
            return Capability::absent();
        }
        let mut c = *self;
        c.seal_type = type_tag;
        c.perms = c.perms.remove(Perms::SEAL);
        c
    }

    #[must_use]
    pub fn unseal(&self, expected_type: u16) -> Capability {
        if self.is_absent() || !self.perms.contains(Perms::UNSEAL) || self.seal_type != expected_type {
            return Capability::absent();
        }
        let mut c = *self;
        c.seal_type = 0;
        c.perms = c.perms.remove(Perms::UNSEAL);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_narrows_and_requires_subset_perms() {
        let root = Capability::new(0, 100, 1, Perms::READ | Perms::WRITE | Perms::DERIVE, 0);
        let child = root.derive(10, 20, Perms::READ);
        assert!(!child.is_absent());
        assert_eq!(child.base, 10);
        assert_eq!(child.length, 20);

        let widened = root.derive(10, 20, Perms::EXEC);
        assert!(widened.is_absent());
    }

    #[test]
    fn derive_out_of_window_is_absent() {
        let root = Capability::new(0, 10, 1, Perms::READ | Perms::DERIVE, 0);
        assert!(root.derive(5, 10, Perms::READ).is_absent());
    }

    #[test]
    fn derive_without_derive_perm_is_absent() {
        let root = Capability::new(0, 10, 1, Perms::READ, 0);
        assert!(root.derive(0, 5, Perms::READ).is_absent());
    }

    #[test]
    fn seal_then_unseal_roundtrips() {
        let cap = Capability::new(0, 10, 1, Perms::READ | Perms::SEAL | Perms::UNSEAL, 0);
        let sealed = cap.seal(7);
        assert!(sealed.is_sealed());
        assert!(!sealed.perms.contains(Perms::SEAL));
        let unsealed = sealed.unseal(7);
        assert!(!unsealed.is_sealed());
        assert!(sealed.unseal(8).is_absent());
    }

    #[test]
    fn restrict_only_removes() {
        let cap = Capability::new(0, 10, 1, Perms::READ | Perms::WRITE, 0);
        let restricted = cap.restrict(Perms::WRITE);
        assert!(restricted.perms.contains(Perms::READ));
        assert!(!restricted.perms.contains(Perms::WRITE));
    }
}
