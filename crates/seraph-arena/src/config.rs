//! Arena defaults resolved once from the environment, mirroring the loose
//! env-var parsing convention used across the membrane crates: unparsable
//! or out-of-range values fall back to a safe default rather than erroring.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct ArenaDefaults {
    pub default_alignment: usize,
    pub zero_on_alloc: bool,
    pub zero_on_reset: bool,
}

impl Default for ArenaDefaults {
    fn default() -> Self {
        Self { default_alignment: 8, zero_on_alloc: false, zero_on_reset: false }
    }
}

static ARENA_DEFAULTS: OnceLock<ArenaDefaults> = OnceLock::new();

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Read `SERAPH_ARENA_ALIGN` / `SERAPH_ARENA_ZERO_ALLOC` /
/// `SERAPH_ARENA_ZERO_RESET` once per process and cache the result.
pub fn arena_defaults() -> ArenaDefaults {
    *ARENA_DEFAULTS.get_or_init(|| {
        let default_alignment = std::env::var("SERAPH_ARENA_ALIGN")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| v.is_power_of_two())
            .unwrap_or(8);
        ArenaDefaults {
            default_alignment,
            zero_on_alloc: env_flag("SERAPH_ARENA_ZERO_ALLOC"),
            zero_on_reset: env_flag("SERAPH_ARENA_ZERO_RESET"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_env_overrides() {
        let d = ArenaDefaults::default();
        assert_eq!(d.default_alignment, 8);
        assert!(!d.zero_on_alloc);
        assert!(!d.zero_on_reset);
    }
}
