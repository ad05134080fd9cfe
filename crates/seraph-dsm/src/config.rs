//! DSM defaults resolved once from the environment, mirroring the same
//! loose env-var parsing convention as `seraph_arena::config`: unparsable
//! or out-of-range values fall back to a safe default rather than erroring.

use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct DsmDefaults {
    /// How long a blocking request waits for a response before returning
    /// `DsmStatus::Timeout`.
    pub request_deadline: Duration,
    pub rate_limiter_capacity: u32,
    pub rate_limiter_refill: u32,
    pub replay_log_capacity: usize,
}

impl Default for DsmDefaults {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_secs(5),
            rate_limiter_capacity: 64,
            rate_limiter_refill: crate::security::rate_limit::ONE_TOKEN * 16,
            replay_log_capacity: 256,
        }
    }
}

static DSM_DEFAULTS: OnceLock<DsmDefaults> = OnceLock::new();

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.parse::<u32>().ok())
}

/// Read `SERAPH_DSM_DEADLINE_MS` / `SERAPH_DSM_RATE_CAPACITY` /
/// `SERAPH_DSM_RATE_REFILL` / `SERAPH_DSM_LOG_CAPACITY` once per process
/// and cache the result.
pub fn dsm_defaults() -> DsmDefaults {
    *DSM_DEFAULTS.get_or_init(|| {
        let fallback = DsmDefaults::default();
        DsmDefaults {
            request_deadline: env_u64("SERAPH_DSM_DEADLINE_MS").map_or(fallback.request_deadline, Duration::from_millis),
            rate_limiter_capacity: env_u32("SERAPH_DSM_RATE_CAPACITY").unwrap_or(fallback.rate_limiter_capacity),
            rate_limiter_refill: env_u32("SERAPH_DSM_RATE_REFILL").unwrap_or(fallback.rate_limiter_refill),
            replay_log_capacity: std::env::var("SERAPH_DSM_LOG_CAPACITY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(fallback.replay_log_capacity),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_without_env_overrides() {
        let d = DsmDefaults::default();
        assert_eq!(d.request_deadline, Duration::from_secs(5));
        assert_eq!(d.rate_limiter_capacity, 64);
    }
}
