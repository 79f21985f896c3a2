/// Reconnect policy for hub workers
use rand::Rng;
use std::time::Duration;

use crate::config::HubConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: bool,
    /// Consecutive failures tolerated before a topic degrades
    pub max_retries: u32,
    /// Reconnect interval once degraded; `None` means give up
    pub probe_interval: Option<Duration>,
}

impl RetryPolicy {
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
            jitter: config.backoff_jitter,
            max_retries: config.max_retries,
            probe_interval: config
                .probe_after_degraded
                .then(|| Duration::from_secs(config.degraded_probe_secs)),
        }
    }

    /// `base * 2^(retry-1)`, capped at `max`. `retry` starts at 1.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(exponent));
        Duration::from_millis(delay_ms).min(self.max)
    }

    /// `delay` with jitter applied: a uniform pick between half and the full
    /// delay.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let delay = self.delay(retry);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let full = delay.as_millis() as u64;
        let picked = rand::thread_rng().gen_range(full / 2..=full);
        Duration::from_millis(picked)
    }

    pub fn exhausted(&self, failures: u32) -> bool {
        failures > self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(100),
            max: Duration::from_millis(1_000),
            jitter,
            max_retries: 3,
            probe_interval: None,
        }
    }

    #[test]
    fn test_exponential_delay() {
        let policy = policy(false);
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = policy(false);
        assert_eq!(policy.delay(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = policy(true);
        for retry in 1..8 {
            let full = policy.delay(retry);
            for _ in 0..50 {
                let picked = policy.next_delay(retry);
                assert!(picked <= full);
                assert!(picked >= full / 2);
            }
        }
    }

    #[test]
    fn test_exhausted_after_cap() {
        let policy = policy(false);
        assert!(!policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[test]
    fn test_from_config() {
        let config = HubConfig {
            probe_after_degraded: false,
            ..Default::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, config.max_retries);
        assert!(policy.probe_interval.is_none());
    }
}
