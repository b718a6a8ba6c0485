//! Per-domain CAPTCHA backoff tracking (spec §4.E + 4.F interplay): a worker
//! remembers how many times a domain has challenged it and doubles its local
//! cooldown each time, independent of the coordinator's own failure schedule.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CaptchaBackoff {
    strikes: HashMap<String, u32>,
}

impl CaptchaBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a CAPTCHA/block hit for `domain` and return how long this
    /// worker should now avoid it.
    pub fn strike(&mut self, domain: &str, base: Duration, cap: Duration) -> Duration {
        let count = self.strikes.entry(domain.to_string()).or_insert(0);
        *count += 1;
        let multiplier = 1u32 << (*count - 1).min(16);
        let scaled = base.saturating_mul(multiplier);
        scaled.min(cap)
    }

    pub fn reset(&mut self, domain: &str) {
        self.strikes.remove(domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_on_each_repeat_strike() {
        let mut backoff = CaptchaBackoff::new();
        let base = Duration::from_secs(1800);
        let cap = Duration::from_secs(7200);
        assert_eq!(backoff.strike("example.com", base, cap), Duration::from_secs(1800));
        assert_eq!(backoff.strike("example.com", base, cap), Duration::from_secs(3600));
        assert_eq!(backoff.strike("example.com", base, cap), Duration::from_secs(7200));
    }

    #[test]
    fn caps_at_configured_ceiling() {
        let mut backoff = CaptchaBackoff::new();
        let base = Duration::from_secs(1800);
        let cap = Duration::from_secs(7200);
        for _ in 0..10 {
            backoff.strike("example.com", base, cap);
        }
        assert_eq!(backoff.strike("example.com", base, cap), Duration::from_secs(7200));
    }

    #[test]
    fn reset_clears_the_strike_count() {
        let mut backoff = CaptchaBackoff::new();
        let base = Duration::from_secs(1800);
        let cap = Duration::from_secs(7200);
        backoff.strike("example.com", base, cap);
        backoff.reset("example.com");
        assert_eq!(backoff.strike("example.com", base, cap), Duration::from_secs(1800));
    }
}
