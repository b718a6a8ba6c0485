use std::env;
use std::time::Duration;

/// Runtime configuration, loaded from environment variables.
///
/// All values are the spec's documented defaults (spec §6) unless an
/// operator overrides them. Nothing here is required to be set — a bare
/// environment boots with sane defaults, matching the corpus's pattern of
/// `Config::from_env()` panicking only on genuinely required secrets (of
/// which this crawler core has none: the database URL is the only
/// required value, and only for the binaries that touch Postgres).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    pub domain_cooldown: Duration,
    pub max_domain_failures: u32,
    pub domain_pause: Duration,
    pub worker_timeout: Duration,
    pub min_domains_per_worker: usize,
    pub max_domains_per_worker: usize,
    pub batch_sleep_multi_domain: Duration,
    pub batch_sleep_single_domain: Duration,
    pub inter_request_min: Duration,
    pub inter_request_max: Duration,
    pub inter_request_min_single_domain: Duration,
    pub inter_request_max_single_domain: Duration,
    pub captcha_backoff_base: Duration,
    pub captcha_backoff_cap: Duration,

    pub candidate_expiration_days: i64,
    pub rss_missing_threshold: u32,
    pub rss_transient_threshold: u32,
    pub rss_transient_window_days: i64,
    pub rss_retry_window_days: i64,

    pub default_cadence_hours: u32,
    pub single_domain_min_cadence_hours: u32,

    pub coordinator_host: String,
    pub coordinator_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            domain_cooldown: Duration::from_secs(60),
            max_domain_failures: 3,
            domain_pause: Duration::from_secs(1800),
            worker_timeout: Duration::from_secs(600),
            min_domains_per_worker: 3,
            max_domains_per_worker: 5,
            batch_sleep_multi_domain: Duration::from_secs(30),
            batch_sleep_single_domain: Duration::from_secs(300),
            inter_request_min: Duration::from_secs(10),
            inter_request_max: Duration::from_secs(30),
            inter_request_min_single_domain: Duration::from_secs(90),
            inter_request_max_single_domain: Duration::from_secs(180),
            captcha_backoff_base: Duration::from_secs(1800),
            captcha_backoff_cap: Duration::from_secs(7200),
            candidate_expiration_days: 7,
            rss_missing_threshold: 3,
            rss_transient_threshold: 5,
            rss_transient_window_days: 7,
            rss_retry_window_days: 30,
            default_cadence_hours: 6,
            single_domain_min_cadence_hours: 24,
            coordinator_host: "0.0.0.0".to_string(),
            coordinator_port: 4500,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// spec-documented defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            domain_cooldown: env_secs("DOMAIN_COOLDOWN_SECONDS", defaults.domain_cooldown),
            max_domain_failures: env_u32("MAX_DOMAIN_FAILURES", defaults.max_domain_failures),
            domain_pause: env_secs("DOMAIN_PAUSE_SECONDS", defaults.domain_pause),
            worker_timeout: env_secs("WORKER_TIMEOUT_SECONDS", defaults.worker_timeout),
            min_domains_per_worker: env_usize(
                "MIN_DOMAINS_PER_WORKER",
                defaults.min_domains_per_worker,
            ),
            max_domains_per_worker: env_usize(
                "MAX_DOMAINS_PER_WORKER",
                defaults.max_domains_per_worker,
            ),
            batch_sleep_multi_domain: env_secs(
                "BATCH_SLEEP_SECONDS",
                defaults.batch_sleep_multi_domain,
            ),
            batch_sleep_single_domain: defaults.batch_sleep_single_domain,
            inter_request_min: env_secs("INTER_REQUEST_MIN", defaults.inter_request_min),
            inter_request_max: env_secs("INTER_REQUEST_MAX", defaults.inter_request_max),
            inter_request_min_single_domain: defaults.inter_request_min_single_domain,
            inter_request_max_single_domain: defaults.inter_request_max_single_domain,
            captcha_backoff_base: env_secs(
                "CAPTCHA_BACKOFF_BASE",
                defaults.captcha_backoff_base,
            ),
            captcha_backoff_cap: defaults.captcha_backoff_cap,
            candidate_expiration_days: env_i64(
                "CANDIDATE_EXPIRATION_DAYS",
                defaults.candidate_expiration_days,
            ),
            rss_missing_threshold: env_u32(
                "RSS_MISSING_THRESHOLD",
                defaults.rss_missing_threshold,
            ),
            rss_transient_threshold: env_u32(
                "RSS_TRANSIENT_THRESHOLD",
                defaults.rss_transient_threshold,
            ),
            rss_transient_window_days: env_i64(
                "RSS_TRANSIENT_WINDOW_DAYS",
                defaults.rss_transient_window_days,
            ),
            rss_retry_window_days: env_i64(
                "RSS_RETRY_WINDOW_DAYS",
                defaults.rss_retry_window_days,
            ),
            default_cadence_hours: env_u32("DEFAULT_CADENCE_HOURS", defaults.default_cadence_hours),
            single_domain_min_cadence_hours: env_u32(
                "SINGLE_DOMAIN_MIN_CADENCE_HOURS",
                defaults.single_domain_min_cadence_hours,
            ),
            coordinator_host: env::var("COORDINATOR_HOST")
                .unwrap_or(defaults.coordinator_host),
            coordinator_port: env_u16("COORDINATOR_PORT", defaults.coordinator_port),
        }
    }

    /// Require `DATABASE_URL` to be set, panicking with a clear message otherwise.
    /// Used by binaries that actually touch Postgres (coordinator, cli).
    pub fn require_database_url(&self) -> &str {
        if self.database_url.is_empty() {
            panic!("DATABASE_URL environment variable is required");
        }
        &self.database_url
    }

    /// Log presence/length of sensitive values without leaking them.
    pub fn log_redacted(&self) {
        if self.database_url.is_empty() {
            tracing::info!("DATABASE_URL = (empty)");
        } else {
            tracing::info!("DATABASE_URL = ({} chars)", self.database_url.len());
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.domain_cooldown, Duration::from_secs(60));
        assert_eq!(c.max_domain_failures, 3);
        assert_eq!(c.domain_pause, Duration::from_secs(1800));
        assert_eq!(c.worker_timeout, Duration::from_secs(600));
        assert_eq!(c.min_domains_per_worker, 3);
        assert_eq!(c.max_domains_per_worker, 5);
        assert_eq!(c.candidate_expiration_days, 7);
        assert_eq!(c.rss_missing_threshold, 3);
        assert_eq!(c.rss_transient_threshold, 5);
        assert_eq!(c.rss_transient_window_days, 7);
        assert_eq!(c.rss_retry_window_days, 30);
        assert_eq!(c.default_cadence_hours, 6);
        assert_eq!(c.single_domain_min_cadence_hours, 24);
    }
}
