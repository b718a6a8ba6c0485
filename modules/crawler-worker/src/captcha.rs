//! Detection of domain-level "back off entirely" signals: rate limiting and
//! bot-protection challenge pages (spec §4.E + 4.F interplay).

use std::sync::OnceLock;

use regex::Regex;
use reqwest::StatusCode;

/// 429/503 are the statuses the spec calls out explicitly for this signal.
pub fn is_domain_blocking_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

fn captcha_body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(captcha|are you a human|unusual traffic|cf-challenge|checking your browser)")
            .expect("valid captcha body regex")
    })
}

/// Heuristic body-text match for a bot-protection challenge page. Real
/// CAPTCHA detection (image/JS challenge solving) is out of scope; this just
/// recognizes the common interstitial wording well enough to back off.
pub fn looks_like_captcha(body: &str) -> bool {
    captcha_body_regex().is_match(body)
}
