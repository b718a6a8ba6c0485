//! Maps HTTP/transport failures onto the outcome vocabulary used for
//! `DiscoveryMethodEffectiveness` and RSS failure bookkeeping (spec §4.C).

use crawler_common::DiscoveryOutcome;

/// Classify a transport-level failure (the request never got a usable response).
pub fn classify_transport_error(err: &reqwest::Error) -> DiscoveryOutcome {
    if err.is_timeout() {
        DiscoveryOutcome::Timeout
    } else if err.is_connect() {
        DiscoveryOutcome::ConnectionError
    } else if let Some(status) = err.status() {
        classify_status(status).unwrap_or(DiscoveryOutcome::ConnectionError)
    } else {
        DiscoveryOutcome::ConnectionError
    }
}

/// Classify a received HTTP status code. `None` means "treat as a normal
/// response body", i.e. 2xx/3xx and anything else not specifically called
/// out by spec §4.C.
pub fn classify_status(status: reqwest::StatusCode) -> Option<DiscoveryOutcome> {
    match status.as_u16() {
        404 => Some(DiscoveryOutcome::NoFeed),
        403 | 429 => Some(DiscoveryOutcome::Blocked),
        500..=599 => Some(DiscoveryOutcome::ServerError),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_no_feed() {
        assert_eq!(
            classify_status(reqwest::StatusCode::NOT_FOUND),
            Some(DiscoveryOutcome::NoFeed)
        );
    }

    #[test]
    fn maps_rate_limit_and_forbidden_to_blocked() {
        assert_eq!(
            classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            Some(DiscoveryOutcome::Blocked)
        );
        assert_eq!(
            classify_status(reqwest::StatusCode::FORBIDDEN),
            Some(DiscoveryOutcome::Blocked)
        );
    }

    #[test]
    fn maps_5xx_to_server_error() {
        assert_eq!(
            classify_status(reqwest::StatusCode::BAD_GATEWAY),
            Some(DiscoveryOutcome::ServerError)
        );
    }

    #[test]
    fn ok_status_has_no_special_classification() {
        assert_eq!(classify_status(reqwest::StatusCode::OK), None);
    }
}
