//! HEAD-with-GET-fallback request used to verify a candidate link, spec §4.D.

use std::time::Duration;

use reqwest::StatusCode;

/// Per-fetch deadline, spec §5 default.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub enum VerifyAttemptOutcome {
    Status(StatusCode),
    Timeout,
    ConnectionError,
}

/// Issue a HEAD request; if the server answers 403/405 (some sites reject
/// HEAD specifically), fall back to GET. The fallback is ordered within this
/// one attempt — it never counts as a separate retry.
pub async fn verify_once(client: &reqwest::Client, url: &str) -> VerifyAttemptOutcome {
    let head_result = client
        .head(url)
        .timeout(REQUEST_TIMEOUT)
        .header("User-Agent", "crawler-verifier/0.1")
        .send()
        .await;

    let head_status = match head_result {
        Ok(resp) => resp.status(),
        Err(e) => return transport_outcome(&e),
    };

    if head_status == StatusCode::FORBIDDEN || head_status == StatusCode::METHOD_NOT_ALLOWED {
        let get_result = client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header("User-Agent", "crawler-verifier/0.1")
            .send()
            .await;
        return match get_result {
            Ok(resp) => VerifyAttemptOutcome::Status(resp.status()),
            Err(e) => transport_outcome(&e),
        };
    }

    VerifyAttemptOutcome::Status(head_status)
}

fn transport_outcome(e: &reqwest::Error) -> VerifyAttemptOutcome {
    if e.is_timeout() {
        VerifyAttemptOutcome::Timeout
    } else {
        VerifyAttemptOutcome::ConnectionError
    }
}
