//! Plumbing shared by the HTTP invokers: client construction, status
//! classification, and transport-error mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use campaignsmith_shared::{CampaignError, ProviderError, Result};

const USER_AGENT: &str = concat!("campaignsmith/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body carried into a [`ProviderError`] message.
const BODY_SNIPPET_CHARS: usize = 300;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CampaignError::config(format!("failed to build HTTP client: {e}")))
}

/// Join `path` onto `base`, tolerating a trailing slash on either side.
pub(crate) fn endpoint(base: &url::Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Send the request and return the decoded JSON body of a 2xx response.
pub(crate) async fn send_json(provider: &str, request: RequestBuilder) -> std::result::Result<Value, ProviderError> {
    let started = std::time::Instant::now();
    let response = request.send().await.map_err(|e| transport_error(provider, &e))?;
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, &e))?;

    debug!(
        provider,
        status = status.as_u16(),
        bytes = body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "provider responded"
    );

    if !status.is_success() {
        let err = error_for_status(provider, status, retry_after, &body);
        warn!(provider, status = status.as_u16(), kind = %err.kind, "provider returned error status");
        return Err(err);
    }

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::malformed(format!("{provider} returned a non-JSON body: {e}"))
    })
}

/// Classify a non-success HTTP status.
pub(crate) fn error_for_status(
    provider: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ProviderError {
    let message = format!("{provider} returned {status}: {}", snippet(body));
    let err = match status.as_u16() {
        401 | 403 => ProviderError::auth(message),
        408 => ProviderError::timeout(message),
        429 => ProviderError::rate_limited(message),
        500..=599 => ProviderError::server(message),
        _ => ProviderError::invalid_request(message),
    };

    match retry_after {
        Some(delay) if status == StatusCode::TOO_MANY_REQUESTS => err.with_retry_after(delay),
        _ => err,
    }
}

/// Classify a failure that happened before a status line was read.
pub(crate) fn transport_error(provider: &str, err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(format!("{provider} request timed out: {err}"))
    } else if err.is_decode() {
        ProviderError::malformed(format!("{provider} response could not be decoded: {err}"))
    } else if err.is_builder() {
        ProviderError::invalid_request(format!("{provider} request could not be built: {err}"))
    } else {
        ProviderError::network(format!("{provider} request failed: {err}"))
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs: f64 = raw.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaignsmith_shared::ProviderErrorKind;
    use reqwest::header::HeaderValue;

    #[test]
    fn status_mapping() {
        let cases = [
            (401, ProviderErrorKind::Auth),
            (403, ProviderErrorKind::Auth),
            (408, ProviderErrorKind::Timeout),
            (429, ProviderErrorKind::RateLimited),
            (500, ProviderErrorKind::Server),
            (503, ProviderErrorKind::Server),
            (400, ProviderErrorKind::InvalidRequest),
            (404, ProviderErrorKind::InvalidRequest),
        ];
        for (code, kind) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(error_for_status("openai", status, None, "").kind, kind, "status {code}");
        }
    }

    #[test]
    fn retry_after_only_kept_for_rate_limits() {
        let delay = Some(Duration::from_secs(3));
        let limited = error_for_status("openai", StatusCode::TOO_MANY_REQUESTS, delay, "");
        assert_eq!(limited.retry_after, delay);
        let server = error_for_status("openai", StatusCode::BAD_GATEWAY, delay, "");
        assert_eq!(server.retry_after, None);
    }

    #[test]
    fn retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("0.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(500)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let base = url::Url::parse("https://api.openai.com/v1/").unwrap();
        assert_eq!(endpoint(&base, "/chat/completions"), "https://api.openai.com/v1/chat/completions");
        let base = url::Url::parse("https://api.anthropic.com").unwrap();
        assert_eq!(endpoint(&base, "v1/messages"), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let err = error_for_status("openai", StatusCode::BAD_REQUEST, None, &body);
        assert!(err.message.len() < 400);
        assert!(err.message.ends_with('…'));
    }
}
