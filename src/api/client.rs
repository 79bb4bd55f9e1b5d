//! Retrying HTTP GET client for the bioinformatics REST services.
//!
//! The client never raises: any failure the retry policy cannot absorb is
//! reported as `None`, and callers turn that into a visible tool-error
//! message.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error, warn};

use crate::agent::config::AgentConfig;
use crate::error::AgentError;

/// Maximum characters kept from a tool payload.
pub const MAX_PAYLOAD_CHARS: usize = 10_000;
/// Marker appended to a truncated payload.
pub const TRUNCATION_MARKER: &str = "... [result is truncated]";

/// Default pause before every request.
const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);
/// Default pause between retries of a transient failure.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Default number of attempts on a transient failure.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Transport to the external REST services.
///
/// Implementations return the decoded response body, or `None` when no
/// usable result could be obtained.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Issues a GET request to `target`.
    async fn get(&self, target: &str) -> Option<String>;
}

/// [`ApiClient`] backed by `reqwest`.
///
/// Retries only on HTTP 500, up to `max_retries` attempts spaced by
/// `retry_delay`. Every call first waits `request_delay`.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    request_delay: Duration,
    retry_delay: Duration,
    max_retries: u32,
}

impl HttpApiClient {
    /// Creates a client with default pacing and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, AgentError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a client using the pacing and retry fields of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] if the HTTP client cannot be built.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        Ok(Self::with_timeout(config.timeout)?
            .request_delay(config.request_delay)
            .retry_delay(config.retry_delay)
            .max_retries(config.max_retries))
    }

    fn with_timeout(timeout: Duration) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::ApiRequest {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
            })?;

        Ok(Self {
            http,
            request_delay: DEFAULT_REQUEST_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Sets the pause before every request.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Sets the pause between transient-failure retries.
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the number of attempts on a transient failure.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn get(&self, target: &str) -> Option<String> {
        let url = normalize_target(target);
        tokio::time::sleep(self.request_delay).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(url = %url, attempt, "calling API");

            let response = match self.http.get(&*url).send().await {
                Ok(response) => response,
                Err(e) => {
                    error!(url = %url, error = %e, "API request failed");
                    return None;
                }
            };

            let status = response.status();
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                if attempt >= self.max_retries {
                    error!(url = %url, attempts = attempt, "API call failed after retries");
                    return None;
                }
                warn!(url = %url, attempt, max = self.max_retries, "HTTP 500, retrying");
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            if !status.is_success() {
                error!(url = %url, status = status.as_u16(), "API returned error status");
                return None;
            }

            return match response.bytes().await {
                Ok(body) => Some(String::from_utf8_lossy(&body).into_owned()),
                Err(e) => {
                    error!(url = %url, error = %e, "failed to read API response body");
                    None
                }
            };
        }
    }
}

/// Collapses whitespace runs in a request target into `+`.
#[must_use]
pub fn normalize_target(target: &str) -> Cow<'_, str> {
    if target.chars().any(char::is_whitespace) {
        Cow::Owned(target.split_whitespace().collect::<Vec<_>>().join("+"))
    } else {
        Cow::Borrowed(target)
    }
}

/// Encodes a free-text query value: words percent-encoded, joined by `+`.
#[must_use]
pub fn encode_query_value(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

/// Cuts `payload` to at most `max_chars` characters plus [`TRUNCATION_MARKER`].
///
/// Payloads within the limit are returned unchanged.
#[must_use]
pub fn truncate_payload(payload: &str, max_chars: usize) -> Cow<'_, str> {
    match payload.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &payload[..cut])),
        None => Cow::Borrowed(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client() -> HttpApiClient {
        HttpApiClient::new()
            .unwrap_or_else(|e| unreachable!("{e}"))
            .request_delay(Duration::ZERO)
            .retry_delay(Duration::ZERO)
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(
            normalize_target("esearch.fcgi?db=omim&term=Meesmann corneal  dystrophy"),
            "esearch.fcgi?db=omim&term=Meesmann+corneal+dystrophy"
        );
        assert!(matches!(normalize_target("a+b"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_encode_query_value() {
        assert_eq!(encode_query_value("BRCA1 & TP53"), "BRCA1+%26+TP53");
        assert_eq!(encode_query_value("  rs1217074595 "), "rs1217074595");
    }

    #[test]
    fn test_truncate_short_payload_unchanged() {
        assert_eq!(truncate_payload("abc", 10), "abc");
        assert_eq!(truncate_payload("abcdefghij", 10), "abcdefghij");
    }

    #[test]
    fn test_truncate_long_payload() {
        let payload = "x".repeat(MAX_PAYLOAD_CHARS + 1);
        let cut = truncate_payload(&payload, MAX_PAYLOAD_CHARS);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), MAX_PAYLOAD_CHARS + TRUNCATION_MARKER.len());
    }

    proptest! {
        #[test]
        fn prop_truncation_keeps_prefix(s in "\\PC{0,64}", max in 0usize..48) {
            let cut = truncate_payload(&s, max);
            let len = s.chars().count();
            if len > max {
                let kept: String = s.chars().take(max).collect();
                prop_assert_eq!(cut.into_owned(), format!("{kept}{TRUNCATION_MARKER}"));
            } else {
                prop_assert_eq!(&*cut, s.as_str());
            }
        }
    }

    #[tokio::test]
    async fn test_get_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"idlist":["1"]}"#))
            .mount(&server)
            .await;

        let body = fast_client()
            .get(&format!("{}/esearch.fcgi?db=gene&term=TTTY7", server.uri()))
            .await;
        assert_eq!(body.as_deref(), Some(r#"{"idlist":["1"]}"#));
    }

    #[tokio::test]
    async fn test_get_retries_on_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blast"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("RID = ABC123\n"))
            .mount(&server)
            .await;

        let body = fast_client().get(&format!("{}/blast", server.uri())).await;
        assert_eq!(body.as_deref(), Some("RID = ABC123\n"));
    }

    #[tokio::test]
    async fn test_get_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let body = fast_client().get(&server.uri()).await;
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_get_does_not_retry_other_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let body = fast_client().get(&server.uri()).await;
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_get_decodes_invalid_utf8_lossily() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'o', b'k', 0xff]))
            .mount(&server)
            .await;

        let body = fast_client().get(&server.uri()).await;
        assert_eq!(body.as_deref(), Some("ok\u{fffd}"));
    }
}
