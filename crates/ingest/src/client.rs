//! Platform order API client.
//!
//! One [`PlatformClient`] implementation serves Shopee, Lazada, and TikTok
//! Shop; every platform difference (auth header, envelope success code, date
//! query parameter, page size, retry policy) is injected through
//! [`PlatformProfile`]. The driver consumes clients through the
//! [`PageFetcher`] trait so tests can substitute scripted fetchers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use orderhub_core::{OrderRecord, Platform};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::{AuthScheme, PlatformProfile};
use crate::decode::{self, EnvelopeError};

/// Backoff between retries never grows past this.
const MAX_BACKOFF: std::time::Duration = std::time::Duration::from_secs(30);

/// Errors that can occur while fetching a page of orders.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from the platform.
    #[error("{platform} returned HTTP {status}")]
    Status {
        platform: Platform,
        status: reqwest::StatusCode,
    },

    /// HTTP succeeded but the envelope carried a failure code. Never treated
    /// as an empty page.
    #[error("{platform} envelope code {code}: {message}")]
    Envelope {
        platform: Platform,
        code: i64,
        message: String,
    },

    /// The response body was not a decodable envelope.
    #[error("malformed response from {platform}: {reason}")]
    Malformed { platform: Platform, reason: String },

    /// The profile's token cannot be used as a header value.
    #[error("invalid auth header value: {0}")]
    InvalidHeader(String),

    /// The run was cancelled while waiting to retry.
    #[error("fetch cancelled")]
    Cancelled,

    /// All attempts for one page failed.
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed. Auth failures and
    /// explicit envelope rejections fail fast; network trouble, garbled
    /// bodies, and server-side errors retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Malformed { .. } => true,
            Self::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Self::Envelope { .. }
            | Self::InvalidHeader(_)
            | Self::Cancelled
            | Self::Exhausted { .. } => false,
        }
    }
}

/// One page request, as the driver issues them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub platform: Platform,
    /// Order date to filter on; `None` lets the platform default (today).
    pub date: Option<NaiveDate>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    #[must_use]
    pub const fn new(platform: Platform, date: Option<NaiveDate>, page: u32, page_size: u32) -> Self {
        Self {
            platform,
            date,
            page,
            page_size,
        }
    }
}

/// A record the decoder had to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDefect {
    /// Position of the record within the page's `orders` array.
    pub position: usize,
    pub reason: String,
}

/// One decoded page.
#[derive(Debug)]
pub struct PageResult {
    /// Records that decoded cleanly, in wire order.
    pub records: Vec<OrderRecord>,
    /// Records skipped for record-level defects.
    pub defects: Vec<RecordDefect>,
    /// The platform's own claim about further pages, when it makes one.
    pub declared_has_next: Option<bool>,
    /// Raw length of the wire `orders` array, before any skipping. Pagination
    /// termination is judged on this, not on the decoded count.
    pub returned_count: usize,
}

/// The seam between the pagination driver and a platform API.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch one page of orders.
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, FetchError>;

    /// Probe whether the platform currently answers at all. Must not fail;
    /// any error maps to `false`.
    async fn is_available(&self) -> bool {
        true
    }
}

/// HTTP client for one platform's order API.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct PlatformClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    profile: PlatformProfile,
    cancel: CancellationToken,
}

impl PlatformClient {
    /// Create a client for one platform.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidHeader` if the configured token cannot be
    /// sent as a header value, or `FetchError::Http` if the underlying HTTP
    /// client cannot be built.
    pub fn new(profile: PlatformProfile, cancel: CancellationToken) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let value = match profile.auth_scheme {
            AuthScheme::Bearer => format!("Bearer {}", profile.api_token.expose_secret()),
            AuthScheme::Raw => profile.api_token.expose_secret().to_owned(),
        };
        let value =
            HeaderValue::from_str(&value).map_err(|e| FetchError::InvalidHeader(e.to_string()))?;
        headers.insert(profile.auth_header, value);

        let http = reqwest::Client::builder()
            .timeout(profile.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                profile,
                cancel,
            }),
        })
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// One attempt: build the URL, issue the request, decode the envelope.
    async fn fetch_once(&self, request: &PageRequest) -> Result<PageResult, FetchError> {
        let profile = &self.inner.profile;
        let mut url = profile.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &request.page.to_string());
            pairs.append_pair("limit", &request.page_size.to_string());
            if let Some(date) = request.date {
                pairs.append_pair(profile.date_param, &date.format("%Y-%m-%d").to_string());
            }
            if let Some(source) = &profile.source {
                pairs.append_pair("source", source);
            }
        }

        let response = self.inner.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                platform: profile.platform,
                status,
            });
        }

        // Body as text first for better diagnostics on malformed responses.
        let body = response.text().await?;
        let mut page = decode::parse_page(profile.platform, profile.success_code, &body).map_err(
            |e| match e {
                EnvelopeError::FailureCode { code, message } => FetchError::Envelope {
                    platform: profile.platform,
                    code,
                    message,
                },
                EnvelopeError::Malformed(reason) => FetchError::Malformed {
                    platform: profile.platform,
                    reason,
                },
            },
        )?;

        if let Some(source) = &profile.source {
            for record in &mut page.records {
                if record.source.is_none() {
                    record.source = Some(source.clone());
                }
            }
        }
        Ok(page)
    }

    /// Fetch with bounded retry. Only retryable failures are re-attempted;
    /// the backoff doubles per attempt and the wait races cancellation.
    async fn fetch_with_retry(&self, request: &PageRequest) -> Result<PageResult, FetchError> {
        if self.inner.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let max_attempts = self.inner.profile.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match self.fetch_once(request).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = backoff_delay(self.inner.profile.backoff_base, attempt);
                    tracing::warn!(
                        attempt,
                        delay = ?delay,
                        error = %err,
                        "page fetch failed, backing off before retry"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.inner.cancel.cancelled() => return Err(FetchError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(FetchError::Exhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl PageFetcher for PlatformClient {
    fn platform(&self) -> Platform {
        self.inner.profile.platform
    }

    #[instrument(skip(self, request), fields(platform = %self.platform(), page = request.page))]
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, FetchError> {
        self.fetch_with_retry(request).await
    }

    /// One un-retried probe request for a single record.
    #[instrument(skip(self), fields(platform = %self.platform()))]
    async fn is_available(&self) -> bool {
        let request = PageRequest::new(self.platform(), None, 1, 1);
        match self.fetch_once(&request).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "availability probe failed");
                false
            }
        }
    }
}

// =============================================================================
// Backoff
// =============================================================================

/// Delay before the next attempt, after `completed_attempts` have failed:
/// `base * 2^(completed_attempts - 1)`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: std::time::Duration, completed_attempts: u32) -> std::time::Duration {
    let factor = 2u32.saturating_pow(completed_attempts.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use secrecy::SecretString;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 10), Duration::from_secs(30));
        // Large attempt numbers must not overflow.
        assert_eq!(backoff_delay(base, 200), Duration::from_secs(30));
    }

    #[test]
    fn transient_failures_are_retryable() {
        let server_error = FetchError::Status {
            platform: Platform::Shopee,
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert!(server_error.is_retryable());

        let rate_limited = FetchError::Status {
            platform: Platform::Shopee,
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
        };
        assert!(rate_limited.is_retryable());

        let garbled = FetchError::Malformed {
            platform: Platform::Lazada,
            reason: "expected value at line 1 column 1".to_owned(),
        };
        assert!(garbled.is_retryable());
    }

    #[test]
    fn auth_and_envelope_failures_are_not_retryable() {
        let unauthorized = FetchError::Status {
            platform: Platform::Lazada,
            status: reqwest::StatusCode::UNAUTHORIZED,
        };
        assert!(!unauthorized.is_retryable());

        let envelope = FetchError::Envelope {
            platform: Platform::TiktokShop,
            code: 105,
            message: "invalid shop cipher".to_owned(),
        };
        assert!(!envelope.is_retryable());

        assert!(!FetchError::Cancelled.is_retryable());
    }

    #[test]
    fn page_request_carries_the_requested_window() {
        let request = PageRequest::new(Platform::Shopee, None, 3, 100);
        assert_eq!(request.page, 3);
        assert_eq!(request.page_size, 100);
        assert!(request.date.is_none());
    }

    // =========================================================================
    // Retry loop, over a scripted HTTP edge
    // =========================================================================

    const EMPTY_PAGE: &str = r#"{"status":200,"message":"ok","data":{"orders":[],"page":1,"total_pages":1,"has_next":false}}"#;

    struct ScriptedServer {
        base_url: Url,
        hits: Arc<AtomicUsize>,
    }

    impl ScriptedServer {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    /// Serve each scripted `(status, body)` response once, in order; the
    /// last entry repeats for any further requests.
    async fn spawn_server(script: Vec<(u16, &'static str)>) -> ScriptedServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = *script.get(n).or_else(|| script.last()).unwrap();

                // Drain the request headers before answering.
                let mut request = Vec::new();
                let mut chunk = [0u8; 512];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(len) => request.extend_from_slice(&chunk[..len]),
                    }
                }

                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        ScriptedServer {
            base_url: Url::parse(&format!("http://{addr}/orders")).unwrap(),
            hits,
        }
    }

    fn profile(base_url: Url, max_attempts: u32, backoff_base: Duration) -> PlatformProfile {
        PlatformProfile {
            platform: Platform::Shopee,
            base_url,
            auth_header: "authorization",
            auth_scheme: AuthScheme::Bearer,
            api_token: SecretString::from("test-token"),
            success_code: 200,
            date_param: "date",
            page_size: 100,
            max_attempts,
            backoff_base,
            request_timeout: Duration::from_secs(5),
            source: None,
        }
    }

    fn client_for(server: &ScriptedServer, max_attempts: u32) -> PlatformClient {
        PlatformClient::new(
            profile(server.base_url.clone(), max_attempts, Duration::from_millis(1)),
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn garbled_body_is_retried_to_success() {
        let server = spawn_server(vec![(200, "definitely not json"), (200, EMPTY_PAGE)]).await;
        let client = client_for(&server, 3);

        let page = client
            .fetch_page(&PageRequest::new(Platform::Shopee, None, 1, 100))
            .await
            .unwrap();

        assert_eq!(server.hits(), 2);
        assert!(page.records.is_empty());
        assert_eq!(page.declared_has_next, Some(false));
    }

    #[tokio::test]
    async fn server_error_is_retried_to_success() {
        let server = spawn_server(vec![(503, "try later"), (200, EMPTY_PAGE)]).await;
        let client = client_for(&server, 3);

        let page = client
            .fetch_page(&PageRequest::new(Platform::Shopee, None, 1, 100))
            .await
            .unwrap();

        assert_eq!(server.hits(), 2);
        assert_eq!(page.returned_count, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_carry_the_attempt_count() {
        let server = spawn_server(vec![(500, "down")]).await;
        let client = client_for(&server, 3);

        let err = client
            .fetch_page(&PageRequest::new(Platform::Shopee, None, 1, 100))
            .await
            .unwrap_err();

        match err {
            FetchError::Exhausted { attempts, source } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, FetchError::Status { .. }));
            }
            other => panic!("expected exhaustion, got {other}"),
        }
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn cancellation_aborts_a_pending_backoff() {
        let server = spawn_server(vec![(500, "down")]).await;
        let cancel = CancellationToken::new();
        let client = PlatformClient::new(
            profile(server.base_url.clone(), 3, Duration::from_secs(30)),
            cancel.clone(),
        )
        .unwrap();

        let request = PageRequest::new(Platform::Shopee, None, 1, 100);
        let fetch = tokio::spawn({
            let client = client.clone();
            async move { client.fetch_page(&request).await }
        });

        // Wait for the first attempt to land, then cancel mid-backoff.
        tokio::time::timeout(Duration::from_secs(5), async {
            while server.hits() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first attempt never reached the server");
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), fetch)
            .await
            .expect("cancellation should end the fetch well before the backoff")
            .unwrap();
        assert!(matches!(result, Err(FetchError::Cancelled)));
        assert_eq!(server.hits(), 1);
    }
}
