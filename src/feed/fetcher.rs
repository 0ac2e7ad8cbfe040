use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::time::Duration;
use thiserror::Error;

/// Media types offered in the `Accept` header of every upstream request.
pub const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const DEFAULT_REVALIDATE: Duration = Duration::from_secs(300);

/// Errors that can occur while retrieving the upstream feed.
///
/// None of these reach the HTTP client directly: the orchestration layer
/// either serves a stale snapshot or answers 502.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, reset)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Upstream answered with a non-2xx status code
    #[error("Upstream returned status {0}")]
    Upstream(u16),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response body was not valid UTF-8
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    /// The background refresh task panicked or was aborted
    #[error("Refresh task failed: {0}")]
    TaskFailed(String),
}

impl FetchError {
    /// True for transport-class failures (everything except an upstream status).
    pub fn is_network(&self) -> bool {
        !matches!(self, FetchError::Upstream(_))
    }
}

/// Something that can produce the raw feed markup.
///
/// One call is one attempt; implementations must not retry.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Fetches the feed over HTTP from a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    revalidate: Duration,
    max_size: usize,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            revalidate: DEFAULT_REVALIDATE,
            max_size: DEFAULT_MAX_FEED_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `max-age` hint sent to caching intermediaries.
    pub fn with_revalidate(mut self, revalidate: Duration) -> Self {
        self.revalidate = revalidate;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, FEED_ACCEPT)
            .header(
                CACHE_CONTROL,
                format!("max-age={}", self.revalidate.as_secs()),
            );

        // The deadline covers both the response head and the body stream
        let result = tokio::time::timeout(self.timeout, async {
            let response = request.send().await.map_err(FetchError::Network)?;

            if !response.status().is_success() {
                return Err(FetchError::Upstream(response.status().as_u16()));
            }

            read_limited_text(response, self.max_size).await
        })
        .await
        .unwrap_or(Err(FetchError::Timeout));

        if let Err(e) = &result {
            tracing::warn!(feed = %self.url, error = %e, "Feed fetch failed");
        }

        result
    }
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)
}
