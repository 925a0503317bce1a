use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching and classifying a feed document.
///
/// The variants separate transport failures from content failures so the
/// intake flow can report them distinctly instead of collapsing everything
/// into one opaque error.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    TooLarge,
    /// Content was retrieved but could not be classified as Atom, RSS, or JSON Feed
    #[error("Unsupported or malformed feed: {0}")]
    Malformed(String),
}

/// Per-request bounds for a feed fetch.
///
/// One fetch, one attempt: no retry, no caching. The timeout covers the
/// entire request and the size limit is enforced while streaming the body.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Builds the shared HTTP client with a bounded, loop-detecting redirect policy.
///
/// - Limits redirects to 3 hops
/// - Detects redirect loops (same URL appearing twice in the chain)
/// - Logs each hop at debug level
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    let policy = Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    });

    reqwest::Client::builder()
        .user_agent(user_agent.to_owned())
        .redirect(policy)
        .build()
}

/// Fetches a feed document, returning the raw bytes.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - the request exceeded `limits.timeout`
/// - [`FetchError::Network`] - connection, DNS, or TLS failure
/// - [`FetchError::HttpStatus`] - non-2xx response
/// - [`FetchError::TooLarge`] - body exceeded `limits.max_bytes`
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &Url,
    limits: &FetchLimits,
) -> Result<Vec<u8>, FetchError> {
    let response = tokio::time::timeout(limits.timeout, client.get(url.as_str()).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    read_limited_bytes(response, limits.max_bytes).await
}

/// Reads a response body with a hard size cap, streaming chunk by chunk so an
/// oversized body is cut off instead of buffered whole.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
