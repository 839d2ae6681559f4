//! Content fetching
//!
//! Retrieves raw bytes plus transport metadata over HTTP/HTTPS under a
//! [`FetchPolicy`]. Redirects are followed here rather than by the HTTP
//! client so the redirect budget can vary per call. Bodies are streamed
//! and abandoned as soon as they pass the size limit.
//!
//! One [`Fetcher`] is meant to be shared: it wraps a pooled client, and
//! every connection a fetch opens is released when the fetch future
//! completes or is dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{
    HeaderMap, CONTENT_ENCODING, CONTENT_TYPE, ETAG, LAST_MODIFIED, LOCATION,
};
use reqwest::{redirect, Response, Url};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{SnapshotError, SnapshotResult, BODY_EXCERPT_LIMIT};
use crate::models::FetchedContent;
use crate::source::{SourceUrl, UrlKind};

/// Limits applied to a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Wall-clock budget covering redirects and the full body
    pub timeout: Duration,
    /// Redirects followed before failing with `TooManyRedirects`
    pub max_redirects: usize,
    /// Largest accepted body; exactly this many bytes is still allowed
    pub max_size_bytes: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            max_size_bytes: 25 * 1024 * 1024,
        }
    }
}

/// HTTP content fetcher with a pooled client
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher sending the given User-Agent
    pub fn new(user_agent: &str) -> SnapshotResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(user_agent)
            .build()
            .map_err(|e| SnapshotError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> SnapshotResult<Self> {
        Self::new(&config.user_agent)
    }

    /// Fetch `url` under `policy`
    ///
    /// Only HTTP URLs are fetched; other kinds fail with `NotSupported`.
    pub async fn fetch(
        &self,
        url: &SourceUrl,
        policy: &FetchPolicy,
    ) -> SnapshotResult<FetchedContent> {
        if url.kind() != UrlKind::Http {
            return Err(SnapshotError::NotSupported(url.kind()));
        }

        info!("Fetching {}", url);
        match tokio::time::timeout(policy.timeout, self.fetch_http(url.as_url().clone(), policy))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("Fetch of {} timed out after {:?}", url, policy.timeout);
                Err(SnapshotError::Timeout {
                    after: policy.timeout,
                })
            }
        }
    }

    async fn fetch_http(
        &self,
        mut url: Url,
        policy: &FetchPolicy,
    ) -> SnapshotResult<FetchedContent> {
        let mut redirects = 0usize;

        loop {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| request_error(e, policy))?;
            let status = response.status();

            if status.is_redirection() {
                if let Some(next) = redirect_target(&url, response.headers())? {
                    if redirects >= policy.max_redirects {
                        warn!(
                            "Redirect budget of {} exhausted at {}",
                            policy.max_redirects, url
                        );
                        return Err(SnapshotError::TooManyRedirects {
                            max: policy.max_redirects,
                        });
                    }
                    redirects += 1;
                    debug!(
                        "Redirect {} -> {} ({}/{})",
                        url, next, redirects, policy.max_redirects
                    );
                    url = next;
                    continue;
                }
            }

            if !status.is_success() {
                let excerpt = read_excerpt(response).await;
                warn!("Fetch of {} failed with status {}", url, status);
                return Err(SnapshotError::transport(status.as_u16(), &excerpt));
            }

            return read_body(response, url, policy).await;
        }
    }
}

/// Resolve the `Location` of a redirect response against `current`
///
/// Returns `None` for 3xx responses without a `Location` (e.g. 304), which
/// are then treated as ordinary non-success statuses.
fn redirect_target(current: &Url, headers: &HeaderMap) -> SnapshotResult<Option<Url>> {
    let Some(location) = headers.get(LOCATION) else {
        return Ok(None);
    };
    let location = location
        .to_str()
        .map_err(|_| SnapshotError::Network("redirect with non-ASCII Location header".into()))?;
    let next = current
        .join(location)
        .map_err(|e| SnapshotError::InvalidUrl(format!("redirect to '{}': {}", location, e)))?;

    match UrlKind::from_scheme(next.scheme()) {
        Some(UrlKind::Http) => Ok(Some(next)),
        Some(kind) => Err(SnapshotError::NotSupported(kind)),
        None => Err(SnapshotError::InvalidUrl(format!(
            "redirect to unsupported scheme '{}'",
            next.scheme()
        ))),
    }
}

async fn read_body(
    mut response: Response,
    final_url: Url,
    policy: &FetchPolicy,
) -> SnapshotResult<FetchedContent> {
    let max = policy.max_size_bytes;

    if let Some(declared) = response.content_length() {
        if declared > max {
            warn!(
                "Rejecting {}: Content-Length {} exceeds {}",
                final_url, declared, max
            );
            return Err(SnapshotError::ContentTooLarge {
                actual: declared,
                max,
            });
        }
    }

    let headers = response.headers();
    let declared_mime_type = header_string(headers, CONTENT_TYPE.as_str());
    let entity_tag = header_string(headers, ETAG.as_str());
    let transport_encoding = header_string(headers, CONTENT_ENCODING.as_str());
    let last_modified = header_string(headers, LAST_MODIFIED.as_str()).and_then(|v| {
        let parsed = parse_http_date(&v);
        if parsed.is_none() {
            debug!("Ignoring unparseable Last-Modified: {}", v);
        }
        parsed
    });

    let capacity = response.content_length().unwrap_or(0).min(max) as usize;
    let mut bytes = Vec::with_capacity(capacity);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| request_error(e, policy))?
    {
        let total = bytes.len() as u64 + chunk.len() as u64;
        if total > max {
            warn!("Rejecting {}: body exceeds {} bytes", final_url, max);
            return Err(SnapshotError::ContentTooLarge { actual: total, max });
        }
        bytes.extend_from_slice(&chunk);
    }

    debug!("Fetched {} bytes from {}", bytes.len(), final_url);

    Ok(FetchedContent {
        final_url: final_url.to_string(),
        bytes,
        declared_mime_type,
        last_modified,
        entity_tag,
        transport_encoding,
    })
}

/// Read at most the first few hundred bytes of an error body
async fn read_excerpt(mut response: Response) -> Vec<u8> {
    let mut excerpt = Vec::new();
    while excerpt.len() < BODY_EXCERPT_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => excerpt.extend_from_slice(&chunk),
            _ => break,
        }
    }
    excerpt.truncate(BODY_EXCERPT_LIMIT);
    excerpt
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`) into UTC
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn request_error(err: reqwest::Error, policy: &FetchPolicy) -> SnapshotError {
    if err.is_timeout() {
        return SnapshotError::Timeout {
            after: policy.timeout,
        };
    }
    if err.is_redirect() {
        return SnapshotError::TooManyRedirects {
            max: policy.max_redirects,
        };
    }
    SnapshotError::Network(error_chain(&err))
}

/// Render an error with its sources, e.g. `error sending request: connection refused`
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
