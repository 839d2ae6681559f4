//! Snapshot error handling
//!
//! Every way a capture or a read of a stored snapshot can fail, as one
//! closed enum. Callers map these onto their own status codes; the
//! suggested mapping lives in [`SnapshotError::suggested_status`].

use std::time::Duration;

use thiserror::Error;

use crate::source::UrlKind;

/// Maximum number of response body bytes kept in a transport error
pub const BODY_EXCERPT_LIMIT: usize = 512;

/// Errors that can occur while capturing or serving a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Payload exceeds the configured maximum size
    #[error("Content too large: {actual} bytes (max: {max})")]
    ContentTooLarge { actual: u64, max: u64 },

    /// Remote server answered with a non-success status
    #[error("HTTP error {status}: {body_excerpt}")]
    Transport { status: u16, body_excerpt: String },

    /// Connection-level failure (DNS, refused connection, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Fetch exceeded its wall-clock budget
    #[error("Fetch timed out after {}s", after.as_secs_f64())]
    Timeout { after: Duration },

    /// Redirect chain longer than allowed
    #[error("Too many redirects (max: {max})")]
    TooManyRedirects { max: usize },

    /// Classified MIME type rejected by policy
    #[error("MIME type not allowed: {0}")]
    MimeNotAllowed(String),

    /// Unknown compression algorithm
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// URL kind the fetcher does not implement
    #[error("Fetching {0} URLs is not supported")]
    NotSupported(UrlKind),

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Caller cancelled the capture before it finished
    #[error("Capture cancelled")]
    Cancelled,

    /// Stored content type cannot be rendered inline
    #[error("Content type '{0}' is not renderable in browser")]
    NotRenderable(String),

    /// Anything unexpected (codec I/O, duplicate lookup failures)
    #[error("Internal pipeline error: {0}")]
    Internal(String),
}

impl SnapshotError {
    /// Wrap an unexpected failure
    pub fn internal(err: impl std::fmt::Display) -> Self {
        SnapshotError::Internal(err.to_string())
    }

    /// Build a transport error, truncating the body to a short excerpt
    pub fn transport(status: u16, body: &[u8]) -> Self {
        let end = body.len().min(BODY_EXCERPT_LIMIT);
        SnapshotError::Transport {
            status,
            body_excerpt: String::from_utf8_lossy(&body[..end]).trim().to_string(),
        }
    }

    /// Suggested HTTP status for an API layer reporting this error
    pub fn suggested_status(&self) -> u16 {
        match self {
            SnapshotError::ContentTooLarge { .. }
            | SnapshotError::MimeNotAllowed(_)
            | SnapshotError::UnsupportedCompression(_)
            | SnapshotError::NotSupported(_)
            | SnapshotError::InvalidUrl(_) => 400,
            SnapshotError::Transport { .. }
            | SnapshotError::Network(_)
            | SnapshotError::Timeout { .. }
            | SnapshotError::TooManyRedirects { .. } => 502,
            SnapshotError::Cancelled => 499,
            SnapshotError::NotRenderable(_) => 415,
            SnapshotError::Internal(_) => 500,
        }
    }

    /// Check if retrying the same capture later may succeed
    ///
    /// The pipeline itself never retries.
    pub fn is_transient(&self) -> bool {
        match self {
            SnapshotError::Network(_) | SnapshotError::Timeout { .. } => true,
            SnapshotError::Transport { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;
