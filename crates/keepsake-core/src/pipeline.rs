//! Snapshot capture pipeline
//!
//! One capture runs five ordered phases, each of which can end the run
//! with a typed error:
//!
//! 1. fetch the URL under the size/redirect/timeout policy
//! 2. classify the bytes and check the MIME policy
//! 3. fingerprint the bytes as fetched
//! 4. ask the duplicate lookup for an existing snapshot (unless forced)
//! 5. compress and assemble a new, unpersisted [`SnapshotRecord`]
//!
//! The pipeline holds no mutable state; concurrent captures share only
//! the fetcher's connection pool. Persisting the record is up to the
//! caller.

use std::future::Future;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::{self, Classifier};
use crate::codec::Compression;
use crate::config::Config;
use crate::error::{SnapshotError, SnapshotResult};
use crate::fetch::{FetchPolicy, Fetcher};
use crate::hash::content_hash;
use crate::models::{CaptureOutcome, FetchedContent, SnapshotRecord};
use crate::source::SourceUrl;

/// Pattern a classified MIME type must match, anchored at the start
///
/// A policy without a compiled pattern allows every type.
#[derive(Debug, Clone)]
pub struct MimePolicy {
    pattern: String,
    regex: Option<Regex>,
}

impl MimePolicy {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Some(regex),
        })
    }

    /// Policy accepting every type
    pub fn allow_all() -> Self {
        Self {
            pattern: ".*".to_string(),
            regex: None,
        }
    }

    pub fn allows(&self, mime_type: &str) -> bool {
        self.regex
            .as_ref()
            .map_or(true, |regex| regex.is_match(mime_type))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Default for MimePolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

/// Fetch and MIME limits for one capture
#[derive(Debug, Clone, Default)]
pub struct CapturePolicy {
    pub fetch: FetchPolicy,
    pub mime: MimePolicy,
}

impl CapturePolicy {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            fetch: config.fetch_policy(),
            mime: config.mime_policy()?,
        })
    }
}

/// Looks up an existing snapshot with identical content
///
/// Implemented by the storage layer. Only called once per capture, and
/// never when the capture is forced. The lookup is borrowed across the
/// fetch, so it must be shareable for a capture to be spawned.
pub trait DuplicateLookup: Send + Sync {
    /// Most recent snapshot of `link_id` whose content hash is `content_hash`
    fn find_duplicate(
        &self,
        link_id: Uuid,
        content_hash: &str,
    ) -> anyhow::Result<Option<SnapshotRecord>>;
}

/// Lookup that never finds a duplicate
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDuplicates;

impl DuplicateLookup for NoDuplicates {
    fn find_duplicate(&self, _: Uuid, _: &str) -> anyhow::Result<Option<SnapshotRecord>> {
        Ok(None)
    }
}

impl DuplicateLookup for Vec<SnapshotRecord> {
    fn find_duplicate(
        &self,
        link_id: Uuid,
        content_hash: &str,
    ) -> anyhow::Result<Option<SnapshotRecord>> {
        Ok(self
            .iter()
            .filter(|r| r.link_id == link_id && r.content_hash == content_hash)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}

/// What to capture and how to store it
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub link_id: Uuid,
    pub created_by: String,
    pub url: String,
    pub compression: Compression,
    /// Capture even if identical content already exists for the link
    pub force: bool,
}

impl CaptureRequest {
    pub fn new(link_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            link_id,
            created_by: String::new(),
            url: url.into(),
            compression: Compression::default(),
            force: false,
        }
    }

    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Fetch → classify → fingerprint → dedup → compress
#[derive(Debug, Clone)]
pub struct SnapshotPipeline {
    fetcher: Fetcher,
    classifier: Classifier,
    policy: CapturePolicy,
}

impl SnapshotPipeline {
    pub fn new(fetcher: Fetcher, policy: CapturePolicy) -> Self {
        Self {
            fetcher,
            classifier: Classifier::default(),
            policy,
        }
    }

    /// Build a pipeline from configuration (fetch limits, MIME pattern, User-Agent)
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Fetcher::from_config(config)?;
        Ok(Self::new(fetcher, CapturePolicy::from_config(config)?))
    }

    /// Replace the signature table used for classification
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    /// Capture under the pipeline's own policy
    pub async fn capture(
        &self,
        request: &CaptureRequest,
        lookup: &dyn DuplicateLookup,
    ) -> SnapshotResult<CaptureOutcome> {
        self.capture_with_policy(request, &self.policy, lookup).await
    }

    /// Capture, giving up with `Cancelled` as soon as `cancel` resolves
    ///
    /// Dropping the in-flight capture releases its connection; nothing
    /// partial is returned.
    pub async fn capture_until<C>(
        &self,
        request: &CaptureRequest,
        lookup: &dyn DuplicateLookup,
        cancel: C,
    ) -> SnapshotResult<CaptureOutcome>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.capture(request, lookup) => result,
            _ = cancel => {
                warn!("Capture of {} cancelled", request.url);
                Err(SnapshotError::Cancelled)
            }
        }
    }

    /// Capture under an explicit policy
    pub async fn capture_with_policy(
        &self,
        request: &CaptureRequest,
        policy: &CapturePolicy,
        lookup: &dyn DuplicateLookup,
    ) -> SnapshotResult<CaptureOutcome> {
        let url = SourceUrl::parse(&request.url)?;
        let fetched = self.fetcher.fetch(&url, &policy.fetch).await?;

        let mime_type = self
            .classifier
            .classify(&fetched.bytes, fetched.declared_mime_type.as_deref());
        debug!("Classified {} as {}", url, mime_type);
        if !policy.mime.allows(&mime_type) {
            warn!(
                "Rejecting {}: {} does not match '{}'",
                url,
                mime_type,
                policy.mime.pattern()
            );
            return Err(SnapshotError::MimeNotAllowed(mime_type));
        }

        let hash = content_hash(&fetched.bytes);

        if !request.force {
            let existing = lookup
                .find_duplicate(request.link_id, &hash)
                .map_err(|e| SnapshotError::Internal(format!("duplicate lookup failed: {:#}", e)))?;
            if let Some(existing) = existing {
                info!(
                    "Content of {} unchanged (hash {}), reusing snapshot {:?}",
                    url, hash, existing.id
                );
                return Ok(CaptureOutcome::Duplicate {
                    existing,
                    content_hash: hash,
                });
            }
        }

        let record = assemble(request, fetched, mime_type, hash)?;
        info!(
            "Captured {} ({} bytes, {} -> {} bytes stored)",
            url, record.mime_type, record.size_original, record.size_compressed
        );
        Ok(CaptureOutcome::Created(record))
    }
}

/// Compress the fetched bytes and build the record
fn assemble(
    request: &CaptureRequest,
    fetched: FetchedContent,
    mime_type: String,
    hash: String,
) -> SnapshotResult<SnapshotRecord> {
    let size_original = fetched.len();
    let content = match request.compression {
        Compression::None => fetched.bytes,
        algorithm => algorithm.encode(&fetched.bytes)?,
    };

    Ok(SnapshotRecord {
        id: None,
        link_id: request.link_id,
        created_by: request.created_by.clone(),
        mime_type,
        size_original,
        size_compressed: content.len() as u64,
        compression: request.compression.as_str().to_string(),
        checksum: hash.clone(),
        content_hash: hash,
        encoding: fetched.transport_encoding,
        last_modified: fetched.last_modified,
        etag: fetched.entity_tag,
        content,
        created_at: Utc::now(),
    })
}

/// Original bytes of a stored snapshot
pub fn decompress(record: &SnapshotRecord) -> SnapshotResult<Vec<u8>> {
    record.compression()?.decode(&record.content)
}

/// Original bytes of a stored snapshot, if its type renders inline
pub fn render(record: &SnapshotRecord) -> SnapshotResult<Vec<u8>> {
    if !classify::is_renderable_inline(&record.mime_type) {
        return Err(SnapshotError::NotRenderable(record.mime_type.clone()));
    }
    decompress(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(link_id: Uuid, hash: &str, minutes_ago: i64) -> SnapshotRecord {
        let content = b"<html>hello</html>".to_vec();
        SnapshotRecord {
            id: Some(minutes_ago),
            link_id,
            created_by: "alex".to_string(),
            mime_type: "text/html".to_string(),
            size_original: content.len() as u64,
            size_compressed: content.len() as u64,
            compression: "none".to_string(),
            checksum: hash.to_string(),
            content_hash: hash.to_string(),
            encoding: None,
            last_modified: None,
            etag: None,
            content,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_mime_policy_anchored_at_start() {
        let policy = MimePolicy::new("text/.*|image/png").unwrap();
        assert!(policy.allows("text/html"));
        assert!(policy.allows("image/png"));
        assert!(!policy.allows("application/pdf"));
        assert!(!policy.allows("x-text/html"));
        assert_eq!(policy.pattern(), "text/.*|image/png");
    }

    #[test]
    fn test_mime_policy_default_allows_everything() {
        let policy = MimePolicy::default();
        assert!(policy.allows("application/octet-stream"));
        assert!(policy.allows(""));
    }

    #[test]
    fn test_mime_policy_invalid_pattern() {
        assert!(MimePolicy::new("text/(").is_err());
    }

    #[test]
    fn test_vec_lookup_returns_most_recent_match() {
        let link = Uuid::new_v4();
        let other = Uuid::new_v4();
        let records = vec![
            record(link, "aaa", 30),
            record(link, "aaa", 5),
            record(link, "bbb", 1),
            record(other, "aaa", 0),
        ];

        let found = records.find_duplicate(link, "aaa").unwrap().unwrap();
        assert_eq!(found.id, Some(5));
        assert!(records.find_duplicate(link, "ccc").unwrap().is_none());
        assert!(NoDuplicates.find_duplicate(link, "aaa").unwrap().is_none());
    }

    #[test]
    fn test_assemble_without_compression() {
        let request = CaptureRequest::new(Uuid::new_v4(), "https://example.com")
            .created_by("alex")
            .compression(Compression::None);
        let fetched = FetchedContent {
            final_url: "https://example.com/".to_string(),
            bytes: b"hello".to_vec(),
            declared_mime_type: None,
            last_modified: None,
            entity_tag: Some("\"e1\"".to_string()),
            transport_encoding: Some("identity".to_string()),
        };

        let hash = content_hash(b"hello");
        let record = assemble(&request, fetched, "text/plain".into(), hash.clone()).unwrap();
        assert_eq!(record.compression, "none");
        assert_eq!(record.size_original, 5);
        assert_eq!(record.size_compressed, record.size_original);
        assert_eq!(record.content, b"hello");
        assert_eq!(record.checksum, hash);
        assert_eq!(record.content_hash, hash);
        assert_eq!(record.etag.as_deref(), Some("\"e1\""));
        assert_eq!(record.encoding.as_deref(), Some("identity"));
        assert_eq!(record.created_by, "alex");
        assert!(record.id.is_none());
    }

    #[test]
    fn test_decompress_roundtrip() {
        let original = b"<html><body>snapshot body</body></html>".repeat(20);
        for algorithm in Compression::ALL {
            let mut rec = record(Uuid::new_v4(), "h", 0);
            rec.content = algorithm.encode(&original).unwrap();
            rec.compression = algorithm.as_str().to_string();
            assert_eq!(decompress(&rec).unwrap(), original);
        }
    }

    #[test]
    fn test_decompress_unknown_algorithm() {
        let mut rec = record(Uuid::new_v4(), "h", 0);
        rec.compression = "bzip2".to_string();
        assert!(matches!(
            decompress(&rec),
            Err(SnapshotError::UnsupportedCompression(ref a)) if a == "bzip2"
        ));
    }

    #[test]
    fn test_render_rejects_binary_types() {
        let mut rec = record(Uuid::new_v4(), "h", 0);
        assert_eq!(render(&rec).unwrap(), b"<html>hello</html>");

        rec.mime_type = "application/pdf".to_string();
        assert!(matches!(render(&rec), Err(SnapshotError::NotRenderable(_))));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_capture_futures_are_send() {
        let fetcher = Fetcher::new("keepsake-test").unwrap();
        let pipeline = SnapshotPipeline::new(fetcher, CapturePolicy::default());
        let store = crate::storage::SnapshotStore::open_in_memory().unwrap();
        let request = CaptureRequest::new(Uuid::new_v4(), "https://example.com/");

        assert_send(&pipeline.capture(&request, &store));
        assert_send(&pipeline.capture_until(&request, &store, std::future::pending::<()>()));
    }
}
