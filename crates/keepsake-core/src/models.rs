//! Data models for keepsake
//!
//! [`FetchedContent`] lives only for the duration of one capture;
//! [`SnapshotRecord`] is what the capture hands back for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify;
use crate::codec::Compression;
use crate::error::SnapshotResult;

/// Raw payload and transport metadata from one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedContent {
    /// URL the content was finally served from (after redirects)
    pub final_url: String,
    /// Response body, never longer than the fetch policy allows
    pub bytes: Vec<u8>,
    /// `Content-Type` header, verbatim
    pub declared_mime_type: Option<String>,
    /// `Last-Modified` header, when it parses as an HTTP date
    pub last_modified: Option<DateTime<Utc>>,
    /// `ETag` header, verbatim
    pub entity_tag: Option<String>,
    /// `Content-Encoding` header, verbatim
    pub transport_encoding: Option<String>,
}

impl FetchedContent {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A point-in-time capture of a link's content
///
/// Never mutated after creation. `content` holds the stored bytes
/// (compressed unless `compression` is `none`) and is not serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Row id, assigned by storage
    pub id: Option<i64>,
    /// Link this snapshot belongs to
    pub link_id: Uuid,
    /// Who requested the capture
    pub created_by: String,
    /// Classified content type
    pub mime_type: String,
    /// Byte count as fetched
    pub size_original: u64,
    /// Byte count as stored
    pub size_compressed: u64,
    /// Compression algorithm name as stored
    pub compression: String,
    /// SHA-256 of the content as fetched (integrity)
    pub checksum: String,
    /// SHA-256 of the content as fetched (dedup key)
    pub content_hash: String,
    /// Transport content encoding, passed through
    pub encoding: Option<String>,
    /// Transport last-modified time, passed through
    pub last_modified: Option<DateTime<Utc>>,
    /// Transport entity tag, passed through
    pub etag: Option<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl SnapshotRecord {
    /// Parse the stored compression name
    ///
    /// Fails with `UnsupportedCompression` for names this build does not know.
    pub fn compression(&self) -> SnapshotResult<Compression> {
        self.compression.parse()
    }

    /// Whether the content can be shown inline rather than downloaded
    pub fn is_renderable_inline(&self) -> bool {
        classify::is_renderable_inline(&self.mime_type)
    }

    /// Compression ratio (stored / original), 1.0 for empty content
    pub fn compression_ratio(&self) -> f64 {
        if self.size_original == 0 {
            1.0
        } else {
            self.size_compressed as f64 / self.size_original as f64
        }
    }

    /// Response headers for serving the decompressed content
    ///
    /// `content_length` is the length of the bytes actually served.
    pub fn serving_headers(&self, content_length: usize) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", self.mime_type.clone()),
            ("Content-Length", content_length.to_string()),
        ];
        if let Some(id) = self.id {
            headers.push(("X-Snapshot-Id", id.to_string()));
        }
        headers.push(("X-Original-Size", self.size_original.to_string()));
        headers.push(("X-Compression", self.compression.clone()));
        headers.push(("X-Checksum", self.checksum.clone()));
        if let Some(ref etag) = self.etag {
            headers.push(("ETag", etag.clone()));
        }
        if let Some(last_modified) = self.last_modified {
            headers.push(("Last-Modified", last_modified.to_rfc2822()));
        }
        headers
    }
}

/// Result of a successful capture run
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// New, unpersisted snapshot
    Created(SnapshotRecord),
    /// Identical content already captured for this link
    Duplicate {
        existing: SnapshotRecord,
        content_hash: String,
    },
}

impl CaptureOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CaptureOutcome::Duplicate { .. })
    }

    pub fn record(&self) -> &SnapshotRecord {
        match self {
            CaptureOutcome::Created(record) => record,
            CaptureOutcome::Duplicate { existing, .. } => existing,
        }
    }

    pub fn into_record(self) -> SnapshotRecord {
        match self {
            CaptureOutcome::Created(record) => record,
            CaptureOutcome::Duplicate { existing, .. } => existing,
        }
    }

    /// Suggested HTTP status: 200 for new snapshots, 208 for duplicates
    pub fn suggested_status(&self) -> u16 {
        match self {
            CaptureOutcome::Created(_) => 200,
            CaptureOutcome::Duplicate { .. } => 208,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> SnapshotRecord {
        SnapshotRecord {
            id: Some(7),
            link_id: Uuid::new_v4(),
            created_by: "alex".to_string(),
            mime_type: "text/html".to_string(),
            size_original: 200,
            size_compressed: 50,
            compression: "gzip".to_string(),
            checksum: "ab".repeat(32),
            content_hash: "ab".repeat(32),
            encoding: None,
            last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            etag: Some("\"v1\"".to_string()),
            content: vec![1, 2, 3],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_compression_parse() {
        let mut record = record();
        assert_eq!(record.compression().unwrap(), Compression::Gzip);

        record.compression = "lzma".to_string();
        assert!(record.compression().is_err());
    }

    #[test]
    fn test_compression_ratio() {
        let mut record = record();
        assert!((record.compression_ratio() - 0.25).abs() < f64::EPSILON);

        record.size_original = 0;
        assert_eq!(record.compression_ratio(), 1.0);
    }

    #[test]
    fn test_serving_headers() {
        let record = record();
        let headers = record.serving_headers(200);

        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("Content-Type").as_deref(), Some("text/html"));
        assert_eq!(get("Content-Length").as_deref(), Some("200"));
        assert_eq!(get("X-Snapshot-Id").as_deref(), Some("7"));
        assert_eq!(get("X-Original-Size").as_deref(), Some("200"));
        assert_eq!(get("X-Compression").as_deref(), Some("gzip"));
        assert_eq!(get("ETag").as_deref(), Some("\"v1\""));
        assert_eq!(
            get("Last-Modified").as_deref(),
            Some("Tue, 2 Jan 2024 03:04:05 +0000")
        );
    }

    #[test]
    fn test_serialization_skips_content() {
        let record = record();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["content_hash"], record.content_hash);

        let parsed: SnapshotRecord = serde_json::from_value(json).unwrap();
        assert!(parsed.content.is_empty());
        assert_eq!(parsed.checksum, record.checksum);
    }

    #[test]
    fn test_outcome_status() {
        let created = CaptureOutcome::Created(record());
        assert_eq!(created.suggested_status(), 200);
        assert!(!created.is_duplicate());

        let duplicate = CaptureOutcome::Duplicate {
            existing: record(),
            content_hash: "ab".repeat(32),
        };
        assert_eq!(duplicate.suggested_status(), 208);
        assert_eq!(duplicate.record().id, Some(7));
    }
}
