//! Content classification
//!
//! Picks one MIME type for fetched bytes. First match wins:
//!
//! 1. Declared type from the transport, parameters stripped, unless it is
//!    the generic `application/octet-stream`
//! 2. Magic-byte signatures (longest matching prefix wins)
//! 3. Strict UTF-8 decoding succeeds → `text/plain`
//! 4. `application/octet-stream`
//!
//! Classification never fails.

use std::borrow::Cow;

/// Generic binary type, also treated as "no signal" when declared
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Generic text type for decodable content without a signature
pub const TEXT_PLAIN: &str = "text/plain";

/// Types rendered inline in addition to every `image/*` type
const INLINE_TYPES: &[&str] = &[
    "text/html",
    "text/markdown",
    "text/plain",
    "text/css",
    "text/javascript",
    "application/json",
    "application/xml",
    "text/xml",
];

/// A magic-byte prefix mapped to a MIME type
#[derive(Debug, Clone)]
pub struct Signature {
    prefix: Cow<'static, [u8]>,
    mime_type: Cow<'static, str>,
    markup: bool,
}

impl Signature {
    /// Binary signature matched byte-for-byte at offset 0
    pub fn binary(
        prefix: impl Into<Cow<'static, [u8]>>,
        mime_type: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            mime_type: mime_type.into(),
            markup: false,
        }
    }

    /// Text markup signature, matched ASCII case-insensitively after
    /// leading whitespace and a UTF-8 byte order mark
    pub fn markup(
        prefix: impl Into<Cow<'static, [u8]>>,
        mime_type: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            mime_type: mime_type.into(),
            markup: true,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn matches(&self, content: &[u8]) -> bool {
        if self.markup {
            let body = skip_text_preamble(content);
            body.len() >= self.prefix.len()
                && body[..self.prefix.len()].eq_ignore_ascii_case(&self.prefix)
        } else {
            content.starts_with(&self.prefix)
        }
    }
}

/// Signature table plus the classification algorithm
#[derive(Debug, Clone)]
pub struct Classifier {
    signatures: Vec<Signature>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            signatures: vec![
                Signature::binary(&b"\x89PNG\r\n\x1a\n"[..], "image/png"),
                Signature::binary(&b"\xff\xd8\xff"[..], "image/jpeg"),
                Signature::binary(&b"GIF87a"[..], "image/gif"),
                Signature::binary(&b"GIF89a"[..], "image/gif"),
                Signature::binary(&b"%PDF"[..], "application/pdf"),
                Signature::binary(&b"PK\x03\x04"[..], "application/zip"),
                Signature::binary(&b"\x1f\x8b\x08"[..], "application/gzip"),
                Signature::markup(&b"<!DOCTYPE"[..], "text/html"),
                Signature::markup(&b"<html"[..], "text/html"),
                Signature::markup(&b"<?xml"[..], "application/xml"),
            ],
        }
    }
}

impl Classifier {
    /// Classifier with no signatures (steps 1, 3 and 4 only)
    pub fn empty() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    /// Add a signature to the table
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Classify `content`, using `declared` (a raw `Content-Type` value) as
    /// the strongest hint
    pub fn classify(&self, content: &[u8], declared: Option<&str>) -> String {
        if let Some(mime_type) = declared.and_then(essence) {
            if mime_type != OCTET_STREAM {
                return mime_type;
            }
        }

        if let Some(mime_type) = self.sniff(content) {
            return mime_type.to_string();
        }

        if !content.is_empty() && std::str::from_utf8(content).is_ok() {
            return TEXT_PLAIN.to_string();
        }

        OCTET_STREAM.to_string()
    }

    /// Most specific signature matching `content`
    pub fn sniff(&self, content: &[u8]) -> Option<&str> {
        self.signatures
            .iter()
            .filter(|sig| sig.matches(content))
            .max_by_key(|sig| sig.prefix.len())
            .map(Signature::mime_type)
    }
}

/// `type/subtype` of a Content-Type value, lowercased, without parameters
pub fn essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

/// Whether content of this type may be rendered inline by a browser
pub fn is_renderable_inline(mime_type: &str) -> bool {
    let Some(mime_type) = essence(mime_type) else {
        return false;
    };
    mime_type.starts_with("image/") || INLINE_TYPES.contains(&mime_type.as_str())
}

fn skip_text_preamble(content: &[u8]) -> &[u8] {
    let content = content.strip_prefix(b"\xef\xbb\xbf").unwrap_or(content);
    let start = content
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(content.len());
    &content[start..]
}
