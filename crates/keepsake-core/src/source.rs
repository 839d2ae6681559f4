//! Source URLs
//!
//! A link's URL parsed once into a scheme/host/path triple and tagged with
//! the kind of location it points at. Only [`UrlKind::Http`] is fetchable;
//! the other kinds are recognised so callers get a precise
//! `NotSupported` instead of a parse failure.

use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, SnapshotResult};

/// Kind of location a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    Http,
    WebSocket,
    Ftp,
    S3,
    CloudStorage,
    Storage,
    Git,
    Network,
}

impl UrlKind {
    /// Classify a (lowercase) scheme
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        let kind = match scheme {
            "http" | "https" => UrlKind::Http,
            "ws" | "wss" => UrlKind::WebSocket,
            "ftp" | "ftps" | "ftpes" | "sftp" => UrlKind::Ftp,
            "s3" | "s3a" | "s3n" => UrlKind::S3,
            "gs" | "az" | "wasb" | "wasbs" | "swift" | "minio" | "cos" | "oss" | "b2" => {
                UrlKind::CloudStorage
            }
            "file" | "smb" | "nfs" => UrlKind::Storage,
            "git" | "git+ssh" | "git+http" | "git+https" | "ssh" => UrlKind::Git,
            "ntp" | "ntps" | "dns" | "dns+https" | "dns+tls" | "ldap" | "ldaps" | "smtp"
            | "smtps" | "submission" => UrlKind::Network,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlKind::Http => "http",
            UrlKind::WebSocket => "websocket",
            UrlKind::Ftp => "ftp",
            UrlKind::S3 => "s3",
            UrlKind::CloudStorage => "cloud storage",
            UrlKind::Storage => "storage",
            UrlKind::Git => "git",
            UrlKind::Network => "network service",
        }
    }
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated URL tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    kind: UrlKind,
    url: Url,
}

impl SourceUrl {
    /// Parse and validate a URL
    ///
    /// A host is required for every scheme except `file`.
    pub fn parse(input: &str) -> SnapshotResult<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| SnapshotError::InvalidUrl(format!("{}: {}", input, e)))?;

        let kind = UrlKind::from_scheme(url.scheme()).ok_or_else(|| {
            SnapshotError::InvalidUrl(format!("unsupported scheme '{}'", url.scheme()))
        })?;

        let has_host = url.host_str().is_some_and(|h| !h.is_empty());
        if !has_host && url.scheme() != "file" {
            return Err(SnapshotError::InvalidUrl(format!(
                "{} URL must include a hostname",
                url.scheme()
            )));
        }

        Ok(Self { kind, url })
    }

    pub fn kind(&self) -> UrlKind {
        self.kind
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    /// Path component, `/` when empty
    pub fn path(&self) -> &str {
        match self.url.path() {
            "" => "/",
            path => path,
        }
    }

    /// Explicit port, or the scheme's well-known default
    pub fn port(&self) -> Option<u16> {
        self.url.port().or_else(|| default_port(self.scheme()))
    }

    /// Whether the scheme implies transport encryption
    pub fn is_secure(&self) -> bool {
        matches!(
            self.scheme(),
            "https"
                | "wss"
                | "ftps"
                | "ftpes"
                | "sftp"
                | "ssh"
                | "git+ssh"
                | "git+https"
                | "ntps"
                | "dns+https"
                | "dns+tls"
                | "ldaps"
                | "smtps"
        )
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for SourceUrl {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    let port = match scheme {
        "http" | "ws" | "git+http" => 80,
        "https" | "wss" | "git+https" | "dns+https" => 443,
        "ftp" | "ftpes" => 21,
        "ftps" => 990,
        "sftp" | "ssh" | "git+ssh" => 22,
        "git" => 9418,
        "ntp" | "ntps" => 123,
        "dns" => 53,
        "dns+tls" => 853,
        "ldap" => 389,
        "ldaps" => 636,
        "smtp" => 25,
        "smtps" => 465,
        "submission" => 587,
        "smb" => 445,
        "nfs" => 2049,
        _ => return None,
    };
    Some(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http() {
        let url = SourceUrl::parse("https://example.com/articles/1?x=2").unwrap();
        assert_eq!(url.kind(), UrlKind::Http);
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host(), "example.com");
        assert_eq!(url.path(), "/articles/1");
        assert_eq!(url.port(), Some(443));
        assert!(url.is_secure());
    }

    #[test]
    fn test_explicit_port() {
        let url = SourceUrl::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(url.port(), Some(8080));
        assert!(!url.is_secure());
    }

    #[test]
    fn test_kinds() {
        let cases = [
            ("ftp://files.example.com/a.txt", UrlKind::Ftp),
            ("sftp://files.example.com/a.txt", UrlKind::Ftp),
            ("s3://bucket/key", UrlKind::S3),
            ("gs://bucket/key", UrlKind::CloudStorage),
            ("file:///tmp/page.html", UrlKind::Storage),
            ("git+ssh://git@example.com/repo.git", UrlKind::Git),
            ("ldap://directory.example.com", UrlKind::Network),
            ("wss://socket.example.com/feed", UrlKind::WebSocket),
        ];

        for (input, kind) in cases {
            assert_eq!(SourceUrl::parse(input).unwrap().kind(), kind, "{}", input);
        }
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = SourceUrl::parse("gopher://example.com").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidUrl(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            SourceUrl::parse("not a url"),
            Err(SnapshotError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_requires_host() {
        assert!(matches!(
            SourceUrl::parse("s3:///key-only"),
            Err(SnapshotError::InvalidUrl(_))
        ));
        assert!(SourceUrl::parse("file:///etc/hosts").is_ok());
    }

    #[test]
    fn test_from_str_trims() {
        let url: SourceUrl = "  https://example.com  ".parse().unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }
}
