//! Compression codec for stored snapshot bytes
//!
//! Lossless and byte-oriented: the codec never looks at the content type.
//! `decode(encode(x, a), a) == x` for every algorithm.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, SnapshotResult};

/// zstd level used for new snapshots (the library default)
const ZSTD_LEVEL: i32 = 3;

/// Compression algorithm applied to stored content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
    Zstd,
}

impl Compression {
    pub const ALL: [Compression; 3] = [Compression::None, Compression::Gzip, Compression::Zstd];

    /// Name as stored on snapshot records
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }

    /// Compress `data`
    pub fn encode(&self, data: &[u8]) -> SnapshotResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).map_err(codec_error)?;
                encoder.finish().map_err(codec_error)
            }
            Compression::Zstd => zstd::encode_all(data, ZSTD_LEVEL).map_err(codec_error),
        }
    }

    /// Decompress `data` previously produced by [`Compression::encode`]
    pub fn decode(&self, data: &[u8]) -> SnapshotResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut decoder = GzDecoder::new(data);
                let mut decompressed = Vec::new();
                decoder
                    .read_to_end(&mut decompressed)
                    .map_err(codec_error)?;
                Ok(decompressed)
            }
            Compression::Zstd => zstd::decode_all(data).map_err(codec_error),
        }
    }
}

impl FromStr for Compression {
    type Err = SnapshotError;

    /// Parse an algorithm name; unknown names are an error, never a fallback
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(SnapshotError::UnsupportedCompression(s.to_string())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compress `data` with the algorithm named `algorithm`
pub fn encode(data: &[u8], algorithm: &str) -> SnapshotResult<Vec<u8>> {
    algorithm.parse::<Compression>()?.encode(data)
}

/// Decompress `data` with the algorithm named `algorithm`
pub fn decode(data: &[u8], algorithm: &str) -> SnapshotResult<Vec<u8>> {
    algorithm.parse::<Compression>()?.decode(data)
}

fn codec_error(err: std::io::Error) -> SnapshotError {
    SnapshotError::Internal(format!("codec failure: {}", err))
}
