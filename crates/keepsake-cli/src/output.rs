//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;

use serde::Serialize;

use keepsake_core::{CaptureOutcome, SnapshotRecord};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print the result of a capture
    pub fn print_capture(&self, outcome: &CaptureOutcome) {
        match self.format {
            OutputFormat::Human => match outcome {
                CaptureOutcome::Created(record) => {
                    println!("✓ Captured snapshot {}", display_id(record));
                    println!();
                    self.print_snapshot(record);
                }
                CaptureOutcome::Duplicate {
                    existing,
                    content_hash,
                } => {
                    println!(
                        "Content unchanged since snapshot {} (hash {})",
                        display_id(existing),
                        short_hash(content_hash)
                    );
                    println!("Use --force to capture it again.");
                    println!();
                    self.print_snapshot(existing);
                }
            },
            OutputFormat::Json => {
                let (status, content_hash) = match outcome {
                    CaptureOutcome::Created(record) => ("created", &record.content_hash),
                    CaptureOutcome::Duplicate { content_hash, .. } => ("duplicate", content_hash),
                };
                print_json(&serde_json::json!({
                    "status": status,
                    "http_status": outcome.suggested_status(),
                    "content_hash": content_hash,
                    "snapshot": outcome.record(),
                }));
            }
            OutputFormat::Quiet => {
                println!("{}", display_id(outcome.record()));
            }
        }
    }

    /// Print a single snapshot's metadata
    pub fn print_snapshot(&self, record: &SnapshotRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:            {}", display_id(record));
                println!("Link:          {}", record.link_id);
                println!("MIME type:     {}", record.mime_type);
                println!("Size:          {}", format_size(record.size_original));
                println!(
                    "Stored:        {} ({}, {:.0}%)",
                    format_size(record.size_compressed),
                    record.compression,
                    record.compression_ratio() * 100.0
                );
                println!("Checksum:      {}", record.checksum);
                if let Some(ref etag) = record.etag {
                    println!("ETag:          {}", etag);
                }
                if let Some(last_modified) = record.last_modified {
                    println!("Last-Modified: {}", last_modified.format("%Y-%m-%d %H:%M"));
                }
                if let Some(ref encoding) = record.encoding {
                    println!("Encoding:      {}", encoding);
                }
                println!(
                    "Renderable:    {}",
                    if record.is_renderable_inline() {
                        "yes"
                    } else {
                        "no (download only)"
                    }
                );
                println!(
                    "Created:       {} by {}",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.created_by
                );
            }
            OutputFormat::Json => print_json(record),
            OutputFormat::Quiet => {
                println!("{}", display_id(record));
            }
        }
    }

    /// Print a list of snapshots
    pub fn print_snapshots(&self, records: &[SnapshotRecord]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No snapshots found.");
                    return;
                }
                for record in records {
                    println!(
                        "{:>6} | {} | {:<24} | {:>10} | {:<5} | {}",
                        display_id(record),
                        record.created_at.format("%Y-%m-%d %H:%M"),
                        truncate(&record.mime_type, 24),
                        format_size(record.size_original),
                        record.compression,
                        short_hash(&record.content_hash)
                    );
                }
                println!("\n{} snapshot(s)", records.len());
            }
            OutputFormat::Json => print_json(&records),
            OutputFormat::Quiet => {
                for record in records {
                    println!("{}", display_id(record));
                }
            }
        }
    }

    /// Report content written to a file, with the headers it would be served with
    pub fn print_written(&self, record: &SnapshotRecord, path: &Path, len: usize) {
        let headers = record.serving_headers(len);
        match self.format {
            OutputFormat::Human => {
                println!("✓ Wrote {} to {}", format_size(len as u64), path.display());
                for (name, value) in &headers {
                    println!("  {}: {}", name, value);
                }
            }
            OutputFormat::Json => {
                let headers: serde_json::Map<String, serde_json::Value> = headers
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value.into()))
                    .collect();
                print_json(&serde_json::json!({
                    "path": path.display().to_string(),
                    "bytes": len,
                    "headers": headers,
                }));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn display_id(record: &SnapshotRecord) -> String {
    record
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

/// Human-readable byte count
fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let value = bytes as f64;
    if value < KIB {
        format!("{} B", bytes)
    } else if value < MIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{:.1} MiB", value / MIB)
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ünïcödé-type/x", 8), "ünïcö...");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(25 * 1024 * 1024), "25.0 MiB");
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_should_prompt_only_for_humans() {
        assert!(Output::new(OutputFormat::Human).should_prompt());
        assert!(!Output::new(OutputFormat::Json).should_prompt());
        assert!(!Output::new(OutputFormat::Quiet).should_prompt());
    }
}
