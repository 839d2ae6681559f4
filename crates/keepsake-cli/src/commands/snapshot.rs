//! Snapshot command handlers

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::debug;
use uuid::Uuid;

use keepsake_core::{
    decompress, render as render_inline, CaptureOutcome, CaptureRequest, Compression, Config,
    SnapshotPipeline, SnapshotRecord, SnapshotStore,
};

use crate::output::Output;

/// Capture a URL and store the snapshot unless its content is unchanged
pub async fn capture(
    config: &Config,
    url: String,
    link: Option<String>,
    compression: Option<String>,
    force: bool,
    output: &Output,
) -> Result<()> {
    let link_id = match link {
        Some(ref value) => Uuid::parse_str(value.trim())
            .with_context(|| format!("Invalid link ID: {}", value))?,
        None => link_id_for_url(&url),
    };
    let compression = match compression {
        Some(name) => name.parse::<Compression>()?,
        None => config.default_compression,
    };

    let pipeline = SnapshotPipeline::from_config(config)?;
    let store = SnapshotStore::open(config)?;

    debug!("Capturing {} for link {} ({})", url, link_id, compression);
    let request = CaptureRequest::new(link_id, url.clone())
        .created_by(config.created_by.clone())
        .compression(compression)
        .force(force);

    let outcome = pipeline
        .capture_until(&request, &store, interrupted())
        .await
        .with_context(|| format!("Failed to capture {}", url))?;

    let outcome = match outcome {
        CaptureOutcome::Created(mut record) if force => {
            record.id = Some(store.insert(&record).context("Failed to store snapshot")?);
            CaptureOutcome::Created(record)
        }
        CaptureOutcome::Created(record) => store
            .insert_unless_duplicate(record)
            .context("Failed to store snapshot")?,
        duplicate => duplicate,
    };

    output.print_capture(&outcome);
    Ok(())
}

/// List snapshots of a link
pub fn list(config: &Config, link: String, output: &Output) -> Result<()> {
    let store = SnapshotStore::open(config)?;
    let snapshots = store.list_for_link(resolve_link_id(&link))?;

    output.print_snapshots(&snapshots);
    Ok(())
}

/// Show a single snapshot
pub fn show(config: &Config, id: i64, output: &Output) -> Result<()> {
    let store = SnapshotStore::open(config)?;
    let record = load(&store, id)?;

    output.print_snapshot(&record);
    Ok(())
}

/// Write the original bytes of a snapshot
pub fn raw(config: &Config, id: i64, path: Option<PathBuf>, output: &Output) -> Result<()> {
    let store = SnapshotStore::open(config)?;
    let record = load(&store, id)?;
    let content = decompress(&record)
        .with_context(|| format!("Failed to decompress snapshot {}", id))?;

    write_content(&record, &content, path, output)
}

/// Write the original bytes of a snapshot, if they can be displayed inline
pub fn render(config: &Config, id: i64, path: Option<PathBuf>, output: &Output) -> Result<()> {
    let store = SnapshotStore::open(config)?;
    let record = load(&store, id)?;
    let content = render_inline(&record).with_context(|| {
        format!(
            "Cannot render snapshot {}; use `keepsake snapshot raw {}` to download it",
            id, id
        )
    })?;

    write_content(&record, &content, path, output)
}

/// Delete a snapshot
pub fn delete(config: &Config, id: i64, yes: bool, output: &Output) -> Result<()> {
    let store = SnapshotStore::open(config)?;
    let record = load(&store, id)?;

    // Confirm deletion
    if !yes && output.should_prompt() {
        println!(
            "Delete snapshot {} ({}, captured {})",
            id,
            record.mime_type,
            record.created_at.format("%Y-%m-%d %H:%M")
        );
        if !confirm("Are you sure?")? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    if !store.delete(id).context("Failed to delete snapshot")? {
        return Err(anyhow!("Snapshot not found: {}", id));
    }

    output.success(&format!("Deleted snapshot: {}", id));
    Ok(())
}

fn load(store: &SnapshotStore, id: i64) -> Result<SnapshotRecord> {
    store
        .get(id)?
        .ok_or_else(|| anyhow!("Snapshot not found: {}", id))
}

fn write_content(
    record: &SnapshotRecord,
    content: &[u8],
    path: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write {:?}", path))?;
            output.print_written(record, &path, content.len());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Resolves when the user presses Ctrl-C
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never cancel
        std::future::pending::<()>().await;
    }
}

/// Link ID derived from a URL, so captures of one URL share a link
pub fn link_id_for_url(url: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, url.trim().as_bytes())
}

/// Parse a link argument: a UUID, or a URL whose derived link ID is used
pub fn resolve_link_id(value: &str) -> Uuid {
    Uuid::parse_str(value.trim()).unwrap_or_else(|_| link_id_for_url(value))
}

/// Ask for confirmation (returns false if stdin is not a TTY)
fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_for_url_is_stable() {
        let a = link_id_for_url("https://example.com/page");
        let b = link_id_for_url("  https://example.com/page\n");
        assert_eq!(a, b);
        assert_ne!(a, link_id_for_url("https://example.com/other"));
        assert_eq!(a.get_version_num(), 5);
    }

    #[test]
    fn test_resolve_link_id() {
        let id = Uuid::new_v4();
        assert_eq!(resolve_link_id(&id.to_string()), id);
        assert_eq!(
            resolve_link_id("https://example.com/page"),
            link_id_for_url("https://example.com/page")
        );
    }

    #[test]
    fn test_write_content_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.html");
        let record = SnapshotRecord {
            id: Some(1),
            link_id: Uuid::new_v4(),
            created_by: "alex".to_string(),
            mime_type: "text/html".to_string(),
            size_original: 4,
            size_compressed: 4,
            compression: "none".to_string(),
            checksum: String::new(),
            content_hash: String::new(),
            encoding: None,
            last_modified: None,
            etag: None,
            content: b"<p/>".to_vec(),
            created_at: chrono::Utc::now(),
        };
        let output = Output::new(crate::output::OutputFormat::Quiet);

        write_content(&record, b"<p/>", Some(path.clone()), &output).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<p/>");
    }
}
