//! Inspect command implementation.

use super::{CliError, Format};
use contentmirror_core::RecordKind;
use contentmirror_store::{ContentStore, SqlStore};
use contentmirror_sync_engine::DEFAULT_CURSOR_KEY;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Mirror inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Mirror path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of stored records, the cursor included.
    pub record_count: usize,
    /// Records per content type.
    pub content_types: Vec<ContentTypeCount>,
    /// Persisted sync cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Record count of one content type.
#[derive(Debug, Serialize)]
pub struct ContentTypeCount {
    /// Content type id.
    pub content_type: String,
    /// Number of records.
    pub count: usize,
}

/// Collects the inspection result.
pub fn inspect(store: &SqlStore, path: &Path) -> Result<InspectResult, CliError> {
    let cursor = store
        .find(DEFAULT_CURSOR_KEY)?
        .filter(|r| r.kind() == RecordKind::SyncToken)
        .and_then(|r| r.token);
    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        record_count: store.len()?,
        content_types: store
            .content_type_counts()?
            .into_iter()
            .map(|(content_type, count)| ContentTypeCount {
                content_type,
                count,
            })
            .collect(),
        cursor,
    })
}

/// Runs the inspect command.
pub fn run(store: &SqlStore, path: &Path, format: Format, out: &mut impl Write) -> Result<(), CliError> {
    let result = inspect(store, path)?;
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        Format::Text => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Mirror: {}", result.path)?;
    writeln!(out, "File size: {} bytes", result.file_size)?;
    writeln!(out, "Records: {}", result.record_count)?;
    writeln!(out, "Cursor: {}", result.cursor.as_deref().unwrap_or("(none)"))?;
    if !result.content_types.is_empty() {
        writeln!(out)?;
        writeln!(out, "{:<24} {:>8}", "CONTENT TYPE", "COUNT")?;
        for entry in &result.content_types {
            writeln!(out, "{:<24} {:>8}", entry.content_type, entry.count)?;
        }
    }
    Ok(())
}
