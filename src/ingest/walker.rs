use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// A discovered batch export file.
#[derive(Debug, Clone)]
pub struct ExportFile {
    /// Absolute path.
    pub path: PathBuf,
    /// File stem, used as the origin tag for classification
    /// (e.g. `shared-memory-coding`).
    pub origin: String,
    pub file_size: u64,
    pub modified: std::time::SystemTime,
}

/// Discover batch export files under the configured export directory.
///
/// Recursively walks the tree and keeps JSON-line formats
/// (case-insensitive): `.json`, `.ndjson`, `.jsonl`. Results are sorted by
/// path so repeated loads see files in a stable order.
pub fn discover_export_files(root: &Path) -> Result<Vec<ExportFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !matches!(extension.as_str(), "json" | "ndjson" | "jsonl") {
            continue;
        }

        let metadata = std::fs::metadata(path).map_err(crate::error::MemvizError::Io)?;

        let origin = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        files.push(ExportFile {
            path: path.to_path_buf(),
            origin,
            file_size: metadata.len(),
            modified: metadata.modified().map_err(crate::error::MemvizError::Io)?,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));

    log::info!("Discovered {} export files in {}", files.len(), root.display());
    Ok(files)
}
