//! Export watcher: reload the batch snapshot when export files change.
//!
//! Uses the notify crate to watch the export directory, debounces event
//! bursts into single signals, and reloads through the shared viewer state.
//! The content-hash check there makes redundant reloads cheap no-ops.

mod watcher;

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::error::{MemvizError, Result};
use crate::server::ViewerState;

const EXPORT_EXTENSIONS: &[&str] = &["json", "ndjson", "jsonl"];

/// Whether a changed path is an export file worth reacting to.
pub fn is_export_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXPORT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Run the export watcher: spawn the watcher thread, then an async loop that
/// receives change batches and reloads the snapshot. Runs until the watcher
/// thread exits. A no-op when no export directory is configured.
pub async fn run_watcher(state: Arc<ViewerState>, debounce_ms: u64) -> Result<()> {
    let Some(root) = state.export_dir().map(|p| p.to_path_buf()) else {
        log::info!("No export_dir configured, watcher not started");
        return Ok(());
    };

    log::info!("Watching {} for export changes", root.display());
    let (tx, rx) = mpsc::channel();
    let rx = Arc::new(Mutex::new(rx));

    let thread_root = root.clone();
    std::thread::spawn(move || {
        if let Err(e) = watcher::run_watcher_thread(&thread_root, debounce_ms, tx) {
            log::error!("watcher thread error: {}", e);
        }
    });

    loop {
        let rx_clone = rx.clone();
        let batch = tokio::task::spawn_blocking(move || rx_clone.lock().unwrap().recv())
            .await
            .map_err(|e| MemvizError::Config(format!("watcher task join: {}", e)))?;

        let batch = match batch {
            Ok(paths) => paths,
            Err(_) => break,
        };

        let relevant = batch.iter().filter(|p| is_export_path(p)).count();
        if relevant == 0 {
            continue;
        }

        match state.reload_from_exports().await {
            Ok(Some(report)) => log::info!(
                "watch: {} export files changed, reloaded ({} entities, {} relations, {} skipped)",
                relevant,
                report.entity_count,
                report.relation_count,
                report.skipped_lines
            ),
            Ok(None) => log::debug!("watch: {} files changed but content unchanged", relevant),
            Err(e) => log::error!("watch reload failed: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_is_export_path() {
        assert!(is_export_path(&PathBuf::from("/x/shared-memory-coding.json")));
        assert!(is_export_path(&PathBuf::from("/x/a.NDJSON")));
        assert!(is_export_path(&PathBuf::from("/x/a.jsonl")));
        assert!(!is_export_path(&PathBuf::from("/x/notes.md")));
        assert!(!is_export_path(&PathBuf::from("/x/noext")));
    }
}
