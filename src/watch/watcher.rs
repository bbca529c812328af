//! Watcher thread: notify + debounce, collapsing event bursts into single
//! change signals.
//!
//! Export regeneration rewrites several files in quick succession; the
//! receiver reloads the whole directory anyway, so one signal per quiet
//! period is enough.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};

/// Run the watcher: watch `root` recursively and, after each burst of events
/// followed by a quiet period of `debounce_ms`, send the deduplicated set of
/// changed paths over `tx`. Returns when `tx` is dropped (receiver
/// disconnected) or on watcher setup error.
pub fn run_watcher_thread(
    root: &Path,
    debounce_ms: u64,
    tx: mpsc::Sender<Vec<PathBuf>>,
) -> crate::error::Result<()> {
    let debounce = Duration::from_millis(debounce_ms);

    let (event_tx, event_rx) = mpsc::channel::<Vec<PathBuf>>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res {
            let _ = event_tx.send(ev.paths);
        }
    })
    .map_err(|e| crate::error::MemvizError::Config(e.to_string()))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| crate::error::MemvizError::Config(e.to_string()))?;

    let mut pending: HashSet<PathBuf> = HashSet::new();
    let mut last_event: Option<Instant> = None;

    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(paths) => {
                pending.extend(paths);
                last_event = Some(Instant::now());
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let quiet = last_event
                    .map(|t| t.elapsed() >= debounce)
                    .unwrap_or(false);
                if quiet && !pending.is_empty() {
                    let batch: Vec<PathBuf> = pending.drain().collect();
                    if tx.send(batch).is_err() {
                        return Ok(());
                    }
                    last_event = None;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}
