//! Shared viewer state: the current snapshot behind a swap point, the view
//! cache, and the reload notification channel.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::assemble::{self, RenderGraph};
use crate::cache::ViewCache;
use crate::config::Config;
use crate::error::{MemvizError, Result};
use crate::filter::ViewTuning;
use crate::gateway::QueryClient;
use crate::ingest::{self, LoadReport};
use crate::model::{FilterConfig, Snapshot};
use crate::store::Db;

/// Sent to SSE subscribers whenever the snapshot is replaced.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    pub snapshot_hash: String,
    pub entity_count: usize,
}

/// State shared across HTTP handlers and the watcher.
///
/// The snapshot is immutable behind an `Arc`; filtering reads a clone of the
/// `Arc`, so a concurrent reload never mutates data under a running
/// computation. Only `install_snapshot` writes, and only wholesale.
pub struct ViewerState {
    snapshot: RwLock<Arc<Snapshot>>,
    cache: ViewCache,
    tuning: ViewTuning,
    max_zoom: f64,
    export_dir: Option<PathBuf>,
    pub db: Db,
    pub gateway: Option<QueryClient>,
    reload_tx: broadcast::Sender<ReloadEvent>,
}

impl ViewerState {
    pub fn new(config: &Config, db: Db, gateway: Option<QueryClient>) -> Self {
        let (reload_tx, _) = broadcast::channel(16);
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            cache: ViewCache::new(config.view.cache_capacity),
            tuning: config.tuning(),
            max_zoom: config.view.max_zoom,
            export_dir: config.export_dir().map(|p| p.to_path_buf()),
            db,
            gateway,
            reload_tx,
        }
    }

    /// The current snapshot. Callers hold their own `Arc`; a reload never
    /// changes data under them.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().unwrap().clone()
    }

    pub fn tuning(&self) -> ViewTuning {
        self.tuning
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn export_dir(&self) -> Option<&Path> {
        self.export_dir.as_deref()
    }

    /// Replace the snapshot wholesale and notify SSE subscribers. Previously
    /// cached views die with the old content hash.
    pub fn install_snapshot(&self, snapshot: Snapshot) {
        log::info!(
            "Installing snapshot {}: {} entities, {} relations",
            &snapshot.content_hash()[..snapshot.content_hash().len().min(12)],
            snapshot.entity_count(),
            snapshot.relation_count()
        );
        let event = ReloadEvent {
            snapshot_hash: snapshot.content_hash().to_string(),
            entity_count: snapshot.entity_count(),
        };
        *self.snapshot.write().unwrap() = Arc::new(snapshot);
        self.cache.clear();
        // No receivers is fine; the browser may not be listening yet.
        let _ = self.reload_tx.send(event);
    }

    /// The render graph for a filter config against the current snapshot,
    /// through the view cache.
    pub fn graph_for(&self, config: &FilterConfig) -> Arc<RenderGraph> {
        let snapshot = self.snapshot();
        let key = config.canonical_key();
        if let Some(hit) = self.cache.get(snapshot.content_hash(), &key) {
            return hit;
        }
        let graph = Arc::new(assemble::project(&snapshot, config, &self.tuning));
        self.cache
            .put(snapshot.content_hash(), &key, Arc::clone(&graph));
        graph
    }

    /// Reload the batch snapshot from the export directory. Returns `None`
    /// when no directory is configured or the content is unchanged.
    pub async fn reload_from_exports(&self) -> Result<Option<LoadReport>> {
        let Some(dir) = self.export_dir.clone() else {
            return Ok(None);
        };
        let (snapshot, report) =
            tokio::task::spawn_blocking(move || ingest::load_export_dir(&dir))
                .await
                .map_err(|e| MemvizError::Config(format!("Export load task panicked: {}", e)))??;

        if snapshot.content_hash() == self.snapshot().content_hash() {
            log::debug!("Export content unchanged, skipping reload");
            return Ok(None);
        }
        self.install_snapshot(snapshot);
        Ok(Some(report))
    }

    /// Refetch from the gateway for the given teams. The fetch completes
    /// before any swap, so a failure leaves the previous snapshot intact.
    pub async fn refresh_from_gateway(&self, teams: &[String]) -> Result<()> {
        let Some(client) = &self.gateway else {
            return Err(MemvizError::Config(
                "No gateway configured for online mode".to_string(),
            ));
        };
        let snapshot = client.fetch_snapshot(teams).await?;
        self.install_snapshot(snapshot);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.reload_tx.subscribe()
    }
}
