//! Client-side persistence: preferences and the "what's new" baseline.
//!
//! Backed by a small SQLite database. Nothing here affects filter
//! correctness; a missing or empty store only costs remembered selections
//! and badges.

use rusqlite::Connection;
use std::path::Path;
use tokio::task;

use crate::error::{MemvizError, Result};

pub mod baseline;
pub mod migrate;
pub mod prefs;

pub use baseline::{diff_baseline, record_baseline, BaselineDiff};
pub use prefs::{all_prefs, get_pref, set_pref};

/// Database connection wrapper
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path).map_err(MemvizError::Database)?;

        // WAL for concurrency, NORMAL sync for speed, foreign keys for
        // integrity. The store is tiny; no large-cache tuning needed.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA temp_store = MEMORY;",
        )?;

        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| MemvizError::Config(format!("Store task panicked: {}", e)))?
    }
}
