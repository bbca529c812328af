//! "What's new" baseline: per-entity observation counts and timestamps,
//! recorded so the viewer can badge entities that appeared or grew since the
//! user last looked. Purely cosmetic; never consulted by the filter pipeline.

use rusqlite::params;
use serde::Serialize;

use super::Db;
use crate::error::Result;
use crate::model::Snapshot;

/// Entities that changed relative to the recorded baseline.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineDiff {
    pub new_entities: Vec<String>,
    pub updated_entities: Vec<String>,
}

fn snapshot_rows(snapshot: &Snapshot) -> Vec<(String, i64, Option<String>)> {
    snapshot
        .entities()
        .iter()
        .map(|e| {
            (
                e.name.clone(),
                e.observations.len() as i64,
                e.provenance.last_modified.map(|t| t.to_rfc3339()),
            )
        })
        .collect()
}

/// Replace the stored baseline with the given snapshot's state. Returns the
/// number of recorded entities.
pub async fn record_baseline(db: &Db, snapshot: &Snapshot) -> Result<usize> {
    let rows = snapshot_rows(snapshot);
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM baseline", [])?;
        let count = rows.len();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO baseline (entity_name, observation_count, last_modified) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for (name, observation_count, last_modified) in rows {
                stmt.execute(params![name, observation_count, last_modified])?;
            }
        }
        tx.commit()?;
        Ok(count)
    })
    .await
}

/// Compare a snapshot against the stored baseline.
///
/// An entity is new when absent from the baseline, updated when its
/// observation count or last-modified timestamp differs. Output is sorted by
/// name.
pub async fn diff_baseline(db: &Db, snapshot: &Snapshot) -> Result<BaselineDiff> {
    let rows = snapshot_rows(snapshot);
    db.with_connection(move |conn| {
        let mut stmt = conn
            .prepare("SELECT observation_count, last_modified FROM baseline WHERE entity_name = ?1")?;

        let mut diff = BaselineDiff::default();
        for (name, observation_count, last_modified) in rows {
            let stored = stmt
                .query_map([&name], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
                })?
                .next()
                .transpose()?;

            match stored {
                None => diff.new_entities.push(name),
                Some((stored_count, stored_modified)) => {
                    if stored_count != observation_count || stored_modified != last_modified {
                        diff.updated_entities.push(name);
                    }
                }
            }
        }
        diff.new_entities.sort();
        diff.updated_entities.sort();
        Ok(diff)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Observation, Provenance, SourceKind};
    use crate::store::migrate;
    use tempfile::TempDir;

    fn entity(name: &str, observations: usize) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: "Pattern".to_string(),
            observations: (0..observations)
                .map(|i| Observation::plain(format!("note {}", i)))
                .collect(),
            provenance: Provenance::new(SourceKind::Batch, "coding"),
        }
    }

    fn snapshot(entities: Vec<Entity>) -> Snapshot {
        Snapshot::new(entities, vec![], String::new())
    }

    async fn test_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));
        db.with_connection(migrate::run_migrations).await.unwrap();
        (db, temp_dir)
    }

    #[tokio::test]
    async fn test_everything_new_against_empty_baseline() {
        let (db, _temp) = test_db().await;
        let snap = snapshot(vec![entity("A", 1), entity("B", 2)]);
        let diff = diff_baseline(&db, &snap).await.unwrap();
        assert_eq!(diff.new_entities, vec!["A", "B"]);
        assert!(diff.updated_entities.is_empty());
    }

    #[tokio::test]
    async fn test_no_changes_after_recording() {
        let (db, _temp) = test_db().await;
        let snap = snapshot(vec![entity("A", 1)]);
        assert_eq!(record_baseline(&db, &snap).await.unwrap(), 1);

        let diff = diff_baseline(&db, &snap).await.unwrap();
        assert!(diff.new_entities.is_empty());
        assert!(diff.updated_entities.is_empty());
    }

    #[tokio::test]
    async fn test_grown_entity_reported_updated() {
        let (db, _temp) = test_db().await;
        record_baseline(&db, &snapshot(vec![entity("A", 1)]))
            .await
            .unwrap();

        let grown = snapshot(vec![entity("A", 3), entity("B", 1)]);
        let diff = diff_baseline(&db, &grown).await.unwrap();
        assert_eq!(diff.new_entities, vec!["B"]);
        assert_eq!(diff.updated_entities, vec!["A"]);
    }

    #[tokio::test]
    async fn test_record_replaces_previous_baseline() {
        let (db, _temp) = test_db().await;
        record_baseline(&db, &snapshot(vec![entity("Old", 1)]))
            .await
            .unwrap();
        record_baseline(&db, &snapshot(vec![entity("A", 1)]))
            .await
            .unwrap();

        // "Old" is gone from the baseline; only "A" is known.
        let diff = diff_baseline(&db, &snapshot(vec![entity("Old", 1)]))
            .await
            .unwrap();
        assert_eq!(diff.new_entities, vec!["Old"]);
    }
}
