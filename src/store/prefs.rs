//! Persisted client preferences: last-selected teams, data source mode, and
//! arbitrary viewer keys. Key/value, survive reload.

use rusqlite::params;
use std::collections::HashMap;

use super::Db;
use crate::error::{MemvizError, Result};
use crate::model::DataSource;

/// Well-known preference keys.
pub const PREF_SELECTED_TEAMS: &str = "selected_teams";
pub const PREF_DATA_SOURCE: &str = "data_source";

pub async fn get_pref(db: &Db, key: &str) -> Result<Option<String>> {
    let key = key.to_string();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare("SELECT value FROM prefs WHERE key = ?1")?;
        let mut rows = stmt.query_map([&key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(value) => Ok(Some(value?)),
            None => Ok(None),
        }
    })
    .await
}

pub async fn set_pref(db: &Db, key: &str, value: &str) -> Result<()> {
    let key = key.to_string();
    let value = value.to_string();
    db.with_connection(move |conn| {
        conn.execute(
            "INSERT INTO prefs (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    })
    .await
}

pub async fn all_prefs(db: &Db) -> Result<HashMap<String, String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT key, value FROM prefs")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut prefs = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            prefs.insert(key, value);
        }
        Ok(prefs)
    })
    .await
}

/// Last-selected teams, comma-separated in the store. Empty store means no
/// selection.
pub async fn selected_teams(db: &Db) -> Result<Vec<String>> {
    let raw = get_pref(db, PREF_SELECTED_TEAMS).await?;
    Ok(raw
        .map(|value| {
            value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default())
}

pub async fn set_selected_teams(db: &Db, teams: &[String]) -> Result<()> {
    set_pref(db, PREF_SELECTED_TEAMS, &teams.join(",")).await
}

/// Last-selected data source mode; defaults to combined when unset or
/// unparseable.
pub async fn data_source(db: &Db) -> Result<DataSource> {
    let raw = get_pref(db, PREF_DATA_SOURCE).await?;
    Ok(raw
        .and_then(|value| value.parse::<DataSource>().ok())
        .unwrap_or_default())
}

pub async fn set_data_source(db: &Db, source: DataSource) -> Result<()> {
    set_pref(db, PREF_DATA_SOURCE, source.as_str()).await
}

/// Fail fast when the prefs table is missing (migrations not run).
pub async fn storage_ok(db: &Db) -> bool {
    db.with_connection(|conn| {
        conn.query_row("SELECT COUNT(*) FROM prefs", [], |row| row.get::<_, i64>(0))
            .map_err(MemvizError::Database)
    })
    .await
    .is_ok()
}
