//! NDJSON record parsing: one entity or relation per line.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{MemvizError, Result};
use crate::ingest::{classify, observations};
use crate::model::{Entity, Observation, Provenance, Relation};

/// Observation as found on the wire: a plain string or a structured record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawObservation {
    Text(String),
    Structured {
        content: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        date: Option<String>,
    },
}

/// One NDJSON line before shape validation. Entity and relation fields share
/// a struct because the line kind is only known after parsing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(rename = "type", default)]
    record_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    observations: Vec<RawObservation>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    relation_type: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
}

/// A successfully parsed NDJSON line.
#[derive(Debug)]
pub enum LineRecord {
    Entity(Entity),
    Relation(Relation),
}

/// Parse one NDJSON line.
///
/// `origin` is the tag of the file or feed the line came from; it drives
/// source classification and the team fallback for records that carry
/// neither.
pub fn parse_line(line: &str, origin: &str) -> Result<LineRecord> {
    let raw: RawRecord = serde_json::from_str(line)
        .map_err(|e| MemvizError::Parse(format!("Bad NDJSON line: {}", e)))?;

    let has_relation_shape =
        raw.from.is_some() && raw.to.is_some() && raw.relation_type.is_some();

    match raw.record_type.as_deref() {
        Some("entity") => build_entity(raw, origin),
        Some("relation") => build_relation(raw),
        Some(other) => Err(MemvizError::Parse(format!(
            "Unknown record type: {}",
            other
        ))),
        // A relation is recognized without an explicit "type" field when
        // from, to and relationType are all present.
        None if has_relation_shape => build_relation(raw),
        None if raw.name.is_some() && raw.entity_type.is_some() => build_entity(raw, origin),
        None => Err(MemvizError::Parse(
            "Record is neither an entity nor a relation".to_string(),
        )),
    }
}

fn build_entity(raw: RawRecord, origin: &str) -> Result<LineRecord> {
    let name = raw
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| MemvizError::Parse("Entity record missing name".to_string()))?;
    let entity_type = raw
        .entity_type
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MemvizError::Parse(format!("Entity {} missing entityType", name)))?;

    let observations = raw
        .observations
        .into_iter()
        .map(|o| match o {
            RawObservation::Text(s) => observations::parse_observation(&s),
            RawObservation::Structured {
                content,
                kind,
                date,
            } => Observation {
                content,
                kind,
                date,
            },
        })
        .collect();

    let team = raw
        .team
        .filter(|t| !t.is_empty())
        .or_else(|| classify::team_from_origin(origin))
        .unwrap_or_default();
    let mut provenance = Provenance::new(
        classify::classify_source(origin, raw.source.as_deref()),
        team,
    );
    provenance.confidence = raw.confidence;
    provenance.last_modified = raw.last_modified;

    Ok(LineRecord::Entity(Entity {
        name,
        entity_type,
        observations,
        provenance,
    }))
}

fn build_relation(raw: RawRecord) -> Result<LineRecord> {
    let from = raw
        .from
        .filter(|f| !f.is_empty())
        .ok_or_else(|| MemvizError::Parse("Relation record missing from".to_string()))?;
    let to = raw
        .to
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MemvizError::Parse("Relation record missing to".to_string()))?;
    let relation_type = raw
        .relation_type
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MemvizError::Parse("Relation record missing relationType".to_string()))?;

    Ok(LineRecord::Relation(Relation {
        from,
        to,
        relation_type,
    }))
}
