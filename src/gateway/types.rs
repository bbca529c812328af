//! Wire shapes of the remote query service.

use serde::{Deserialize, Serialize};

use crate::ingest::{classify_source, parse_observation};
use crate::model::{DataSource, Entity, Observation, Provenance, Relation};

/// Origin tag attached to entities fetched from the query service; drives
/// source classification.
pub const ONLINE_ORIGIN: &str = "database";

/// A team as reported by the query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub entity_count: Option<u64>,
    #[serde(default)]
    pub last_activity: Option<String>,
}

/// Response of GET /api/teams.
#[derive(Debug, Deserialize)]
pub struct TeamsResponse {
    #[serde(default)]
    pub available: Vec<TeamInfo>,
}

/// Response of GET /api/health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub storage: bool,
    #[serde(default)]
    pub search: bool,
    #[serde(default)]
    pub graph: bool,
}

/// Query parameters for GET /api/entities.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub team: Option<String>,
    pub source: Option<DataSource>,
    pub types: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub search_term: Option<String>,
}

/// Query parameters for GET /api/relations.
#[derive(Debug, Clone, Default)]
pub struct RelationQuery {
    pub team: Option<String>,
    pub entity_id: Option<String>,
}

/// Observation as serialized by the service: a plain string or a structured
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireObservation {
    Text(String),
    Structured {
        content: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date: Option<String>,
    },
}

/// Entity as returned by the query service. The surrogate `id` is accepted
/// but the core keys everything by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntity {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<WireObservation>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

impl WireEntity {
    /// Convert into the core model, running the standard ingestion
    /// classification with the service origin tag.
    pub fn into_entity(self, fallback_team: &str) -> Entity {
        let observations = self
            .observations
            .into_iter()
            .map(|o| match o {
                WireObservation::Text(s) => parse_observation(&s),
                WireObservation::Structured {
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

        let team = self
            .team
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_team.to_string());
        let mut provenance = Provenance::new(
            classify_source(ONLINE_ORIGIN, self.source.as_deref()),
            team,
        );
        provenance.confidence = self.confidence;
        provenance.last_modified = self.last_modified;

        Entity {
            name: self.name,
            entity_type: self.entity_type,
            observations,
            provenance,
        }
    }
}

/// Relation as returned by the query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRelation {
    #[serde(default)]
    pub relation_id: Option<String>,
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl From<WireRelation> for Relation {
    fn from(wire: WireRelation) -> Self {
        Relation {
            from: wire.from,
            to: wire.to,
            relation_type: wire.relation_type,
        }
    }
}

/// Body of POST /api/entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    pub team: String,
}

/// Body of POST /api/relations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelation {
    pub relation_id: String,
    pub from: String,
    pub to: String,
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl NewRelation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            relation_id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            team: None,
        }
    }
}
