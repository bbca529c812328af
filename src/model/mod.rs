//! Graph data model: entities, relations, snapshots and filter configuration.
//!
//! A `Snapshot` is the immutable (entities, relations) pair a view session
//! works against; `FilterConfig` is the query it is projected through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity type treated as a universal, always-visible hub.
pub const SYSTEM_TYPE: &str = "System";

/// Entity type treated as a secondary hub, visible only when referenced.
pub const PROJECT_TYPE: &str = "Project";

/// Provenance partition: manually curated exports vs the live query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Batch,
    Online,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Batch => "batch",
            SourceKind::Online => "online",
        }
    }
}

/// Data source selector of a view: one kind, or both combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Batch,
    Online,
    #[default]
    Combined,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Batch => "batch",
            DataSource::Online => "online",
            DataSource::Combined => "combined",
        }
    }
}

impl std::str::FromStr for DataSource {
    type Err = crate::error::MemvizError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batch" => Ok(DataSource::Batch),
            "online" => Ok(DataSource::Online),
            "combined" => Ok(DataSource::Combined),
            other => Err(crate::error::MemvizError::InvalidInput(format!(
                "Unknown data source: {}",
                other
            ))),
        }
    }
}

/// One atomic fact attached to an entity.
///
/// Plain wire strings are decomposed into `kind`/`date` when they follow the
/// `[kind] content (YYYY-MM-DD)` export convention (see `ingest::observations`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Observation {
    pub fn plain<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            kind: None,
            date: None,
        }
    }
}

/// Where an entity came from and who owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub source_kind: SourceKind,
    pub team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Provenance {
    pub fn new(source_kind: SourceKind, team: impl Into<String>) -> Self {
        Self {
            source_kind,
            team: team.into(),
            confidence: None,
            last_modified: None,
        }
    }
}

/// A node in the knowledge graph. `name` is the primary key within a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<Observation>,
    pub provenance: Provenance,
}

impl Entity {
    /// System entities are team-agnostic hubs, always visible.
    pub fn is_system(&self) -> bool {
        self.entity_type == SYSTEM_TYPE
    }

    /// Project entities are secondary hubs, visible only when referenced.
    pub fn is_project(&self) -> bool {
        self.entity_type == PROJECT_TYPE
    }
}

/// A directed, typed edge between two entities by name.
///
/// Endpoints are not guaranteed to resolve in the current entity set; assembly
/// drops dangling relations rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

/// An immutable (entities, relations) pair loaded for a view session.
///
/// Entity names are unique within one snapshot; the name index makes lookups
/// O(1). A fresh load replaces the snapshot wholesale.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entities: Vec<Entity>,
    relations: Vec<Relation>,
    index: HashMap<String, usize>,
    content_hash: String,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from raw parts. On duplicate names the first entity
    /// wins; later duplicates are logged and skipped.
    pub fn new(entities: Vec<Entity>, relations: Vec<Relation>, content_hash: String) -> Self {
        let mut unique = Vec::with_capacity(entities.len());
        let mut index = HashMap::with_capacity(entities.len());
        for entity in entities {
            if index.contains_key(&entity.name) {
                log::warn!("Duplicate entity name in snapshot, keeping first: {}", entity.name);
                continue;
            }
            index.insert(entity.name.clone(), unique.len());
            unique.push(entity);
        }
        Self {
            entities: unique,
            relations,
            index,
            content_hash,
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), String::new())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Content hash of the raw input this snapshot was loaded from (hex
    /// sha256). Used as the view-cache key component.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Distinct team names, sorted. System entities do not contribute a team.
    pub fn teams(&self) -> Vec<String> {
        let mut teams: Vec<String> = self
            .entities
            .iter()
            .filter(|e| !e.is_system() && !e.provenance.team.is_empty())
            .map(|e| e.provenance.team.clone())
            .collect();
        teams.sort();
        teams.dedup();
        teams
    }

    /// Distinct entity types, sorted. Feeds the viewer's type dropdown.
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.entities.iter().map(|e| e.entity_type.clone()).collect();
        types.sort();
        types.dedup();
        types
    }

    /// Distinct relation types, sorted.
    pub fn relation_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .relations
            .iter()
            .map(|r| r.relation_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

/// The combination of filter selections defining a view.
///
/// An empty team selection means "show nothing", not "show all". `None` type
/// selectors disable the respective filter (the HTTP layer maps the wire
/// sentinel "All" to `None`, so a real type named "All" cannot collide).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(default)]
    pub selected_teams: Vec<String>,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub relation_type: Option<String>,
}

impl FilterConfig {
    pub fn is_searching(&self) -> bool {
        !self.search_term.trim().is_empty()
    }

    /// Canonical, order-independent cache key for this configuration.
    pub fn canonical_key(&self) -> String {
        let mut teams = self.selected_teams.clone();
        teams.sort();
        teams.dedup();
        format!(
            "teams={}|source={}|search={}|etype={}|rtype={}",
            teams.join(","),
            self.data_source.as_str(),
            self.search_term.trim().to_lowercase(),
            self.entity_type.as_deref().unwrap_or(""),
            self.relation_type.as_deref().unwrap_or("")
        )
    }
}

/// Map a wire type selector to the internal optional filter. The sentinel
/// "All" (any case) and the empty string both mean "no filter".
pub fn type_selector(value: Option<&str>) -> Option<String> {
    match value {
        None => None,
        Some(s) if s.is_empty() || s.eq_ignore_ascii_case("all") => None,
        Some(s) => Some(s.to_string()),
    }
}
