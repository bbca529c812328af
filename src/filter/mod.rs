//! The filtering pipeline: projects a snapshot through a `FilterConfig` into
//! the visible subgraph.
//!
//! Fixed application order: team, source, search (with parent retention),
//! entity type, hub retention (only when not searching), relation type (with
//! isolated-node pruning). The whole pipeline is a pure function of
//! (snapshot, config, tuning); re-running it on identical inputs yields an
//! identical, sorted result.

pub mod connectivity;
pub mod predicates;

pub use connectivity::{expand_hubs, expand_one_hop, prune_isolated, retain_referenced_projects};
pub use predicates::{
    filter_by_entity_type, filter_by_relation_type, filter_by_search, filter_by_source,
    filter_by_team,
};

use serde::Deserialize;

use crate::model::{FilterConfig, Relation, Snapshot};

/// Default hub-preservation degree threshold.
pub const DEFAULT_HUB_DEGREE_THRESHOLD: usize = 3;

/// Presentation-tuning knobs that affect which nodes survive filtering.
/// Exposed as configuration rather than hardcoded.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewTuning {
    #[serde(default = "default_hub_degree_threshold")]
    pub hub_degree_threshold: usize,
}

fn default_hub_degree_threshold() -> usize {
    DEFAULT_HUB_DEGREE_THRESHOLD
}

impl Default for ViewTuning {
    fn default() -> Self {
        Self {
            hub_degree_threshold: DEFAULT_HUB_DEGREE_THRESHOLD,
        }
    }
}

/// The filtered subgraph: surviving entity names (sorted) and surviving
/// relations in snapshot order. Relations may still reference entities
/// outside `entity_names`; assembly drops those.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleGraph {
    pub entity_names: Vec<String>,
    pub relations: Vec<Relation>,
}

impl VisibleGraph {
    pub fn contains(&self, name: &str) -> bool {
        self.entity_names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }
}

/// Apply the full filter pipeline.
pub fn apply(snapshot: &Snapshot, config: &FilterConfig, tuning: &ViewTuning) -> VisibleGraph {
    let mut kept = predicates::filter_by_team(snapshot, &config.selected_teams);
    kept = predicates::filter_by_source(snapshot, kept, config.data_source);

    let searching = config.is_searching();
    if searching {
        kept = predicates::filter_by_search(snapshot, kept, &config.search_term);
        kept = connectivity::retain_referenced_projects(snapshot, kept);
    }

    kept = predicates::filter_by_entity_type(snapshot, kept, config.entity_type.as_deref());

    if !searching {
        kept = connectivity::expand_hubs(snapshot, kept, tuning.hub_degree_threshold);
    }

    let filtered_relations =
        predicates::filter_by_relation_type(snapshot.relations(), config.relation_type.as_deref());

    // Isolated-node pruning only fires when the type filter actually removed
    // relations; under "all types" unconnected entities stay visible.
    if config.relation_type.is_some() && filtered_relations.len() < snapshot.relation_count() {
        kept = connectivity::prune_isolated(kept, &filtered_relations);
    }

    let mut entity_names: Vec<String> = kept.into_iter().map(|n| n.to_string()).collect();
    entity_names.sort();

    VisibleGraph {
        entity_names,
        relations: filtered_relations.into_iter().cloned().collect(),
    }
}
