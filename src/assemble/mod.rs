//! Graph assembly: joins the filtered entity set with the filtered relation
//! set into a renderable node/edge list.
//!
//! Every call produces fresh node copies with their own layout scratch, so
//! layout-engine mutations never leak back into the snapshot. Dangling
//! relations are dropped, duplicate (from, to, type) triples collapse into
//! one edge carrying a multiplicity count, and malformed records are skipped
//! and counted rather than aborting the render.

use serde::Serialize;
use std::collections::HashMap;

use crate::filter::{self, ViewTuning, VisibleGraph};
use crate::model::{FilterConfig, Observation, Snapshot, SourceKind};

/// A node handed to the layout engine. `id` equals the entity name so
/// selection-by-name survives re-renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: String,
    pub entity_type: String,
    pub team: String,
    pub source_kind: SourceKind,
    pub observations: Vec<Observation>,
    /// Rendered edge endpoints touching this node (duplicates included), for
    /// node sizing.
    pub degree: usize,
    /// Layout position scratch, owned by this render copy.
    pub x: f64,
    pub y: f64,
}

/// A rendered edge. Endpoint indices into the node list are pre-resolved so
/// the layout engine never does its own name lookups.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    pub source: String,
    pub target: String,
    pub source_index: usize,
    pub target_index: usize,
    pub relation_type: String,
    /// How many identical (from, to, type) triples this edge stands for.
    pub multiplicity: usize,
}

/// Skip counters, observable for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembleStats {
    pub skipped_entities: usize,
    pub skipped_relations: usize,
    pub dropped_dangling: usize,
}

/// The assembled graph, ready for layout. Nodes are sorted by id and edges by
/// (source, target, type), so identical inputs serialize byte-identically.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderGraph {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    pub stats: AssembleStats,
}

/// Assemble the visible subgraph into nodes and edges.
pub fn assemble(snapshot: &Snapshot, visible: &VisibleGraph) -> RenderGraph {
    let mut stats = AssembleStats::default();

    let mut nodes: Vec<RenderNode> = Vec::with_capacity(visible.entity_names.len());
    let mut node_index: HashMap<&str, usize> = HashMap::with_capacity(visible.entity_names.len());
    for name in &visible.entity_names {
        let Some(entity) = snapshot.get(name) else {
            stats.skipped_entities += 1;
            continue;
        };
        if entity.name.is_empty() {
            stats.skipped_entities += 1;
            continue;
        }
        node_index.insert(name.as_str(), nodes.len());
        nodes.push(RenderNode {
            id: entity.name.clone(),
            entity_type: entity.entity_type.clone(),
            team: entity.provenance.team.clone(),
            source_kind: entity.provenance.source_kind,
            observations: entity.observations.clone(),
            degree: 0,
            x: 0.0,
            y: 0.0,
        });
    }

    // Collapse duplicate triples while counting them.
    let mut edge_slots: HashMap<(&str, &str, &str), usize> = HashMap::new();
    let mut edges: Vec<RenderEdge> = Vec::new();
    for relation in &visible.relations {
        if relation.from.is_empty() || relation.to.is_empty() || relation.relation_type.is_empty() {
            stats.skipped_relations += 1;
            continue;
        }
        let (Some(&source_index), Some(&target_index)) = (
            node_index.get(relation.from.as_str()),
            node_index.get(relation.to.as_str()),
        ) else {
            stats.dropped_dangling += 1;
            continue;
        };

        let key = (
            relation.from.as_str(),
            relation.to.as_str(),
            relation.relation_type.as_str(),
        );
        match edge_slots.get(&key) {
            Some(&slot) => edges[slot].multiplicity += 1,
            None => {
                edge_slots.insert(key, edges.len());
                edges.push(RenderEdge {
                    source: relation.from.clone(),
                    target: relation.to.clone(),
                    source_index,
                    target_index,
                    relation_type: relation.relation_type.clone(),
                    multiplicity: 1,
                });
            }
        }
    }

    edges.sort_by(|a, b| {
        (&a.source, &a.target, &a.relation_type).cmp(&(&b.source, &b.target, &b.relation_type))
    });

    for edge in &edges {
        nodes[edge.source_index].degree += edge.multiplicity;
        nodes[edge.target_index].degree += edge.multiplicity;
    }

    RenderGraph {
        nodes,
        edges,
        stats,
    }
}

/// Filter and assemble in one call: the full (snapshot, config) -> render
/// graph projection.
pub fn project(snapshot: &Snapshot, config: &FilterConfig, tuning: &ViewTuning) -> RenderGraph {
    let visible = filter::apply(snapshot, config, tuning);
    assemble(snapshot, &visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataSource, Entity, Provenance, Relation};

    fn entity(name: &str, entity_type: &str, team: &str) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            observations: vec![],
            provenance: Provenance::new(SourceKind::Batch, team),
        }
    }

    fn relation(from: &str, to: &str, relation_type: &str) -> Relation {
        Relation {
            from: from.to_string(),
            to: to.to_string(),
            relation_type: relation_type.to_string(),
        }
    }

    fn visible(names: &[&str], relations: Vec<Relation>) -> VisibleGraph {
        let mut entity_names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        entity_names.sort();
        VisibleGraph {
            entity_names,
            relations,
        }
    }

    #[test]
    fn test_dangling_relations_dropped_silently() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding")],
            vec![],
            String::new(),
        );
        let graph = assemble(
            &snapshot,
            &visible(&["A"], vec![relation("A", "Ghost", "uses")]),
        );
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.stats.dropped_dangling, 1);
    }

    #[test]
    fn test_duplicate_triples_collapse_with_multiplicity() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding"), entity("B", "Task", "coding")],
            vec![],
            String::new(),
        );
        let graph = assemble(
            &snapshot,
            &visible(
                &["A", "B"],
                vec![
                    relation("A", "B", "uses"),
                    relation("A", "B", "uses"),
                    relation("A", "B", "implements"),
                ],
            ),
        );
        assert_eq!(graph.edges.len(), 2);
        let uses = graph
            .edges
            .iter()
            .find(|e| e.relation_type == "uses")
            .unwrap();
        assert_eq!(uses.multiplicity, 2);
        let implements = graph
            .edges
            .iter()
            .find(|e| e.relation_type == "implements")
            .unwrap();
        assert_eq!(implements.multiplicity, 1);
    }

    #[test]
    fn test_edge_indices_resolve_to_nodes() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding"), entity("B", "Task", "coding")],
            vec![],
            String::new(),
        );
        let graph = assemble(
            &snapshot,
            &visible(&["A", "B"], vec![relation("B", "A", "uses")]),
        );
        let edge = &graph.edges[0];
        assert_eq!(graph.nodes[edge.source_index].id, "B");
        assert_eq!(graph.nodes[edge.target_index].id, "A");
    }

    #[test]
    fn test_degree_counts_multiplicity() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding"), entity("B", "Task", "coding")],
            vec![],
            String::new(),
        );
        let graph = assemble(
            &snapshot,
            &visible(
                &["A", "B"],
                vec![relation("A", "B", "uses"), relation("A", "B", "uses")],
            ),
        );
        assert_eq!(graph.nodes.iter().find(|n| n.id == "A").unwrap().degree, 2);
    }

    #[test]
    fn test_malformed_relation_skipped_and_counted() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding")],
            vec![],
            String::new(),
        );
        let graph = assemble(
            &snapshot,
            &visible(&["A"], vec![relation("", "A", "uses"), relation("A", "A", "")]),
        );
        assert!(graph.edges.is_empty());
        assert_eq!(graph.stats.skipped_relations, 2);
    }

    #[test]
    fn test_unknown_visible_name_skipped_and_counted() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding")],
            vec![],
            String::new(),
        );
        let graph = assemble(&snapshot, &visible(&["A", "Phantom"], vec![]));
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.stats.skipped_entities, 1);
    }

    #[test]
    fn test_render_copies_own_their_data() {
        let snapshot = Snapshot::new(
            vec![entity("A", "Pattern", "coding")],
            vec![],
            String::new(),
        );
        let v = visible(&["A"], vec![]);
        let mut graph = assemble(&snapshot, &v);
        // Simulate the layout engine mutating positions in place.
        graph.nodes[0].x = 42.0;
        graph.nodes[0].y = -7.5;

        let again = assemble(&snapshot, &v);
        assert_eq!(again.nodes[0].x, 0.0);
        assert_eq!(again.nodes[0].y, 0.0);
    }

    #[test]
    fn test_project_end_to_end_scenario() {
        let snapshot = Snapshot::new(
            vec![
                entity("Sys", "System", ""),
                entity("Proj1", "Project", "coding"),
                entity("Pat1", "Pattern", "coding"),
            ],
            vec![
                relation("Pat1", "Proj1", "implements"),
                relation("Pat1", "Sys", "tracked_by"),
            ],
            String::new(),
        );
        let config = FilterConfig {
            selected_teams: vec!["coding".to_string()],
            data_source: DataSource::Batch,
            ..Default::default()
        };
        let graph = project(&snapshot, &config, &ViewTuning::default());
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Pat1", "Proj1", "Sys"]);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.stats, AssembleStats::default());
    }

    #[test]
    fn test_output_order_deterministic() {
        let snapshot = Snapshot::new(
            vec![
                entity("C", "Task", "coding"),
                entity("A", "Pattern", "coding"),
                entity("B", "Task", "coding"),
            ],
            vec![],
            String::new(),
        );
        let v = visible(
            &["C", "A", "B"],
            vec![relation("C", "A", "uses"), relation("B", "A", "uses")],
        );
        let graph = assemble(&snapshot, &v);
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(graph.edges[0].source, "B");
        assert_eq!(graph.edges[1].source, "C");
    }
}
