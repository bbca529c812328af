//! Independent, composable filter predicates.
//!
//! Each function is total over arbitrary input: unknown teams, kinds or types
//! yield empty or unchanged results, never an error. Predicates narrow a set
//! of entity names against the snapshot; composition order is owned by
//! [`crate::filter::apply`].

use std::collections::HashSet;

use crate::model::{DataSource, Relation, Snapshot, SourceKind};

/// Team filter. An empty selection is an explicit "show nothing" state: it
/// yields the empty set, System entities included. With a non-empty
/// selection, System entities are kept regardless of team ownership.
pub fn filter_by_team<'a>(snapshot: &'a Snapshot, selected_teams: &[String]) -> HashSet<&'a str> {
    if selected_teams.is_empty() {
        return HashSet::new();
    }
    let teams: HashSet<&str> = selected_teams.iter().map(|t| t.as_str()).collect();
    snapshot
        .entities()
        .iter()
        .filter(|e| e.is_system() || teams.contains(e.provenance.team.as_str()))
        .map(|e| e.name.as_str())
        .collect()
}

/// Source filter. Identity under `Combined`; otherwise keeps entities whose
/// stored source kind matches. Classification happened at ingestion, so batch
/// and online are disjoint and their union is the combined set.
pub fn filter_by_source<'a>(
    snapshot: &'a Snapshot,
    kept: HashSet<&'a str>,
    source: DataSource,
) -> HashSet<&'a str> {
    let wanted = match source {
        DataSource::Combined => return kept,
        DataSource::Batch => SourceKind::Batch,
        DataSource::Online => SourceKind::Online,
    };
    kept.into_iter()
        .filter(|name| {
            snapshot
                .get(name)
                .map(|e| e.provenance.source_kind == wanted)
                .unwrap_or(false)
        })
        .collect()
}

/// Free-text search filter. Identity when the term is blank.
///
/// System entities are always retained. Project entities never match directly
/// (they re-enter only through parent retention). Everything else matches on
/// name, entity type, or any observation content, case-insensitively.
pub fn filter_by_search<'a>(
    snapshot: &'a Snapshot,
    kept: HashSet<&'a str>,
    term: &str,
) -> HashSet<&'a str> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return kept;
    }
    kept.into_iter()
        .filter(|name| {
            let Some(entity) = snapshot.get(name) else {
                return false;
            };
            if entity.is_system() {
                return true;
            }
            if entity.is_project() {
                return false;
            }
            entity.name.to_lowercase().contains(&term)
                || entity.entity_type.to_lowercase().contains(&term)
                || entity
                    .observations
                    .iter()
                    .any(|o| o.content.to_lowercase().contains(&term))
        })
        .collect()
}

/// Entity-type filter. Identity when no type is selected, exact match
/// otherwise.
pub fn filter_by_entity_type<'a>(
    snapshot: &'a Snapshot,
    kept: HashSet<&'a str>,
    entity_type: Option<&str>,
) -> HashSet<&'a str> {
    let Some(wanted) = entity_type else {
        return kept;
    };
    kept.into_iter()
        .filter(|name| {
            snapshot
                .get(name)
                .map(|e| e.entity_type == wanted)
                .unwrap_or(false)
        })
        .collect()
}

/// Relation-type filter. Identity when no type is selected, exact match
/// otherwise.
pub fn filter_by_relation_type<'a>(
    relations: &'a [Relation],
    relation_type: Option<&str>,
) -> Vec<&'a Relation> {
    match relation_type {
        None => relations.iter().collect(),
        Some(wanted) => relations
            .iter()
            .filter(|r| r.relation_type == wanted)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Observation, Provenance};

    fn entity(name: &str, entity_type: &str, team: &str, source: SourceKind) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            observations: vec![],
            provenance: Provenance::new(source, team),
        }
    }

    fn snapshot() -> Snapshot {
        let mut pat = entity("Pat1", "Pattern", "coding", SourceKind::Batch);
        pat.observations
            .push(Observation::plain("uses exponential backoff"));
        Snapshot::new(
            vec![
                entity("Sys", "System", "", SourceKind::Batch),
                entity("Proj1", "Project", "coding", SourceKind::Batch),
                pat,
                entity("Task1", "Task", "writing", SourceKind::Online),
            ],
            vec![],
            String::new(),
        )
    }

    fn all<'a>(snapshot: &'a Snapshot) -> HashSet<&'a str> {
        snapshot
            .entities()
            .iter()
            .map(|e| e.name.as_str())
            .collect()
    }

    #[test]
    fn test_empty_team_selection_shows_nothing() {
        let snap = snapshot();
        let kept = filter_by_team(&snap, &[]);
        // Policy: not even System entities survive an empty selection.
        assert!(kept.is_empty());
    }

    #[test]
    fn test_team_filter_keeps_system() {
        let snap = snapshot();
        let kept = filter_by_team(&snap, &["coding".to_string()]);
        assert!(kept.contains("Sys"));
        assert!(kept.contains("Pat1"));
        assert!(kept.contains("Proj1"));
        assert!(!kept.contains("Task1"));
    }

    #[test]
    fn test_team_filter_unknown_team_yields_only_system() {
        let snap = snapshot();
        let kept = filter_by_team(&snap, &["nonexistent".to_string()]);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains("Sys"));
    }

    #[test]
    fn test_source_partition_disjoint_union() {
        let snap = snapshot();
        let batch = filter_by_source(&snap, all(&snap), DataSource::Batch);
        let online = filter_by_source(&snap, all(&snap), DataSource::Online);
        let combined = filter_by_source(&snap, all(&snap), DataSource::Combined);

        assert!(batch.is_disjoint(&online));
        let union: HashSet<&str> = batch.union(&online).copied().collect();
        assert_eq!(union, combined);
        assert_eq!(combined, all(&snap));
    }

    #[test]
    fn test_search_blank_is_identity() {
        let snap = snapshot();
        assert_eq!(filter_by_search(&snap, all(&snap), "  "), all(&snap));
    }

    #[test]
    fn test_search_matches_name_type_and_observations() {
        let snap = snapshot();
        let by_name = filter_by_search(&snap, all(&snap), "pat1");
        assert!(by_name.contains("Pat1"));

        let by_type = filter_by_search(&snap, all(&snap), "task");
        assert!(by_type.contains("Task1"));

        let by_observation = filter_by_search(&snap, all(&snap), "BACKOFF");
        assert!(by_observation.contains("Pat1"));
    }

    #[test]
    fn test_search_always_keeps_system_never_matches_project() {
        let snap = snapshot();
        let kept = filter_by_search(&snap, all(&snap), "proj1");
        // "Proj1" matches the Project's own name, but Projects never match
        // directly; System survives any term.
        assert!(!kept.contains("Proj1"));
        assert!(kept.contains("Sys"));
    }

    #[test]
    fn test_entity_type_filter() {
        let snap = snapshot();
        let kept = filter_by_entity_type(&snap, all(&snap), Some("Pattern"));
        assert_eq!(kept.len(), 1);
        assert!(kept.contains("Pat1"));

        assert_eq!(filter_by_entity_type(&snap, all(&snap), None), all(&snap));
        assert!(filter_by_entity_type(&snap, all(&snap), Some("NoSuchType")).is_empty());
    }

    #[test]
    fn test_relation_type_filter() {
        let relations = vec![
            Relation {
                from: "A".into(),
                to: "B".into(),
                relation_type: "implements".into(),
            },
            Relation {
                from: "B".into(),
                to: "C".into(),
                relation_type: "tracked_by".into(),
            },
        ];
        assert_eq!(filter_by_relation_type(&relations, None).len(), 2);
        let only = filter_by_relation_type(&relations, Some("implements"));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].from, "A");
        assert!(filter_by_relation_type(&relations, Some("unknown")).is_empty());
    }
}
