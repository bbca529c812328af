//! Connectivity preservation: hub retention, parent retention, isolated-node
//! pruning.
//!
//! These rules trade filter precision for visual coherence (or, while
//! searching, the other way around). Each pass computes its additions against
//! a frozen base set, so results do not depend on relation iteration order.

use std::collections::{HashMap, HashSet};

use crate::model::{Relation, Snapshot};

/// One-hop closure: for every relation with exactly one endpoint in `kept`,
/// the other endpoint is added, provided it exists in the snapshot. Membership
/// is tested against the incoming set only, so the closure is a single hop.
pub fn expand_one_hop<'a>(snapshot: &'a Snapshot, kept: &HashSet<&'a str>) -> HashSet<&'a str> {
    let mut result = kept.clone();
    for relation in snapshot.relations() {
        let from_in = kept.contains(relation.from.as_str());
        let to_in = kept.contains(relation.to.as_str());
        if from_in == to_in {
            continue;
        }
        let other = if from_in {
            relation.to.as_str()
        } else {
            relation.from.as_str()
        };
        if snapshot.contains(other) {
            result.insert(other);
        }
    }
    result
}

/// Hub retention, applied when not searching: the one-hop closure, then a
/// second pass adding every still-excluded entity whose degree over the full
/// relation set reaches `hub_degree_threshold` and that touches the closed
/// set through at least one relation.
pub fn expand_hubs<'a>(
    snapshot: &'a Snapshot,
    kept: HashSet<&'a str>,
    hub_degree_threshold: usize,
) -> HashSet<&'a str> {
    let base = expand_one_hop(snapshot, &kept);

    // Degree over the FULL unfiltered relation set.
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for relation in snapshot.relations() {
        *degree.entry(relation.from.as_str()).or_insert(0) += 1;
        *degree.entry(relation.to.as_str()).or_insert(0) += 1;
    }

    let mut result = base.clone();
    for relation in snapshot.relations() {
        let from_in = base.contains(relation.from.as_str());
        let to_in = base.contains(relation.to.as_str());
        if from_in == to_in {
            continue;
        }
        let candidate = if from_in {
            relation.to.as_str()
        } else {
            relation.from.as_str()
        };
        if !snapshot.contains(candidate) {
            continue;
        }
        if degree.get(candidate).copied().unwrap_or(0) >= hub_degree_threshold {
            result.insert(candidate);
        }
    }
    result
}

/// Parent retention, applied when searching: only Project entities one hop
/// from a retained non-System entity are pulled in. The broad hub rule stays
/// suppressed so search results remain focused.
pub fn retain_referenced_projects<'a>(
    snapshot: &'a Snapshot,
    kept: HashSet<&'a str>,
) -> HashSet<&'a str> {
    let mut additions: HashSet<&str> = HashSet::new();
    for relation in snapshot.relations() {
        collect_project_endpoint(snapshot, &kept, &relation.from, &relation.to, &mut additions);
        collect_project_endpoint(snapshot, &kept, &relation.to, &relation.from, &mut additions);
    }
    let mut result = kept;
    result.extend(additions);
    result
}

fn collect_project_endpoint<'a>(
    snapshot: &'a Snapshot,
    kept: &HashSet<&'a str>,
    anchor: &str,
    candidate: &'a str,
    additions: &mut HashSet<&'a str>,
) {
    if kept.contains(candidate) {
        return;
    }
    let Some(anchor_entity) = snapshot.get(anchor) else {
        return;
    };
    if !kept.contains(anchor) || anchor_entity.is_system() {
        return;
    }
    if snapshot.get(candidate).map(|e| e.is_project()).unwrap_or(false) {
        additions.insert(candidate);
    }
}

/// Post relation-type-filter pruning: drop entities with no incident relation
/// whose both endpoints survive. Only invoked when a specific relation type
/// is selected and actually removed relations; under "all types",
/// relation-less entities stay visible.
pub fn prune_isolated<'a>(kept: HashSet<&'a str>, relations: &[&Relation]) -> HashSet<&'a str> {
    let mut connected: HashSet<&str> = HashSet::new();
    for relation in relations {
        if kept.contains(relation.from.as_str()) && kept.contains(relation.to.as_str()) {
            connected.insert(relation.from.as_str());
            connected.insert(relation.to.as_str());
        }
    }
    kept.into_iter()
        .filter(|name| connected.contains(name))
        .collect()
}
