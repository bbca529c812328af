//! Source-kind classification, applied exactly once at ingestion.
//!
//! Downstream filters read the stored `SourceKind`; nothing re-derives it from
//! origin strings ad hoc.

use crate::model::SourceKind;

/// Filename marker of manually curated shared exports, e.g.
/// `shared-memory-coding.json`.
pub const BATCH_ORIGIN_MARKER: &str = "shared-memory-";

/// Origin / metadata tags that mark an entity as coming from the live query
/// service.
const ONLINE_MARKERS: [&str; 3] = ["database", "graphdb", "online"];

/// Classify an entity's source.
///
/// An explicit per-record tag wins. Otherwise the origin tag decides: the
/// shared-export marker (or the absence of any online marker) means batch,
/// a live-service tag means online.
pub fn classify_source(origin: &str, explicit: Option<&str>) -> SourceKind {
    if let Some(tag) = explicit {
        let tag = tag.to_ascii_lowercase();
        if ONLINE_MARKERS.iter().any(|m| tag == *m) {
            return SourceKind::Online;
        }
        return SourceKind::Batch;
    }

    let origin = origin.to_ascii_lowercase();
    if origin.starts_with(BATCH_ORIGIN_MARKER) {
        return SourceKind::Batch;
    }
    if ONLINE_MARKERS.iter().any(|m| origin.contains(m)) {
        return SourceKind::Online;
    }
    SourceKind::Batch
}

/// Derive the owning team from a shared-export origin tag
/// (`shared-memory-coding` -> `coding`).
pub fn team_from_origin(origin: &str) -> Option<String> {
    origin
        .strip_prefix(BATCH_ORIGIN_MARKER)
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.to_string())
}
