//! Structured observation extraction (regex-based).
//!
//! Export files store observations as plain strings; many follow the
//! `[kind] content (YYYY-MM-DD)` convention. The kind marker and trailing
//! date are lifted into the `Observation` fields, everything else is kept
//! verbatim as content.

use regex::Regex;
use std::sync::OnceLock;

use crate::model::Observation;

fn kind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[([^\]]+)\]\s*(.*)$").expect("Invalid regex pattern"))
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*?)\s*\((\d{4}-\d{2}-\d{2})\)\s*$").expect("Invalid regex pattern")
    })
}

/// Decompose a plain observation string into content, kind and date.
pub fn parse_observation(raw: &str) -> Observation {
    let mut kind = None;
    let mut rest = raw.trim();

    if let Some(cap) = kind_regex().captures(rest) {
        kind = Some(cap.get(1).unwrap().as_str().trim().to_string());
        rest = cap.get(2).unwrap().as_str();
    }

    let mut date = None;
    let mut content = rest.to_string();
    if let Some(cap) = date_regex().captures(rest) {
        date = Some(cap.get(2).unwrap().as_str().to_string());
        content = cap.get(1).unwrap().as_str().to_string();
    }

    // A marker with no body is more useful kept verbatim.
    if content.trim().is_empty() {
        return Observation::plain(raw.trim());
    }

    Observation {
        content,
        kind,
        date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let obs = parse_observation("uses token bucket rate limiting");
        assert_eq!(obs.content, "uses token bucket rate limiting");
        assert!(obs.kind.is_none());
        assert!(obs.date.is_none());
    }

    #[test]
    fn test_kind_marker_extracted() {
        let obs = parse_observation("[decision] switched to WAL mode");
        assert_eq!(obs.kind.as_deref(), Some("decision"));
        assert_eq!(obs.content, "switched to WAL mode");
    }

    #[test]
    fn test_trailing_date_extracted() {
        let obs = parse_observation("migrated the schema (2025-03-14)");
        assert_eq!(obs.date.as_deref(), Some("2025-03-14"));
        assert_eq!(obs.content, "migrated the schema");
    }

    #[test]
    fn test_kind_and_date_together() {
        let obs = parse_observation("[learning] prefer batch upserts (2025-01-02)");
        assert_eq!(obs.kind.as_deref(), Some("learning"));
        assert_eq!(obs.date.as_deref(), Some("2025-01-02"));
        assert_eq!(obs.content, "prefer batch upserts");
    }

    #[test]
    fn test_non_date_parens_kept_in_content() {
        let obs = parse_observation("wraps rusqlite (bundled feature)");
        assert!(obs.date.is_none());
        assert_eq!(obs.content, "wraps rusqlite (bundled feature)");
    }

    #[test]
    fn test_marker_only_kept_verbatim() {
        let obs = parse_observation("[decision]");
        assert_eq!(obs.content, "[decision]");
        assert!(obs.kind.is_none());
    }
}
