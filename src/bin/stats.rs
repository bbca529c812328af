use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

use memviz::model::SourceKind;

/// Print entity/relation statistics for an NDJSON export or an export
/// directory.
#[derive(Parser)]
#[command(name = "stats", version, about)]
struct Args {
    /// NDJSON export file or export directory
    input: PathBuf,
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!("\n{}:\n", title);
    println!("{:-<50}", "");
    println!("{:<35} {:>10}", "Name", "Count");
    println!("{:-<50}", "");
    for (name, count) in counts {
        println!("{:<35} {:>10}", name, count);
    }
    println!("{:-<50}", "");
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let (snapshot, report) = if args.input.is_dir() {
        memviz::ingest::load_export_dir(&args.input)?
    } else {
        let content = std::fs::read_to_string(&args.input)?;
        let origin = args
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        memviz::ingest::load_snapshot(&content, &origin)
    };

    println!("\n=== MemViz Export Statistics ===\n");
    println!("Files read:      {}", report.files);
    println!("Entities:        {}", report.entity_count);
    println!("Relations:       {}", report.relation_count);
    println!("Skipped lines:   {}", report.skipped_lines);

    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_team: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    for entity in snapshot.entities() {
        *by_type.entry(entity.entity_type.clone()).or_insert(0) += 1;
        let team = if entity.provenance.team.is_empty() {
            "(none)".to_string()
        } else {
            entity.provenance.team.clone()
        };
        *by_team.entry(team).or_insert(0) += 1;
        let source = match entity.provenance.source_kind {
            SourceKind::Batch => "batch",
            SourceKind::Online => "online",
        };
        *by_source.entry(source.to_string()).or_insert(0) += 1;
    }

    let mut by_relation_type: BTreeMap<String, usize> = BTreeMap::new();
    for relation in snapshot.relations() {
        *by_relation_type
            .entry(relation.relation_type.clone())
            .or_insert(0) += 1;
    }

    print_counts("Entities by type", &by_type);
    print_counts("Entities by team", &by_team);
    print_counts("Entities by source", &by_source);
    print_counts("Relations by type", &by_relation_type);

    // Dangling references matter to the viewer: they silently drop at render.
    let dangling = snapshot
        .relations()
        .iter()
        .filter(|r| !snapshot.contains(&r.from) || !snapshot.contains(&r.to))
        .count();
    if dangling > 0 {
        println!("\nDangling relations (dropped at render): {}", dangling);
    }

    println!();
    Ok(())
}
