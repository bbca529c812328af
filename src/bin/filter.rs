use clap::Parser;
use std::path::PathBuf;

use memviz::filter::ViewTuning;
use memviz::model::{type_selector, DataSource, FilterConfig};

/// Apply the viewer filter pipeline to an NDJSON export and print the
/// assembled graph as JSON.
#[derive(Parser)]
#[command(name = "filter", version, about)]
struct Args {
    /// NDJSON export file
    input: PathBuf,

    /// Team to include (repeatable). No teams means an empty graph.
    #[arg(short = 't', long = "team")]
    teams: Vec<String>,

    /// Data source: batch, online or combined
    #[arg(long, default_value = "combined")]
    source: String,

    /// Case-insensitive search term
    #[arg(long, default_value = "")]
    search: String,

    /// Entity type to keep ("All" disables the filter)
    #[arg(long)]
    entity_type: Option<String>,

    /// Relation type to keep ("All" disables the filter)
    #[arg(long)]
    relation_type: Option<String>,

    /// Hub preservation degree threshold
    #[arg(long, default_value_t = memviz::filter::DEFAULT_HUB_DEGREE_THRESHOLD)]
    hub_degree_threshold: usize,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let content = std::fs::read_to_string(&args.input)?;
    let origin = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload")
        .to_string();
    let (snapshot, report) = memviz::ingest::load_snapshot(&content, &origin);
    if report.skipped_lines > 0 {
        eprintln!("warning: skipped {} malformed lines", report.skipped_lines);
    }

    let config = FilterConfig {
        selected_teams: args.teams,
        data_source: args.source.parse::<DataSource>()?,
        search_term: args.search,
        entity_type: type_selector(args.entity_type.as_deref()),
        relation_type: type_selector(args.relation_type.as_deref()),
    };
    let tuning = ViewTuning {
        hub_degree_threshold: args.hub_degree_threshold,
    };

    let graph = memviz::project(&snapshot, &config, &tuning);

    let output = if args.pretty {
        serde_json::to_string_pretty(&graph)?
    } else {
        serde_json::to_string(&graph)?
    };
    println!("{}", output);

    Ok(())
}
