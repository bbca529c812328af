use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use memviz::gateway::QueryClient;
use memviz::server::{ViewerServer, ViewerState};
use memviz::store::{migrate, prefs, Db};
use memviz::Config;

/// Build the query-service client when a base URL is configured.
fn build_gateway(config: &Config) -> Result<Option<QueryClient>> {
    let Some(base_url) = &config.gateway.base_url else {
        return Ok(None);
    };
    let client = QueryClient::new(
        base_url,
        Duration::from_secs(config.gateway.timeout_secs),
        config.gateway.max_retries,
    )?;
    Ok(Some(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => {
            run_server().await?;
        }
        "verify" | _ => {
            // Default: verify configuration, store and data sources
            run_verification().await?;
        }
    }

    Ok(())
}

/// Run the viewer HTTP server
async fn run_server() -> Result<()> {
    log::info!("Starting MemViz server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;
    log::info!("Store initialized successfully");

    let gateway = build_gateway(&config)?;
    let state = Arc::new(ViewerState::new(&config, db, gateway));

    // Seed the snapshot: batch exports first, then the gateway for the
    // remembered team selection. A failed seed still starts the server; the
    // health endpoint reports the empty state.
    if state.export_dir().is_some() {
        if let Err(e) = state.reload_from_exports().await {
            log::warn!("Initial export load failed: {}", e);
        }
    }
    if state.snapshot().is_empty() && state.gateway.is_some() {
        let teams = prefs::selected_teams(&state.db).await.unwrap_or_default();
        if !teams.is_empty() {
            if let Err(e) = state.refresh_from_gateway(&teams).await {
                log::warn!("Initial gateway fetch failed: {}", e);
            }
        }
    }

    if config.watch.enabled && state.export_dir().is_some() {
        let watch_state = Arc::clone(&state);
        let debounce_ms = config.watch.debounce_ms;
        tokio::spawn(async move {
            if let Err(e) = memviz::watch::run_watcher(watch_state, debounce_ms).await {
                log::error!("Watcher exited: {}", e);
            }
        });
    }

    let server = ViewerServer::new(
        Arc::clone(&state),
        config.http_server.allowed_origins.clone(),
    );
    server.run(config.http_server.port).await?;

    Ok(())
}

/// Verify configuration, store schema and data source reachability
async fn run_verification() -> Result<()> {
    log::info!("Starting MemViz v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    if let Some(dir) = config.export_dir() {
        log::info!("Export dir: {}", dir.display());
    }
    log::info!("Store path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    db.with_connection(migrate::run_migrations).await?;
    verify_store_schema(&db).await?;

    if let Some(dir) = config.export_dir() {
        let (snapshot, report) = memviz::ingest::load_export_dir(dir)?;
        log::info!(
            "Export load: {} entities, {} relations from {} files ({} lines skipped)",
            report.entity_count,
            report.relation_count,
            report.files,
            report.skipped_lines
        );
        let teams = snapshot.teams();
        if teams.is_empty() {
            log::warn!("No teams found in export data");
        } else {
            log::info!("Teams: {}", teams.join(", "));
        }
    }

    if let Some(client) = build_gateway(&config)? {
        match client.health().await {
            Ok(health) => log::info!(
                "Gateway health: {} (storage={}, graph={})",
                health.status,
                health.storage,
                health.graph
            ),
            Err(e) => log::warn!("Gateway unreachable: {}", e),
        }
    } else {
        log::info!("No gateway configured; online mode disabled");
    }

    log::info!("Verification complete; run `memviz serve` to start the viewer");
    Ok(())
}

/// Verify that all expected store tables exist
async fn verify_store_schema(db: &Db) -> Result<()> {
    use memviz::error::MemvizError;

    db.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        for table in ["prefs", "baseline", "schema_migrations"] {
            if !tables.iter().any(|t| t == table) {
                return Err(MemvizError::Config(format!("Missing table: {}", table)));
            }
            log::debug!("✓ Table exists: {}", table);
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(MemvizError::Config(format!(
                "Journal mode is not WAL: {}",
                journal_mode
            )));
        }
        log::debug!("✓ Journal mode: WAL");

        Ok(())
    })
    .await?;

    log::info!("✓ Store schema verification complete");
    Ok(())
}
