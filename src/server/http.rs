use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::ViewerState;
use crate::error::{MemvizError, Result};
use crate::gateway::types::{EntityQuery, NewEntity, NewRelation, RelationQuery, TeamInfo};
use crate::model::{type_selector, DataSource, FilterConfig, Snapshot};
use crate::store::prefs;

/// HTTP viewer server: the API surface the browser front end talks to.
pub struct ViewerServer {
    state: Arc<ViewerState>,
    allowed_origins: Vec<String>,
}

impl ViewerServer {
    pub fn new(state: Arc<ViewerState>, allowed_origins: Vec<String>) -> Self {
        Self {
            state,
            allowed_origins,
        }
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let app = self.create_router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting MemViz server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            let message = if e.kind() == std::io::ErrorKind::AddrInUse {
                format!(
                    "Port {} is already in use. Stop the previous memviz instance or set http_server.port in config.toml.",
                    port
                )
            } else {
                format!("Failed to bind to {}: {}", addr, e)
            };
            MemvizError::Io(std::io::Error::new(std::io::ErrorKind::AddrInUse, message))
        })?;

        axum::serve(listener, app).await.map_err(|e| {
            MemvizError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        // Build CORS layer: restrict when origins are configured, allow Any
        // for local dev otherwise.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/api/config", get(handle_get_config))
            .route("/api/teams", get(handle_get_teams).post(handle_set_teams))
            .route(
                "/api/entities",
                get(handle_get_entities)
                    .post(handle_create_entity)
                    .delete(handle_delete_entity),
            )
            .route(
                "/api/relations",
                get(handle_get_relations).post(handle_create_relation),
            )
            .route("/api/health", get(handle_health))
            .route("/api/graph", post(handle_graph))
            .route("/api/upload", post(handle_upload))
            .route("/api/prefs", get(handle_get_prefs).put(handle_put_prefs))
            .route("/api/whats-new", get(handle_whats_new))
            .route("/api/whats-new/reset", post(handle_whats_new_reset))
            .route("/events", get(handle_events))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(Arc::clone(&self.state))
    }
}

/// Wire form of the filter configuration: the "All" sentinel and a string
/// data source, as the front end sends them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GraphRequest {
    selected_teams: Vec<String>,
    data_source: Option<String>,
    search_term: String,
    entity_type: Option<String>,
    relation_type: Option<String>,
}

impl GraphRequest {
    fn into_filter_config(self) -> Result<FilterConfig> {
        let data_source = match self.data_source.as_deref() {
            None | Some("") => DataSource::Combined,
            Some(s) => s.parse()?,
        };
        Ok(FilterConfig {
            selected_teams: self.selected_teams,
            data_source,
            search_term: self.search_term,
            entity_type: type_selector(self.entity_type.as_deref()),
            relation_type: type_selector(self.relation_type.as_deref()),
        })
    }
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

/// Map core errors onto HTTP statuses: gateway trouble is 502, a missing
/// collaborator 503, bad input 400.
fn to_response(err: MemvizError) -> Response {
    let status = match &err {
        MemvizError::Gateway(_) => StatusCode::BAD_GATEWAY,
        MemvizError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        MemvizError::InvalidInput(_) | MemvizError::Parse(_) => StatusCode::BAD_REQUEST,
        MemvizError::EntityNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err)
}

/// GET /api/config — current preferences plus the view constants the front
/// end needs (zoom clamp, hub threshold).
async fn handle_get_config(State(state): State<Arc<ViewerState>>) -> Response {
    let teams = prefs::selected_teams(&state.db).await.unwrap_or_default();
    let data_source = prefs::data_source(&state.db).await.unwrap_or_default();
    Json(json!({
        "dataSource": data_source.as_str(),
        "knowledgeView": teams,
        "maxZoom": state.max_zoom(),
        "hubDegreeThreshold": state.tuning().hub_degree_threshold,
        "onlineAvailable": state.gateway.is_some(),
    }))
    .into_response()
}

/// Teams visible in a local snapshot, with entity counts, sorted by name.
fn local_teams(snapshot: &Snapshot) -> Vec<TeamInfo> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for entity in snapshot.entities() {
        if entity.is_system() || entity.provenance.team.is_empty() {
            continue;
        }
        *counts.entry(entity.provenance.team.as_str()).or_insert(0) += 1;
    }
    snapshot
        .teams()
        .into_iter()
        .map(|name| {
            let entity_count = counts.get(name.as_str()).copied();
            TeamInfo {
                name,
                display_name: None,
                entity_count,
                last_activity: None,
            }
        })
        .collect()
}

/// GET /api/teams — proxied from the gateway when online, derived from the
/// loaded snapshot otherwise.
async fn handle_get_teams(State(state): State<Arc<ViewerState>>) -> Response {
    if let Some(client) = &state.gateway {
        return match client.list_teams().await {
            Ok(available) => Json(json!({ "available": available })).into_response(),
            Err(e) => to_response(e),
        };
    }
    let available = local_teams(&state.snapshot());
    Json(json!({ "available": available })).into_response()
}

#[derive(Debug, Deserialize)]
struct TeamsUpdate {
    #[serde(default)]
    teams: Vec<String>,
}

/// POST /api/teams — persist the selection; when a gateway is configured,
/// refetch for the new teams. A failed fetch keeps the previous snapshot.
async fn handle_set_teams(
    State(state): State<Arc<ViewerState>>,
    Json(update): Json<TeamsUpdate>,
) -> Response {
    if let Err(e) = prefs::set_selected_teams(&state.db, &update.teams).await {
        return to_response(e);
    }

    if state.gateway.is_some() && !update.teams.is_empty() {
        if let Err(e) = state.refresh_from_gateway(&update.teams).await {
            log::warn!("Team switch fetch failed, keeping previous snapshot: {}", e);
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "success": false, "teams": update.teams, "error": e.to_string() })),
            )
                .into_response();
        }
    }

    Json(json!({ "success": true, "teams": update.teams })).into_response()
}

fn require_gateway(state: &ViewerState) -> std::result::Result<&crate::gateway::QueryClient, Response> {
    state.gateway.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Query service not configured; set gateway.base_url in config.toml",
        )
    })
}

/// GET /api/entities — proxied gateway query.
async fn handle_get_entities(
    State(state): State<Arc<ViewerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let client = match require_gateway(&state) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let query = EntityQuery {
        team: params.get("team").cloned(),
        source: params.get("source").and_then(|s| s.parse().ok()),
        types: params
            .get("types")
            .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default(),
        limit: params.get("limit").and_then(|v| v.parse().ok()),
        offset: params.get("offset").and_then(|v| v.parse().ok()),
        search_term: params.get("searchTerm").cloned(),
    };
    match client.query_entities(&query).await {
        Ok(entities) => Json(json!({ "entities": entities })).into_response(),
        Err(e) => to_response(e),
    }
}

/// GET /api/relations — proxied gateway query.
async fn handle_get_relations(
    State(state): State<Arc<ViewerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let client = match require_gateway(&state) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let query = RelationQuery {
        team: params.get("team").cloned(),
        entity_id: params.get("entityId").cloned(),
    };
    match client.query_relations(&query).await {
        Ok(relations) => Json(json!({ "relations": relations })).into_response(),
        Err(e) => to_response(e),
    }
}

/// POST /api/entities — proxied create (undo path).
async fn handle_create_entity(
    State(state): State<Arc<ViewerState>>,
    Json(entity): Json<NewEntity>,
) -> Response {
    let client = match require_gateway(&state) {
        Ok(c) => c,
        Err(response) => return response,
    };
    match client.create_entity(&entity).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => to_response(e),
    }
}

/// DELETE /api/entities?name=&team=
async fn handle_delete_entity(
    State(state): State<Arc<ViewerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let client = match require_gateway(&state) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let (Some(name), Some(team)) = (params.get("name"), params.get("team")) else {
        return error_response(StatusCode::BAD_REQUEST, "name and team are required");
    };
    match client.delete_entity(name, team).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => to_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRelationRequest {
    from: String,
    to: String,
    relation_type: String,
    #[serde(default)]
    team: Option<String>,
}

/// POST /api/relations — proxied create (undo path).
async fn handle_create_relation(
    State(state): State<Arc<ViewerState>>,
    Json(request): Json<CreateRelationRequest>,
) -> Response {
    let client = match require_gateway(&state) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let mut relation = NewRelation::new(request.from, request.to, request.relation_type);
    relation.team = request.team;
    match client.create_relation(&relation).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => to_response(e),
    }
}

/// GET /api/health — own state plus collaborator reachability. A loaded-but-
/// empty snapshot, a missing gateway and an unreachable gateway all render
/// differently.
async fn handle_health(State(state): State<Arc<ViewerState>>) -> Response {
    let snapshot = state.snapshot();
    let storage = prefs::storage_ok(&state.db).await;

    let gateway = match &state.gateway {
        None => json!({ "status": "unconfigured" }),
        Some(client) => match client.health().await {
            Ok(health) => serde_json::to_value(&health).unwrap_or_else(|_| json!({})),
            Err(e) => json!({ "status": "unreachable", "error": e.to_string() }),
        },
    };

    Json(json!({
        "status": "ok",
        "storage": storage,
        "snapshot": {
            "hash": snapshot.content_hash(),
            "entities": snapshot.entity_count(),
            "relations": snapshot.relation_count(),
            "loadedAt": snapshot.loaded_at().to_rfc3339(),
        },
        "gateway": gateway,
    }))
    .into_response()
}

/// POST /api/graph — the core endpoint: filter config in, render graph out.
async fn handle_graph(
    State(state): State<Arc<ViewerState>>,
    Json(request): Json<GraphRequest>,
) -> Response {
    let config = match request.into_filter_config() {
        Ok(c) => c,
        Err(e) => return to_response(e),
    };
    let graph = state.graph_for(&config);
    Json(&*graph).into_response()
}

/// POST /api/upload — NDJSON body replaces the snapshot.
async fn handle_upload(State(state): State<Arc<ViewerState>>, body: String) -> Response {
    let (snapshot, report) = crate::ingest::load_snapshot(&body, "upload");
    state.install_snapshot(snapshot);
    Json(report).into_response()
}

/// GET /api/prefs
async fn handle_get_prefs(State(state): State<Arc<ViewerState>>) -> Response {
    match prefs::all_prefs(&state.db).await {
        Ok(all) => Json(all).into_response(),
        Err(e) => to_response(e),
    }
}

/// PUT /api/prefs — upsert the given keys.
async fn handle_put_prefs(
    State(state): State<Arc<ViewerState>>,
    Json(update): Json<HashMap<String, String>>,
) -> Response {
    for (key, value) in &update {
        if let Err(e) = prefs::set_pref(&state.db, key, value).await {
            return to_response(e);
        }
    }
    Json(json!({ "success": true })).into_response()
}

/// GET /api/whats-new — baseline diff badges.
async fn handle_whats_new(State(state): State<Arc<ViewerState>>) -> Response {
    let snapshot = state.snapshot();
    match crate::store::diff_baseline(&state.db, &snapshot).await {
        Ok(diff) => Json(diff).into_response(),
        Err(e) => to_response(e),
    }
}

/// POST /api/whats-new/reset — record the current snapshot as the baseline.
async fn handle_whats_new_reset(State(state): State<Arc<ViewerState>>) -> Response {
    let snapshot = state.snapshot();
    match crate::store::record_baseline(&state.db, &snapshot).await {
        Ok(recorded) => Json(json!({ "recorded": recorded })).into_response(),
        Err(e) => to_response(e),
    }
}

/// GET /events — SSE stream emitting a `reload` event on every snapshot swap.
async fn handle_events(
    State(state): State<Arc<ViewerState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|event| async move { event.ok() })
        .map(|event| {
            Ok(Event::default()
                .event("reload")
                .data(event.snapshot_hash))
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Provenance, SourceKind};

    #[test]
    fn test_graph_request_maps_all_sentinel() {
        let request: GraphRequest = serde_json::from_str(
            r#"{"selectedTeams":["coding"],"dataSource":"batch","entityType":"All","relationType":"implements"}"#,
        )
        .unwrap();
        let config = request.into_filter_config().unwrap();
        assert_eq!(config.selected_teams, vec!["coding"]);
        assert_eq!(config.data_source, DataSource::Batch);
        assert_eq!(config.entity_type, None);
        assert_eq!(config.relation_type, Some("implements".to_string()));
    }

    #[test]
    fn test_graph_request_defaults() {
        let request: GraphRequest = serde_json::from_str("{}").unwrap();
        let config = request.into_filter_config().unwrap();
        assert!(config.selected_teams.is_empty());
        assert_eq!(config.data_source, DataSource::Combined);
        assert!(!config.is_searching());
    }

    #[test]
    fn test_graph_request_rejects_unknown_source() {
        let request: GraphRequest =
            serde_json::from_str(r#"{"dataSource":"wibble"}"#).unwrap();
        assert!(request.into_filter_config().is_err());
    }

    #[test]
    fn test_local_teams_counts_and_sorts() {
        let snapshot = Snapshot::new(
            vec![
                Entity {
                    name: "A".into(),
                    entity_type: "Pattern".into(),
                    observations: vec![],
                    provenance: Provenance::new(SourceKind::Batch, "writing"),
                },
                Entity {
                    name: "B".into(),
                    entity_type: "Pattern".into(),
                    observations: vec![],
                    provenance: Provenance::new(SourceKind::Batch, "coding"),
                },
                Entity {
                    name: "C".into(),
                    entity_type: "Task".into(),
                    observations: vec![],
                    provenance: Provenance::new(SourceKind::Batch, "coding"),
                },
                Entity {
                    name: "Sys".into(),
                    entity_type: "System".into(),
                    observations: vec![],
                    provenance: Provenance::new(SourceKind::Batch, ""),
                },
            ],
            vec![],
            String::new(),
        );
        let teams = local_teams(&snapshot);
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].name, "coding");
        assert_eq!(teams[0].entity_count, Some(2));
        assert_eq!(teams[1].name, "writing");
        assert_eq!(teams[1].entity_count, Some(1));
    }

    #[test]
    fn test_error_mapping() {
        let response = to_response(MemvizError::Gateway("down".into()));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = to_response(MemvizError::Config("missing".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = to_response(MemvizError::InvalidInput("bad".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
