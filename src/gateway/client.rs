use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::types::*;
use crate::error::{MemvizError, Result};
use crate::ingest;
use crate::model::{Relation, Snapshot};

/// Client for the remote query service.
///
/// All calls are fallible I/O: network errors, non-2xx statuses and bad
/// payloads surface as `MemvizError::Gateway`, distinct from an empty result.
/// Transient failures (429, 5xx, timeouts) are retried with exponential
/// backoff.
pub struct QueryClient {
    client: Client,
    base_url: Url,
    max_retries: usize,
}

/// GET /api/entities payload; the service wraps the array, older versions
/// return it bare.
#[derive(Deserialize)]
#[serde(untagged)]
enum EntitiesResponse {
    Wrapped { entities: Vec<WireEntity> },
    Bare(Vec<WireEntity>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelationsResponse {
    Wrapped { relations: Vec<WireRelation> },
    Bare(Vec<WireRelation>),
}

impl QueryClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration, max_retries: usize) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MemvizError::Config(format!("Invalid gateway base URL: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemvizError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            max_retries,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MemvizError::Config(format!("Invalid gateway endpoint {}: {}", path, e)))
    }

    fn retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut attempt = 0;
        let mut delay = Duration::from_millis(500);

        loop {
            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| {
                            MemvizError::Gateway(format!(
                                "Failed to parse response from {}: {}",
                                url, e
                            ))
                        });
                    }
                    if Self::retryable_status(status) && attempt < self.max_retries {
                        log::warn!(
                            "Retry {}/{} after status {} from {}",
                            attempt + 1,
                            self.max_retries,
                            status,
                            url
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        attempt += 1;
                        continue;
                    }
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read error response".to_string());
                    return Err(MemvizError::Gateway(format!(
                        "Query service error {}: {}",
                        status, body
                    )));
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries => {
                    log::warn!(
                        "Retry {}/{} after network error: {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(MemvizError::Gateway(format!("Network error: {}", e))),
            }
        }
    }

    async fn check_ok(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(MemvizError::Gateway(format!(
            "Query service error {}: {}",
            status, body
        )))
    }

    /// GET /api/teams
    pub async fn list_teams(&self) -> Result<Vec<TeamInfo>> {
        let url = self.endpoint("/api/teams")?;
        let response: TeamsResponse = self.get_json(url).await?;
        Ok(response.available)
    }

    /// GET /api/entities
    pub async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<WireEntity>> {
        let mut url = self.endpoint("/api/entities")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(team) = &query.team {
                pairs.append_pair("team", team);
            }
            if let Some(source) = query.source {
                pairs.append_pair("source", source.as_str());
            }
            if !query.types.is_empty() {
                pairs.append_pair("types", &query.types.join(","));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = query.offset {
                pairs.append_pair("offset", &offset.to_string());
            }
            if let Some(term) = &query.search_term {
                pairs.append_pair("searchTerm", term);
            }
        }
        let response: EntitiesResponse = self.get_json(url).await?;
        Ok(match response {
            EntitiesResponse::Wrapped { entities } => entities,
            EntitiesResponse::Bare(entities) => entities,
        })
    }

    /// GET /api/relations
    pub async fn query_relations(&self, query: &RelationQuery) -> Result<Vec<WireRelation>> {
        let mut url = self.endpoint("/api/relations")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(team) = &query.team {
                pairs.append_pair("team", team);
            }
            if let Some(entity_id) = &query.entity_id {
                pairs.append_pair("entityId", entity_id);
            }
        }
        let response: RelationsResponse = self.get_json(url).await?;
        Ok(match response {
            RelationsResponse::Wrapped { relations } => relations,
            RelationsResponse::Bare(relations) => relations,
        })
    }

    /// GET /api/health
    pub async fn health(&self) -> Result<ServiceHealth> {
        let url = self.endpoint("/api/health")?;
        self.get_json(url).await
    }

    /// POST /api/entities
    pub async fn create_entity(&self, entity: &NewEntity) -> Result<()> {
        let url = self.endpoint("/api/entities")?;
        let response = self
            .client
            .post(url)
            .json(entity)
            .send()
            .await
            .map_err(|e| MemvizError::Gateway(format!("Network error: {}", e)))?;
        Self::check_ok(response).await
    }

    /// DELETE /api/entities?name=&team=
    pub async fn delete_entity(&self, name: &str, team: &str) -> Result<()> {
        let mut url = self.endpoint("/api/entities")?;
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("team", team);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| MemvizError::Gateway(format!("Network error: {}", e)))?;
        Self::check_ok(response).await
    }

    /// POST /api/relations
    pub async fn create_relation(&self, relation: &NewRelation) -> Result<()> {
        let url = self.endpoint("/api/relations")?;
        let response = self
            .client
            .post(url)
            .json(relation)
            .send()
            .await
            .map_err(|e| MemvizError::Gateway(format!("Network error: {}", e)))?;
        Self::check_ok(response).await
    }

    /// Fetch entities and relations for the given teams and build a snapshot.
    ///
    /// Fails as a whole on any gateway error; the caller keeps its previous
    /// snapshot in that case.
    pub async fn fetch_snapshot(&self, teams: &[String]) -> Result<Snapshot> {
        let mut wire_entities: Vec<(String, Vec<WireEntity>)> = Vec::new();
        let mut wire_relations: Vec<WireRelation> = Vec::new();

        for team in teams {
            let entities = self
                .query_entities(&EntityQuery {
                    team: Some(team.clone()),
                    ..Default::default()
                })
                .await?;
            let relations = self
                .query_relations(&RelationQuery {
                    team: Some(team.clone()),
                    ..Default::default()
                })
                .await?;
            wire_entities.push((team.clone(), entities));
            wire_relations.extend(relations);
        }

        // Hash the raw payload so the view cache keys on actual content.
        let raw = serde_json::to_string(&(&wire_entities, &wire_relations))
            .map_err(|e| MemvizError::Gateway(format!("Failed to serialize snapshot: {}", e)))?;
        let hash = ingest::content_hash(&raw);

        let entities = wire_entities
            .into_iter()
            .flat_map(|(team, list)| {
                list.into_iter()
                    .map(move |wire| wire.into_entity(&team))
            })
            .collect();
        let relations: Vec<Relation> = wire_relations.into_iter().map(Relation::from).collect();

        Ok(Snapshot::new(entities, relations, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> QueryClient {
        QueryClient::new("http://localhost:8081", Duration::from_secs(5), 2).unwrap()
    }

    #[test]
    fn test_client_new_rejects_bad_url() {
        let result = QueryClient::new("not a url", Duration::from_secs(5), 2);
        assert!(matches!(result, Err(MemvizError::Config(_))));
    }

    #[test]
    fn test_endpoint_join() {
        let client = client();
        let url = client.endpoint("/api/teams").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8081/api/teams");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(QueryClient::retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(QueryClient::retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!QueryClient::retryable_status(StatusCode::NOT_FOUND));
        assert!(!QueryClient::retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_entities_response_wrapped_and_bare() {
        let wrapped: EntitiesResponse =
            serde_json::from_str(r#"{"entities":[{"name":"A","entityType":"Task"}]}"#).unwrap();
        assert!(matches!(wrapped, EntitiesResponse::Wrapped { entities } if entities.len() == 1));

        let bare: EntitiesResponse =
            serde_json::from_str(r#"[{"name":"A","entityType":"Task"}]"#).unwrap();
        assert!(matches!(bare, EntitiesResponse::Bare(entities) if entities.len() == 1));
    }
}
