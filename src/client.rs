//! HTTP client for the provenance query service.
//!
//! Query creation goes to the configured base URL; status and delete calls
//! follow the absolute URI the service hands back, so polling keeps working
//! when the service answers with a node-local address.

use reqwest::Response;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::dto::{
    ClusterSearchNode, ClusterSearchResultsEntity, ProvenanceEvent, ProvenanceEventEntity, Query,
    QueryEntity, QueryHandle, QueryRequest, QuerySubmission, QuerySubmissionRequest,
    ReplayRequest, SearchOptionsEntity, SearchRequest, SearchableField,
};
use crate::error::{Result, SearchError};

/// Longest error body kept when the service rejects a call.
const MAX_ERROR_BODY: usize = 500;

pub struct QueryClient {
    client: reqwest::Client,
    base_url: Url,
    max_results: u32,
}

impl QueryClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(QueryClient {
            client,
            base_url: config.api.base_url.clone(),
            max_results: config.query.max_results,
        })
    }

    /// Result cap applied to every submitted query.
    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    /// Submits a new query. The service responds with the query resource the
    /// caller must poll until it reports `finished`.
    pub async fn submit_query(&self, request: &SearchRequest) -> Result<Query> {
        request.validate()?;

        let url = self.endpoint(&["provenance"])?;
        let submission = QuerySubmission {
            provenance: QuerySubmissionRequest {
                request: QueryRequest {
                    search: request.clone(),
                    max_results: self.max_results,
                    summarize: true,
                    incremental_results: false,
                },
            },
        };

        debug!(url = %url, "submitting provenance query");
        let response = self.client.post(url).json(&submission).send().await?;
        let entity: QueryEntity = read_success(response).await?.json().await?;
        Ok(entity.provenance)
    }

    /// Reads the current status of a query, summarized and without
    /// incremental results, matching the submission parameters.
    pub async fn query_status(&self, handle: &QueryHandle) -> Result<Query> {
        let mut params = vec![
            ("summarize", "true".to_string()),
            ("incrementalResults", "false".to_string()),
        ];
        if let Some(node) = &handle.cluster_node_id {
            params.push(("clusterNodeId", node.clone()));
        }

        debug!(query_id = %handle.id, "polling query status");
        let response = self
            .client
            .get(&handle.uri)
            .query(&params)
            .send()
            .await?;
        let entity: QueryEntity = read_success(response).await?.json().await?;
        Ok(entity.provenance)
    }

    /// Releases a query's server side resources.
    pub async fn delete_query(&self, handle: &QueryHandle) -> Result<()> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(node) = &handle.cluster_node_id {
            params.push(("clusterNodeId", node.clone()));
        }

        debug!(query_id = %handle.id, "deleting query");
        let response = self
            .client
            .delete(&handle.uri)
            .query(&params)
            .send()
            .await?;
        read_success(response).await?;
        Ok(())
    }

    /// Lists the fields the service accepts search terms for.
    pub async fn search_options(&self) -> Result<Vec<SearchableField>> {
        let url = self.endpoint(&["provenance", "search-options"])?;
        let response = self.client.get(url).send().await?;
        let entity: SearchOptionsEntity = read_success(response).await?.json().await?;
        Ok(entity.provenance_options.searchable_fields)
    }

    /// Fetches the full detail record for one event.
    pub async fn event(
        &self,
        event_id: u64,
        cluster_node_id: Option<&str>,
    ) -> Result<ProvenanceEvent> {
        let url = self.endpoint(&["provenance-events", &event_id.to_string()])?;
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(node) = cluster_node_id {
            params.push(("clusterNodeId", node.to_string()));
        }

        let response = self.client.get(url).query(&params).send().await?;
        let entity: ProvenanceEventEntity = read_success(response).await?.json().await?;
        Ok(entity.provenance_event)
    }

    /// Asks the service to replay the flowfile an event operated on.
    pub async fn submit_replay(&self, replay: &ReplayRequest) -> Result<ProvenanceEvent> {
        let url = self.endpoint(&["provenance-events", "replays"])?;
        debug!(event_id = replay.event_id, "submitting replay request");
        let response = self.client.post(url).json(replay).send().await?;
        let entity: ProvenanceEventEntity = read_success(response).await?.json().await?;
        Ok(entity.provenance_event)
    }

    /// Lists cluster nodes that searches may be scoped to, ordered by
    /// address without regard to case.
    pub async fn cluster_nodes(&self) -> Result<Vec<ClusterSearchNode>> {
        let url = self.endpoint(&["flow", "cluster", "search-results"])?;
        let response = self.client.get(url).send().await?;
        let entity: ClusterSearchResultsEntity = read_success(response).await?.json().await?;

        let mut nodes = entity.node_results;
        nodes.sort_by_key(|node| node.address.to_lowercase());
        Ok(nodes)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SearchError::config("query service URL cannot be a base"))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

async fn read_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    if body.is_empty() {
        body = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
    }
    Err(SearchError::api(status.as_u16(), body))
}
