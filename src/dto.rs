//! Wire types exchanged with the provenance query service.
//!
//! Every payload travels inside an entity wrapper (`{"provenance": ...}`,
//! `{"provenanceEvent": ...}`) and uses camelCase field names, matching the
//! service's JSON contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::format;

/// User supplied search criteria. Every field is optional; an empty request
/// asks for the most recent events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Minimum file size as entered, e.g. `1 KB`. Forwarded verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_file_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_file_size: Option<String>,
    /// Restricts the search to a single node of a clustered service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_node_id: Option<String>,
    /// Field id to value, using ids reported by the searchable fields listing.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub search_terms: HashMap<String, String>,
}

impl SearchRequest {
    /// A blank request carries no dates and no search terms. File size bounds
    /// alone do not make a request targeted; the summary wording and the
    /// clear-search affordance both key off this distinction.
    pub fn is_blank(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.search_terms.is_empty()
    }

    /// Validates the locally checkable parts of the request. Dates pass
    /// through untouched since the service owns their zone handling.
    pub fn validate(&self) -> Result<()> {
        let minimum = self
            .minimum_file_size
            .as_deref()
            .map(|text| {
                format::parse_data_size(text).ok_or_else(|| {
                    SearchError::invalid_request(format!("unrecognized minimum file size: {text}"))
                })
            })
            .transpose()?;
        let maximum = self
            .maximum_file_size
            .as_deref()
            .map(|text| {
                format::parse_data_size(text).ok_or_else(|| {
                    SearchError::invalid_request(format!("unrecognized maximum file size: {text}"))
                })
            })
            .transpose()?;

        if let (Some(min), Some(max)) = (minimum, maximum) {
            if min > max {
                return Err(SearchError::invalid_request(
                    "minimum file size exceeds maximum file size",
                ));
            }
        }
        Ok(())
    }
}

/// The request body the service actually receives: user criteria plus the
/// fixed parameters every submission carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(flatten)]
    pub search: SearchRequest,
    pub max_results: u32,
    pub summarize: bool,
    pub incremental_results: bool,
}

/// POST body for creating a query: `{"provenance": {"request": {...}}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySubmission {
    pub provenance: QuerySubmissionRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySubmissionRequest {
    pub request: QueryRequest,
}

/// Response wrapper for query creation and status reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEntity {
    pub provenance: Query,
}

/// A server side query resource. Status reads return the same shape with
/// `percent_completed` advancing until `finished` flips to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub id: String,
    /// Absolute URI of this query resource. Status and delete calls go here.
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(default)]
    pub percent_completed: u8,
    #[serde(default)]
    pub finished: bool,
    /// Echo of the submitted request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<QueryRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<QueryResults>,
}

/// Result block of a query. `provenance_events` stays absent until the
/// service has something to report; `total` is the service's formatted
/// rendering of `total_count`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_events: Option<Vec<ProvenanceEvent>>,
    pub total: String,
    pub total_count: u64,
    /// When the result set was produced, in the service's clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    /// Timestamp of the oldest event still held by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_event: Option<String>,
    /// Offset in milliseconds between the service clock and UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_offset: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// A single provenance event. Summarized listings populate the identity and
/// table columns; the per-event endpoint fills in the detail fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvenanceEvent {
    pub event_id: u64,
    pub event_time: String,
    pub event_type: String,
    pub flow_file_uuid: String,
    pub file_size: String,
    pub file_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_node_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Duration of the event itself in milliseconds. Zero means sub-millisecond.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_duration: Option<i64>,
    /// Milliseconds since the flowfile entered the flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_system_flow_file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_identifier_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<EventAttribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_uuids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_uuids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content_claim_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content_claim_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content_claim_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content_claim_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content_claim_file_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content_claim_file_size_bytes: Option<u64>,
    pub input_content_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_content_claim_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_content_claim_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_content_claim_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_content_claim_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_content_claim_file_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_content_claim_file_size_bytes: Option<u64>,
    pub output_content_available: bool,
    pub replay_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_connection_identifier: Option<String>,
}

impl ProvenanceEvent {
    /// Classifies the event for detail rendering. Only a handful of types
    /// carry type specific fields; everything else is `Other`.
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            "RECEIVE" => EventKind::Receive,
            "SEND" => EventKind::Send,
            "ROUTE" => EventKind::Route,
            "FETCH" => EventKind::Fetch,
            "ADDINFO" => EventKind::AddInfo,
            _ => EventKind::Other,
        }
    }
}

/// Well known event types that render extra fields in the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Receive,
    Send,
    Route,
    Fetch,
    AddInfo,
    Other,
}

/// One flowfile attribute as observed by an event, with the value it held
/// before the event ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventAttribute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
}

/// Everything needed to poll or release a submitted query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHandle {
    pub id: String,
    pub uri: String,
    /// Node the query was scoped to, forwarded on every follow-up call.
    pub cluster_node_id: Option<String>,
}

impl QueryHandle {
    pub fn from_query(query: &Query) -> Self {
        QueryHandle {
            id: query.id.clone(),
            uri: query.uri.clone(),
            cluster_node_id: query
                .request
                .as_ref()
                .and_then(|request| request.search.cluster_node_id.clone()),
        }
    }
}

/// Response wrapper for the searchable fields listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptionsEntity {
    pub provenance_options: SearchOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub searchable_fields: Vec<SearchableField>,
}

/// A field the service accepts search terms for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchableField {
    /// Identifier used as the key in [`SearchRequest::search_terms`].
    pub id: String,
    pub field: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Response wrapper for a single event fetched by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEventEntity {
    pub provenance_event: ProvenanceEvent,
}

/// Response wrapper for the cluster node listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSearchResultsEntity {
    pub node_results: Vec<ClusterSearchNode>,
}

/// A node that search requests may be scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSearchNode {
    pub id: String,
    pub address: String,
}

/// Request body for replaying an event's flowfile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRequest {
    pub event_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_node_id: Option<String>,
}
