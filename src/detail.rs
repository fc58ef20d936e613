//! Builds the detail view for a single provenance event, including the
//! fields that only apply to certain event types and the content claim
//! descriptors for both sides of the event.

use crate::dto::{EventKind, ProvenanceEvent};
use crate::format;

/// A labelled detail value. `None` renders as `No value set`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailField {
    pub label: &'static str,
    pub value: Option<String>,
}

/// A flowfile attribute with its modification state. An attribute counts as
/// modified when the event left it with a different value than it had
/// before, including the case where it had no previous value at all.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDetail {
    pub name: String,
    pub value: Option<String>,
    pub previous_value: Option<String>,
    pub modified: bool,
}

/// Location of content in the repository for one side of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentClaim {
    pub container: Option<String>,
    pub section: Option<String>,
    pub identifier: Option<String>,
    pub offset: Option<u64>,
    pub file_size: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub available: bool,
}

impl ContentClaim {
    fn present(&self) -> bool {
        self.container.is_some() || self.section.is_some() || self.identifier.is_some()
    }
}

/// Everything the detail view shows for one event.
#[derive(Debug, Clone)]
pub struct EventDetail {
    pub event_id: u64,
    pub event_time: String,
    pub event_type: String,
    pub flow_file_uuid: String,
    pub file_size: String,
    pub file_size_bytes: u64,
    pub component_id: Option<String>,
    pub component_name: Option<String>,
    pub component_type: Option<String>,
    pub details: Option<String>,
    /// Already formatted; `< 1ms` for sub-millisecond events.
    pub event_duration: String,
    pub lineage_duration: String,
    /// Extra fields for RECEIVE, SEND, ROUTE, FETCH, and ADDINFO events.
    pub type_specific: Vec<DetailField>,
    pub cluster_node_id: Option<String>,
    pub cluster_node_address: Option<String>,
    pub attributes: Vec<AttributeDetail>,
    pub parent_uuids: Vec<String>,
    pub child_uuids: Vec<String>,
    pub input_claim: Option<ContentClaim>,
    pub output_claim: Option<ContentClaim>,
    pub replay_available: bool,
    pub replay_explanation: Option<String>,
    pub source_connection_identifier: Option<String>,
}

impl EventDetail {
    pub fn from_event(event: &ProvenanceEvent) -> Self {
        EventDetail {
            event_id: event.event_id,
            event_time: event.event_time.clone(),
            event_type: event.event_type.clone(),
            flow_file_uuid: event.flow_file_uuid.clone(),
            file_size: event.file_size.clone(),
            file_size_bytes: event.file_size_bytes,
            component_id: event.component_id.clone(),
            component_name: event.component_name.clone(),
            component_type: event.component_type.clone(),
            details: event.details.clone(),
            event_duration: duration_text(event.event_duration),
            lineage_duration: duration_text(event.lineage_duration),
            type_specific: type_specific_fields(event),
            cluster_node_id: event.cluster_node_id.clone(),
            cluster_node_address: event.cluster_node_address.clone(),
            attributes: attribute_details(event),
            parent_uuids: event.parent_uuids.clone(),
            child_uuids: event.child_uuids.clone(),
            input_claim: input_claim(event),
            output_claim: output_claim(event),
            replay_available: event.replay_available,
            replay_explanation: event.replay_explanation.clone(),
            source_connection_identifier: event.source_connection_identifier.clone(),
        }
    }
}

fn duration_text(millis: Option<i64>) -> String {
    match millis {
        None => "No value set".to_string(),
        Some(0) => "< 1ms".to_string(),
        Some(value) => format::format_duration(value.max(0) as u64),
    }
}

fn type_specific_fields(event: &ProvenanceEvent) -> Vec<DetailField> {
    match event.kind() {
        EventKind::Receive => vec![
            DetailField {
                label: "Source FlowFile Id",
                value: event.source_system_flow_file_id.clone(),
            },
            DetailField {
                label: "Transit Uri",
                value: event.transit_uri.clone(),
            },
        ],
        EventKind::Send | EventKind::Fetch => vec![DetailField {
            label: "Transit Uri",
            value: event.transit_uri.clone(),
        }],
        EventKind::AddInfo => vec![DetailField {
            label: "Alternate Identifier Uri",
            value: event.alternate_identifier_uri.clone(),
        }],
        EventKind::Route => vec![DetailField {
            label: "Relationship",
            value: event.relationship.clone(),
        }],
        EventKind::Other => Vec::new(),
    }
}

fn attribute_details(event: &ProvenanceEvent) -> Vec<AttributeDetail> {
    event
        .attributes
        .iter()
        .map(|attribute| AttributeDetail {
            name: attribute.name.clone(),
            value: attribute.value.clone(),
            previous_value: attribute.previous_value.clone(),
            modified: attribute.value != attribute.previous_value,
        })
        .collect()
}

fn input_claim(event: &ProvenanceEvent) -> Option<ContentClaim> {
    let claim = ContentClaim {
        container: event.input_content_claim_container.clone(),
        section: event.input_content_claim_section.clone(),
        identifier: event.input_content_claim_identifier.clone(),
        offset: event.input_content_claim_offset,
        file_size: claim_size(
            event.input_content_claim_file_size.as_deref(),
            event.input_content_claim_file_size_bytes,
        ),
        file_size_bytes: event.input_content_claim_file_size_bytes,
        available: event.input_content_available,
    };
    claim.present().then_some(claim)
}

fn output_claim(event: &ProvenanceEvent) -> Option<ContentClaim> {
    let claim = ContentClaim {
        container: event.output_content_claim_container.clone(),
        section: event.output_content_claim_section.clone(),
        identifier: event.output_content_claim_identifier.clone(),
        offset: event.output_content_claim_offset,
        file_size: claim_size(
            event.output_content_claim_file_size.as_deref(),
            event.output_content_claim_file_size_bytes,
        ),
        file_size_bytes: event.output_content_claim_file_size_bytes,
        available: event.output_content_available,
    };
    claim.present().then_some(claim)
}

fn claim_size(display: Option<&str>, bytes: Option<u64>) -> Option<String> {
    display
        .map(str::to_string)
        .or_else(|| bytes.map(format::format_data_size))
}
