//! Turns a finished query's results into an ordered table view.
//!
//! Rows keep the display strings the service produced; sorting runs on
//! parsed keys so `2 KB` orders after `900 bytes` and timestamps order
//! chronologically rather than lexically.

use regex::RegexBuilder;

use crate::dto::{ProvenanceEvent, QueryResults, SearchRequest};
use crate::format;

/// Columns the event table can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    EventTime,
    EventType,
    FlowFileUuid,
    FileSize,
    ComponentName,
    ComponentType,
    NodeAddress,
}

/// Requested ordering. The direction applies to the sort column only; ties
/// always fall back to ascending event id so reruns produce identical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub ascending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            column: SortColumn::EventTime,
            ascending: false,
        }
    }
}

/// Row properties the table filter can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterProperty {
    ComponentName,
    ComponentType,
    EventType,
    NodeAddress,
}

/// Case insensitive regex filter over one row property.
#[derive(Debug, Clone)]
pub struct RowFilter {
    pub text: String,
    pub property: FilterProperty,
}

impl RowFilter {
    /// Returns the rows the filter keeps. An empty pattern keeps everything;
    /// a pattern that fails to parse keeps nothing.
    pub fn apply(&self, rows: &[EventRow]) -> Vec<EventRow> {
        if self.text.is_empty() {
            return rows.to_vec();
        }

        let regex = match RegexBuilder::new(&self.text).case_insensitive(true).build() {
            Ok(regex) => regex,
            Err(_) => return Vec::new(),
        };

        rows.iter()
            .filter(|row| regex.is_match(self.value_of(row)))
            .cloned()
            .collect()
    }

    fn value_of<'a>(&self, row: &'a EventRow) -> &'a str {
        match self.property {
            FilterProperty::ComponentName => &row.component_name,
            FilterProperty::ComponentType => &row.component_type,
            FilterProperty::EventType => &row.event_type,
            FilterProperty::NodeAddress => &row.cluster_node_address,
        }
    }
}

/// One table row. Display fields stay exactly as the service sent them;
/// `row_id` is attached client side and records the arrival position.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub row_id: usize,
    pub event_id: u64,
    pub event_time: String,
    /// Parsed from `event_time` once at projection. Unparseable timestamps
    /// order before everything else.
    pub event_time_millis: Option<i64>,
    pub event_type: String,
    pub flow_file_uuid: String,
    pub file_size: String,
    pub file_size_bytes: u64,
    pub component_name: String,
    pub component_type: String,
    pub cluster_node_id: Option<String>,
    /// Empty when the service is not clustered.
    pub cluster_node_address: String,
    pub group_id: Option<String>,
}

impl EventRow {
    fn from_event(row_id: usize, event: &ProvenanceEvent) -> Self {
        EventRow {
            row_id,
            event_id: event.event_id,
            event_time_millis: format::parse_event_time(&event.event_time),
            event_time: event.event_time.clone(),
            event_type: event.event_type.clone(),
            flow_file_uuid: event.flow_file_uuid.clone(),
            file_size: event.file_size.clone(),
            file_size_bytes: event.file_size_bytes,
            component_name: event.component_name.clone().unwrap_or_default(),
            component_type: event.component_type.clone().unwrap_or_default(),
            cluster_node_id: event.cluster_node_id.clone(),
            cluster_node_address: event.cluster_node_address.clone().unwrap_or_default(),
            group_id: event.group_id.clone(),
        }
    }
}

/// The rendered form of a finished query.
#[derive(Debug, Clone, Default)]
pub struct ResultsView {
    pub rows: Vec<EventRow>,
    /// When the service produced the result set, in its own clock. Empty
    /// when the service did not report it.
    pub generated: String,
    pub oldest_event: Option<String>,
    pub total_count: u64,
    /// Summary line describing how much of the match set is shown.
    pub message: String,
    /// Whether a clear-search affordance applies. Blank queries have nothing
    /// to clear.
    pub show_clear_search: bool,
}

/// Projects a finished query into a sorted table view.
pub fn project_results(
    request: &SearchRequest,
    results: &QueryResults,
    max_results: u32,
    sort: &SortSpec,
) -> ResultsView {
    let events = results.provenance_events.as_deref().unwrap_or_default();
    let mut rows: Vec<EventRow> = events
        .iter()
        .enumerate()
        .map(|(index, event)| EventRow::from_event(index, event))
        .collect();
    sort_rows(&mut rows, sort);

    let (message, show_clear_search) = summary_message(request, results, max_results);

    ResultsView {
        rows,
        generated: results.generated.clone().unwrap_or_default(),
        oldest_event: results.oldest_event.clone(),
        total_count: results.total_count,
        message,
        show_clear_search,
    }
}

/// Orders rows by the sort column, then by ascending event id. The id
/// fallback is not affected by the requested direction, so flipping the
/// direction never reshuffles rows that tie on the sort key.
pub fn sort_rows(rows: &mut [EventRow], sort: &SortSpec) {
    rows.sort_by(|a, b| {
        let primary = match sort.column {
            SortColumn::EventTime => a.event_time_millis.cmp(&b.event_time_millis),
            SortColumn::EventType => a.event_type.cmp(&b.event_type),
            SortColumn::FlowFileUuid => a.flow_file_uuid.cmp(&b.flow_file_uuid),
            SortColumn::FileSize => a.file_size_bytes.cmp(&b.file_size_bytes),
            SortColumn::ComponentName => a.component_name.cmp(&b.component_name),
            SortColumn::ComponentType => a.component_type.cmp(&b.component_type),
            SortColumn::NodeAddress => a.cluster_node_address.cmp(&b.cluster_node_address),
        };
        let directed = if sort.ascending {
            primary
        } else {
            primary.reverse()
        };
        directed.then_with(|| a.event_id.cmp(&b.event_id))
    });
}

/// Builds the summary line and decides whether a clear-search affordance
/// applies. The wording depends on whether the request was blank and on
/// whether the match set hit the result cap.
pub fn summary_message(
    request: &SearchRequest,
    results: &QueryResults,
    max_results: u32,
) -> (String, bool) {
    let capped = results.total_count >= u64::from(max_results);
    let shown = format::format_integer(u64::from(max_results));

    if request.is_blank() {
        let message = if capped {
            format!(
                "Showing the most recent {} of {} events, please refine the search.",
                shown, results.total
            )
        } else {
            "Showing the most recent events.".to_string()
        };
        (message, false)
    } else {
        let message = if capped {
            format!(
                "Showing {} of {} events that match the specified query, please refine the search.",
                shown, results.total
            )
        } else {
            "Showing the events that match the specified query.".to_string()
        };
        (message, true)
    }
}
