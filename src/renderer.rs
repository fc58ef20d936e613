//! Rendering seam between the search flow and whatever displays results.
//! The CLI ships a plain table implementation; tests plug in a recorder.

use async_trait::async_trait;

use crate::detail::EventDetail;
use crate::format;
use crate::projection::{EventRow, ResultsView, RowFilter};

/// Receives the projected view of each finished search.
#[async_trait]
pub trait ResultsRenderer: Send + Sync {
    async fn render(&self, view: ResultsView);
}

/// Writes results to stdout as a fixed width table. An optional row filter
/// narrows what is displayed without changing the underlying result set.
pub struct TableRenderer {
    filter: Option<RowFilter>,
}

impl TableRenderer {
    pub fn new(filter: Option<RowFilter>) -> Self {
        TableRenderer { filter }
    }
}

#[async_trait]
impl ResultsRenderer for TableRenderer {
    async fn render(&self, view: ResultsView) {
        let displayed = match &self.filter {
            Some(filter) => filter.apply(&view.rows),
            None => view.rows.clone(),
        };
        // The node column only appears for clustered result sets.
        let show_node = view
            .rows
            .iter()
            .any(|row| !row.cluster_node_address.is_empty());

        println!("{}", header_line(show_node));
        for row in &displayed {
            println!("{}", format_row(row, show_node));
        }

        println!();
        println!("Displaying {} of {} events", displayed.len(), view.rows.len());
        if !view.generated.is_empty() {
            println!("Last updated: {}", view.generated);
        }
        if let Some(oldest) = &view.oldest_event {
            println!("Oldest event: {}", oldest);
        }
        println!("{}", view.message);
        if view.show_clear_search {
            println!("Search criteria applied. Rerun without criteria to see the most recent events.");
        }
    }
}

fn header_line(show_node: bool) -> String {
    let mut line = format!(
        "{:>10}  {:<28}  {:<20}  {:<36}  {:>10}  {:<24}  {:<24}",
        "Id", "Date/Time", "Type", "FlowFile Uuid", "Size", "Component Name", "Component Type"
    );
    if show_node {
        line.push_str("  Node");
    }
    line
}

fn format_row(row: &EventRow, show_node: bool) -> String {
    let mut line = format!(
        "{:>10}  {:<28.28}  {:<20.20}  {:<36.36}  {:>10.10}  {:<24.24}  {:<24.24}",
        row.event_id,
        row.event_time,
        row.event_type,
        row.flow_file_uuid,
        row.file_size,
        row.component_name,
        row.component_type
    );
    if show_node {
        line.push_str("  ");
        line.push_str(&row.cluster_node_address);
    }
    line
}

/// Prints the full detail view of one event.
pub fn print_event_detail(detail: &EventDetail) {
    println!("Event {}", detail.event_id);
    print_field("Time", Some(&detail.event_time));
    print_field("Type", Some(&detail.event_type));
    print_field("FlowFile Uuid", Some(&detail.flow_file_uuid));
    print_field(
        "File Size",
        Some(&format!(
            "{} ({} bytes)",
            detail.file_size,
            format::format_integer(detail.file_size_bytes)
        )),
    );
    print_field("Component Id", detail.component_id.as_deref());
    print_field("Component Name", detail.component_name.as_deref());
    print_field("Component Type", detail.component_type.as_deref());
    if detail.details.is_some() {
        print_field("Details", detail.details.as_deref());
    }
    print_field("Event Duration", Some(&detail.event_duration));
    print_field("Lineage Duration", Some(&detail.lineage_duration));
    for field in &detail.type_specific {
        print_field(field.label, field.value.as_deref());
    }
    if let Some(address) = &detail.cluster_node_address {
        print_field("Node Address", Some(address));
    }
    if let Some(connection) = &detail.source_connection_identifier {
        print_field("Source Connection Id", Some(connection));
    }

    if !detail.attributes.is_empty() {
        println!();
        println!("Attributes");
        for attribute in &detail.attributes {
            let value = attribute.value.as_deref().unwrap_or("No value set");
            if attribute.modified {
                match attribute.previous_value.as_deref() {
                    Some(previous) => {
                        println!("  {} = {} (was {})", attribute.name, value, previous)
                    }
                    None => println!("  {} = {} (newly set)", attribute.name, value),
                }
            } else {
                println!("  {} = {}", attribute.name, value);
            }
        }
    }

    if !detail.parent_uuids.is_empty() {
        println!();
        println!("Parent FlowFiles ({})", detail.parent_uuids.len());
        for uuid in &detail.parent_uuids {
            println!("  {}", uuid);
        }
    }
    if !detail.child_uuids.is_empty() {
        println!();
        println!("Child FlowFiles ({})", detail.child_uuids.len());
        for uuid in &detail.child_uuids {
            println!("  {}", uuid);
        }
    }

    if let Some(claim) = &detail.input_claim {
        println!();
        println!("Input Content");
        print_claim(claim);
    }
    if let Some(claim) = &detail.output_claim {
        println!();
        println!("Output Content");
        print_claim(claim);
    }

    println!();
    if detail.replay_available {
        println!("Replay is available for this event.");
    } else {
        match &detail.replay_explanation {
            Some(explanation) => println!("Replay is not available: {}", explanation),
            None => println!("Replay is not available."),
        }
    }
}

fn print_claim(claim: &crate::detail::ContentClaim) {
    print_field("Container", claim.container.as_deref());
    print_field("Section", claim.section.as_deref());
    print_field("Identifier", claim.identifier.as_deref());
    print_field(
        "Offset",
        claim.offset.map(format::format_integer).as_deref(),
    );
    print_field("Size", claim.file_size.as_deref());
    print_field("Available", Some(if claim.available { "Yes" } else { "No" }));
}

fn print_field(label: &str, value: Option<&str>) {
    println!("  {:<20} {}", label, value.unwrap_or("No value set"));
}
