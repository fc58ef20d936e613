//! Provenance search client library.
//!
//! Submits event searches to a dataflow provenance query service, polls them
//! to completion with cooperative cancellation, and projects the results
//! into a sortable, filterable table view.

pub mod client;
pub mod config;
pub mod detail;
pub mod dto;
pub mod error;
pub mod format;
pub mod projection;
pub mod renderer;
pub mod search;

// Re-export the main types for convenience
pub use client::QueryClient;
pub use config::Config;
pub use detail::EventDetail;
pub use dto::{
    ClusterSearchNode, ProvenanceEvent, Query, QueryHandle, QueryResults, ReplayRequest,
    SearchRequest, SearchableField,
};
pub use error::{Result, SearchError};
pub use projection::{EventRow, FilterProperty, ResultsView, RowFilter, SortColumn, SortSpec};
pub use renderer::{ResultsRenderer, TableRenderer};
pub use search::{SearchOutcome, SearchService, SearchSummary};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
