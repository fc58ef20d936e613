//! Drives a provenance search from submission to a terminal state.
//!
//! A search submits a query, then polls its status on a fixed interval until
//! the service reports it finished. Cancellation is cooperative: an
//! outstanding call is never aborted, its response is discarded once it
//! lands, and the server side query is released either way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::QueryClient;
use crate::config::Config;
use crate::dto::{Query, QueryHandle, SearchRequest};
use crate::error::Result;
use crate::projection::{self, SortSpec};
use crate::renderer::ResultsRenderer;

/// Terminal state of a search that did not fail outright.
#[derive(Debug)]
pub enum SearchOutcome {
    Completed(SearchSummary),
    Cancelled,
}

/// What a completed search produced, independent of how it was rendered.
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    /// Events fetched and handed to the renderer.
    pub displayed: usize,
    /// Events the service matched in total, before the result cap.
    pub total_count: u64,
    pub message: String,
    pub clear_search_visible: bool,
    /// Errors the service attached to the finished query. These accompany
    /// whatever partial results were returned; they do not replace them.
    pub errors: Vec<String>,
    pub generated: String,
    pub oldest_event: Option<String>,
}

pub struct SearchService {
    client: QueryClient,
    renderer: Arc<dyn ResultsRenderer>,
    sort: SortSpec,
    poll_interval: Duration,
    max_results: u32,
    /// Criteria of the previous run. A run without explicit criteria repeats
    /// these; a blank request is used when nothing has run yet.
    last_request: Option<SearchRequest>,
    /// Handle of a query whose run was abandoned mid-flight. Released before
    /// the next submission.
    active: Option<QueryHandle>,
    server_time_offset: Option<i64>,
    progress_tx: Option<mpsc::UnboundedSender<u8>>,
}

impl SearchService {
    pub fn new(client: QueryClient, renderer: Arc<dyn ResultsRenderer>, config: &Config) -> Self {
        let max_results = client.max_results();
        SearchService {
            client,
            renderer,
            sort: SortSpec::default(),
            poll_interval: config.poll_interval(),
            max_results,
            last_request: None,
            active: None,
            server_time_offset: None,
            progress_tx: None,
        }
    }

    /// Ordering applied when projecting results.
    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
    }

    /// Registers a channel that receives completion percentages, starting at
    /// zero when a search begins.
    pub fn set_progress_channel(&mut self, progress: mpsc::UnboundedSender<u8>) {
        self.progress_tx = Some(progress);
    }

    /// Forgets the cached criteria. The next run without explicit criteria
    /// submits a blank query for the most recent events.
    pub fn clear_search(&mut self) {
        self.last_request = None;
    }

    pub fn last_request(&self) -> Option<&SearchRequest> {
        self.last_request.as_ref()
    }

    /// Milliseconds between the service clock and UTC, as reported by the
    /// most recent completed search.
    pub fn server_time_offset(&self) -> Option<i64> {
        self.server_time_offset
    }

    /// Runs one search to a terminal state. Explicit criteria replace the
    /// cached ones; `None` repeats the previous search.
    pub async fn run_search(
        &mut self,
        request: Option<SearchRequest>,
        cancel: CancellationToken,
    ) -> Result<SearchOutcome> {
        if let Some(stale) = self.active.take() {
            debug!(query_id = %stale.id, "releasing abandoned query before starting a new search");
            self.release_query(&stale).await;
        }

        let request = match request {
            Some(explicit) => {
                self.last_request = Some(explicit.clone());
                explicit
            }
            None => self.last_request.clone().unwrap_or_default(),
        };

        self.report_progress(0);
        info!(blank = request.is_blank(), "starting provenance search");

        let query = self.client.submit_query(&request).await?;
        let mut handle = QueryHandle::from_query(&query);
        if handle.cluster_node_id.is_none() {
            handle.cluster_node_id = request.cluster_node_id.clone();
        }
        debug!(query_id = %handle.id, "query accepted");
        self.active = Some(handle.clone());

        let outcome = self.poll_to_completion(&request, &handle, query, &cancel).await;
        self.active = None;
        outcome
    }

    async fn poll_to_completion(
        &mut self,
        request: &SearchRequest,
        handle: &QueryHandle,
        mut query: Query,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        loop {
            // Checked before the response is consumed, so a status that
            // arrived after cancellation gets discarded.
            if cancel.is_cancelled() {
                info!(query_id = %handle.id, "search cancelled, dropping the response");
                self.release_query(handle).await;
                return Ok(SearchOutcome::Cancelled);
            }

            self.report_progress(query.percent_completed);

            if query.finished {
                let summary = self.complete(request, handle, query).await;
                return Ok(SearchOutcome::Completed(summary));
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(query_id = %handle.id, "search cancelled while waiting to poll");
                    self.release_query(handle).await;
                    return Ok(SearchOutcome::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            query = match self.client.query_status(handle).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(query_id = %handle.id, "status poll failed: {err}");
                    self.release_query(handle).await;
                    return Err(err);
                }
            };
        }
    }

    async fn complete(
        &mut self,
        request: &SearchRequest,
        handle: &QueryHandle,
        query: Query,
    ) -> SearchSummary {
        let results = query.results.unwrap_or_default();
        for error in &results.errors {
            warn!(query_id = %handle.id, "query service reported: {error}");
        }
        self.server_time_offset = results.time_offset;

        let mut summary = SearchSummary {
            total_count: results.total_count,
            errors: results.errors.clone(),
            ..SearchSummary::default()
        };

        // The service omits the event listing entirely in some finished
        // responses; nothing is rendered in that case.
        if results.provenance_events.is_some() {
            let view = projection::project_results(request, &results, self.max_results, &self.sort);
            summary.displayed = view.rows.len();
            summary.message = view.message.clone();
            summary.clear_search_visible = view.show_clear_search;
            summary.generated = view.generated.clone();
            summary.oldest_event = view.oldest_event.clone();
            self.renderer.render(view).await;
        } else {
            debug!(query_id = %handle.id, "finished query carried no event listing");
        }

        self.release_query(handle).await;
        summary
    }

    /// Deletes the server side query. Failures are logged and swallowed; the
    /// service expires queries on its own eventually.
    async fn release_query(&self, handle: &QueryHandle) {
        if let Err(err) = self.client.delete_query(handle).await {
            debug!(query_id = %handle.id, "query delete failed: {err}");
        }
    }

    fn report_progress(&self, percent: u8) {
        debug!(percent, "search progress");
        if let Some(progress) = &self.progress_tx {
            let _ = progress.send(percent);
        }
    }
}
