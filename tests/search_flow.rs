//! End to end tests for the search lifecycle against an in-process mock of
//! the provenance query service. The mock serves a scripted sequence of
//! query statuses and records every call it receives.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use provenance_search::{
    Config, QueryClient, ResultsRenderer, ResultsView, SearchError, SearchOutcome, SearchRequest,
    SearchService,
};

/// One scripted status response. The mock serves these in order, first for
/// the submission itself and then for each status poll.
#[derive(Clone)]
struct ScriptedStatus {
    percent: u8,
    finished: bool,
    results: Option<Value>,
}

fn running(percent: u8) -> ScriptedStatus {
    ScriptedStatus {
        percent,
        finished: false,
        results: None,
    }
}

fn finished(results: Value) -> ScriptedStatus {
    ScriptedStatus {
        percent: 100,
        finished: true,
        results: Some(results),
    }
}

struct MockState {
    addr: SocketAddr,
    script: Mutex<VecDeque<ScriptedStatus>>,
    submissions: Mutex<Vec<Value>>,
    submission_count: AtomicUsize,
    status_params: Mutex<Vec<HashMap<String, String>>>,
    deletes: Mutex<Vec<(String, HashMap<String, String>)>>,
    fail_submit: AtomicBool,
}

impl MockState {
    fn next_status(&self) -> ScriptedStatus {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("mock script exhausted")
    }

    fn query_entity(&self, step: &ScriptedStatus) -> Value {
        let id = format!("query-{}", self.submission_count.load(Ordering::SeqCst));
        let mut provenance = json!({
            "id": id,
            "uri": format!("http://{}/provenance/{}", self.addr, id),
            "submissionTime": "09/23/2016 16:22:10.500 EDT",
            "expiration": "09/23/2016 16:52:10.500 EDT",
            "percentCompleted": step.percent,
            "finished": step.finished,
        });
        if let Some(submission) = self.submissions.lock().unwrap().last() {
            provenance["request"] = submission["provenance"]["request"].clone();
        }
        if let Some(results) = &step.results {
            provenance["results"] = results.clone();
        }
        json!({ "provenance": provenance })
    }
}

async fn create_query(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if state.fail_submit.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "query service unavailable",
        )
            .into_response();
    }
    state.submissions.lock().unwrap().push(body);
    state.submission_count.fetch_add(1, Ordering::SeqCst);
    let step = state.next_status();
    Json(state.query_entity(&step)).into_response()
}

async fn query_status(
    State(state): State<Arc<MockState>>,
    Path(_id): Path<String>,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> Json<Value> {
    state.status_params.lock().unwrap().push(params);
    let step = state.next_status();
    Json(state.query_entity(&step))
}

async fn delete_query(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> Json<Value> {
    state.deletes.lock().unwrap().push((id, params));
    Json(json!({ "provenance": { "id": "released", "uri": "" } }))
}

/// Binds the mock on an ephemeral port and serves it for the rest of the
/// test. Returns the shared state and a base URL for the client.
async fn spawn_mock(script: Vec<ScriptedStatus>) -> (Arc<MockState>, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MockState {
        addr,
        script: Mutex::new(script.into()),
        submissions: Mutex::new(Vec::new()),
        submission_count: AtomicUsize::new(0),
        status_params: Mutex::new(Vec::new()),
        deletes: Mutex::new(Vec::new()),
        fail_submit: AtomicBool::new(false),
    });

    let app = Router::new()
        .route("/provenance", post(create_query))
        .route("/provenance/:id", get(query_status).delete(delete_query))
        .with_state(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, format!("http://{addr}"))
}

/// Captures rendered views instead of printing them.
#[derive(Default)]
struct RecordingRenderer {
    views: Mutex<Vec<ResultsView>>,
}

#[async_trait::async_trait]
impl ResultsRenderer for RecordingRenderer {
    async fn render(&self, view: ResultsView) {
        self.views.lock().unwrap().push(view);
    }
}

fn test_config(base_url: &str, poll_interval_ms: u64) -> Config {
    let mut config = Config::default();
    config.api.base_url = Url::parse(base_url).unwrap();
    config.query.poll_interval_ms = poll_interval_ms;
    config
}

fn test_service(config: &Config, renderer: Arc<RecordingRenderer>) -> SearchService {
    let client = QueryClient::new(config).expect("client should build");
    SearchService::new(client, renderer, config)
}

fn event_json(event_id: u64, event_time: &str) -> Value {
    json!({
        "eventId": event_id,
        "eventTime": event_time,
        "eventType": "RECEIVE",
        "flowFileUuid": format!("uuid-{event_id}"),
        "fileSize": "2 KB",
        "fileSizeBytes": 2048,
        "componentId": "comp-1",
        "componentName": "ListenHTTP",
        "componentType": "ListenHTTP",
        "groupId": "group-1"
    })
}

fn results_json(events: Value, total_count: u64, total: &str) -> Value {
    json!({
        "provenanceEvents": events,
        "total": total,
        "totalCount": total_count,
        "generated": "16:22:13 EDT",
        "oldestEvent": "09/22/2016 08:00:00.000 EDT",
        "timeOffset": -18_000_000
    })
}

fn drain_progress(rx: &mut mpsc::UnboundedReceiver<u8>) -> Vec<u8> {
    let mut collected = Vec::new();
    while let Ok(percent) = rx.try_recv() {
        collected.push(percent);
    }
    collected
}

fn targeted_request() -> SearchRequest {
    let mut request = SearchRequest::default();
    request
        .search_terms
        .insert("EventType".to_string(), "RECEIVE".to_string());
    request
}

#[tokio::test]
async fn search_polls_to_completion_and_releases_the_query() {
    let (state, base_url) = spawn_mock(vec![
        running(40),
        finished(results_json(
            json!([
                event_json(1, "09/23/2016 10:00:00.000 EDT"),
                event_json(2, "09/23/2016 12:00:00.000 EDT"),
            ]),
            2,
            "2",
        )),
    ])
    .await;

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer.clone());

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    service.set_progress_channel(progress_tx);

    let outcome = service
        .run_search(Some(SearchRequest::default()), CancellationToken::new())
        .await
        .expect("search should complete");

    let summary = match outcome {
        SearchOutcome::Completed(summary) => summary,
        SearchOutcome::Cancelled => panic!("search was not cancelled"),
    };
    assert_eq!(summary.displayed, 2);
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.message, "Showing the most recent events.");
    assert!(!summary.clear_search_visible);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.generated, "16:22:13 EDT");

    // Every submission carries the fixed parameters.
    let submissions = state.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let request = &submissions[0]["provenance"]["request"];
    assert_eq!(request["maxResults"], json!(1000));
    assert_eq!(request["summarize"], json!(true));
    assert_eq!(request["incrementalResults"], json!(false));

    // Status polls repeat the summarize and incremental flags.
    let status_params = state.status_params.lock().unwrap();
    assert_eq!(status_params.len(), 1);
    assert_eq!(status_params[0].get("summarize").map(String::as_str), Some("true"));
    assert_eq!(
        status_params[0].get("incrementalResults").map(String::as_str),
        Some("false")
    );

    // The query is released even though it completed normally.
    assert_eq!(state.deletes.lock().unwrap().len(), 1);

    // Progress surfaced as reported by the service.
    assert_eq!(drain_progress(&mut progress_rx), vec![0, 40, 100]);

    // The view reached the renderer, newest event first.
    let views = renderer.views.lock().unwrap();
    assert_eq!(views.len(), 1);
    let ids: Vec<u64> = views[0].rows.iter().map(|row| row.event_id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert!(views[0].rows[0].event_time_millis.is_some());
}

#[tokio::test]
async fn capped_targeted_search_asks_for_refinement() {
    let (state, base_url) = spawn_mock(vec![finished(results_json(
        json!([event_json(1, "09/23/2016 10:00:00.000 EDT")]),
        40_000,
        "40,000",
    ))])
    .await;

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer.clone());

    let outcome = service
        .run_search(Some(targeted_request()), CancellationToken::new())
        .await
        .expect("search should complete");

    let summary = match outcome {
        SearchOutcome::Completed(summary) => summary,
        SearchOutcome::Cancelled => panic!("search was not cancelled"),
    };
    assert_eq!(
        summary.message,
        "Showing 1,000 of 40,000 events that match the specified query, please refine the search."
    );
    assert!(summary.clear_search_visible);

    // Finished on the submission response, so no status polls were needed.
    assert!(state.status_params.lock().unwrap().is_empty());
    assert_eq!(state.deletes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_while_a_poll_is_scheduled_skips_the_status_call() {
    // A long poll interval keeps the service in its waiting state until the
    // cancellation lands.
    let (state, base_url) = spawn_mock(vec![running(10)]).await;

    let config = test_config(&base_url, 30_000);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer.clone());

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    service.set_progress_channel(progress_tx);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = service
        .run_search(Some(SearchRequest::default()), cancel)
        .await
        .expect("cancellation is not an error");

    assert!(matches!(outcome, SearchOutcome::Cancelled));
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "cancellation must not wait out the poll interval"
    );

    // No further status call was made and nothing was rendered, but the
    // server side query was still released.
    assert!(state.status_params.lock().unwrap().is_empty());
    assert_eq!(state.deletes.lock().unwrap().len(), 1);
    assert!(renderer.views.lock().unwrap().is_empty());
    assert_eq!(drain_progress(&mut progress_rx), vec![0, 10]);
}

#[tokio::test]
async fn rejected_submission_fails_the_search() {
    let (state, base_url) = spawn_mock(Vec::new()).await;
    state.fail_submit.store(true, Ordering::SeqCst);

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer.clone());

    let err = service
        .run_search(Some(SearchRequest::default()), CancellationToken::new())
        .await
        .expect_err("submission failure must surface");

    match &err {
        SearchError::ApiError { status, message } => {
            assert_eq!(*status, 500);
            assert!(message.contains("unavailable"));
        }
        other => panic!("expected an api error, got {other:?}"),
    }
    assert!(err.is_remote());

    // No query existed, so nothing was polled or deleted.
    assert!(state.status_params.lock().unwrap().is_empty());
    assert!(state.deletes.lock().unwrap().is_empty());
    assert!(renderer.views.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_service_fails_the_search() {
    // Port zero is never listening, so the connection fails immediately.
    let config = test_config("http://127.0.0.1:0", 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer);

    let err = service
        .run_search(Some(SearchRequest::default()), CancellationToken::new())
        .await
        .expect_err("connection failure must surface");
    assert!(matches!(err, SearchError::HttpError(_)));
    assert!(err.is_remote());
}

#[tokio::test]
async fn service_errors_accompany_partial_results() {
    let mut results = results_json(
        json!([event_json(7, "09/23/2016 10:00:00.000 EDT")]),
        1,
        "1",
    );
    results["errors"] = json!(["node-3:8443 timed out during the query"]);
    let (state, base_url) = spawn_mock(vec![finished(results)]).await;

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer.clone());

    let outcome = service
        .run_search(Some(SearchRequest::default()), CancellationToken::new())
        .await
        .expect("errors do not fail a finished search");

    let summary = match outcome {
        SearchOutcome::Completed(summary) => summary,
        SearchOutcome::Cancelled => panic!("search was not cancelled"),
    };
    assert_eq!(
        summary.errors,
        vec!["node-3:8443 timed out during the query".to_string()]
    );
    // Partial results still render.
    assert_eq!(summary.displayed, 1);
    assert_eq!(renderer.views.lock().unwrap().len(), 1);
    assert_eq!(state.deletes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn node_scoped_search_forwards_the_node_on_every_call() {
    let (state, base_url) = spawn_mock(vec![
        running(50),
        finished(results_json(json!([]), 0, "0")),
    ])
    .await;

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer);

    let mut request = SearchRequest::default();
    request.cluster_node_id = Some("node-2".to_string());
    service
        .run_search(Some(request), CancellationToken::new())
        .await
        .expect("search should complete");

    let submissions = state.submissions.lock().unwrap();
    assert_eq!(
        submissions[0]["provenance"]["request"]["clusterNodeId"],
        json!("node-2")
    );

    let status_params = state.status_params.lock().unwrap();
    assert_eq!(
        status_params[0].get("clusterNodeId").map(String::as_str),
        Some("node-2")
    );

    let deletes = state.deletes.lock().unwrap();
    assert_eq!(
        deletes[0].1.get("clusterNodeId").map(String::as_str),
        Some("node-2")
    );
}

#[tokio::test]
async fn abandoned_query_is_released_before_the_next_submission() {
    let (state, base_url) = spawn_mock(vec![
        running(5),
        finished(results_json(json!([]), 0, "0")),
    ])
    .await;

    // Long poll interval so the first run parks in its waiting state.
    let config = test_config(&base_url, 30_000);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(300),
        service.run_search(Some(SearchRequest::default()), CancellationToken::new()),
    )
    .await;
    assert!(abandoned.is_err(), "first run should still be waiting");

    // The follow-up search must release query-1 before submitting query-2.
    service
        .run_search(None, CancellationToken::new())
        .await
        .expect("second search should complete");

    // Second run reuses the long interval config but finishes on submission.
    let deletes = state.deletes.lock().unwrap();
    let deleted_ids: Vec<&str> = deletes.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(deleted_ids, vec!["query-1", "query-2"]);
    assert_eq!(state.submissions.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn clearing_the_search_makes_the_next_run_blank() {
    let script = vec![
        finished(results_json(json!([]), 0, "0")),
        finished(results_json(json!([]), 0, "0")),
        finished(results_json(json!([]), 0, "0")),
        finished(results_json(json!([]), 0, "0")),
    ];
    let (state, base_url) = spawn_mock(script).await;

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer);

    // Run 1 caches the criteria; run 2 repeats them without restating them.
    service
        .run_search(Some(targeted_request()), CancellationToken::new())
        .await
        .expect("targeted search should complete");
    service
        .run_search(None, CancellationToken::new())
        .await
        .expect("repeat search should complete");

    // Run 3 after clearing equals run 4 with explicitly blank criteria.
    service.clear_search();
    assert!(service.last_request().is_none());
    service
        .run_search(None, CancellationToken::new())
        .await
        .expect("cleared search should complete");
    service
        .run_search(Some(SearchRequest::default()), CancellationToken::new())
        .await
        .expect("blank search should complete");

    let submissions = state.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 4);
    let request_of = |index: usize| &submissions[index]["provenance"]["request"];
    assert_eq!(request_of(0), request_of(1), "repeat run resends the cached criteria");
    assert_eq!(request_of(2), request_of(3), "cleared run equals an explicitly blank run");
    assert_ne!(request_of(0), request_of(2));
    assert!(request_of(2).get("searchTerms").is_none());
}

#[tokio::test]
async fn server_time_offset_is_captured_from_completed_searches() {
    let (_state, base_url) = spawn_mock(vec![finished(results_json(json!([]), 0, "0"))]).await;

    let config = test_config(&base_url, 50);
    let renderer = Arc::new(RecordingRenderer::default());
    let mut service = test_service(&config, renderer);

    assert!(service.server_time_offset().is_none());
    service
        .run_search(Some(SearchRequest::default()), CancellationToken::new())
        .await
        .expect("search should complete");
    assert_eq!(service.server_time_offset(), Some(-18_000_000));
}
