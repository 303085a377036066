//! Collection runner tests
//!
//! - Sequential ordering, delays, pause/resume and stop
//! - Parallel completeness
//! - Variable reads per dispatch and stale results after reset

mod common;

use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{get, runner, runner_with_variables};
use reqdeck::http::HttpMethod;
use reqdeck::models::Request;
use reqdeck::results::ResultStatus;
use reqdeck::runner::{CollectionRunner, RunEvent, RunMode, RunState};
use reqdeck::{ReqdeckError, Variable, VariableStore};

async fn ok_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn requests(server: &MockServer, count: usize) -> Vec<Request> {
    (0..count)
        .map(|i| get(i as i64 + 1, &format!("{}/r{}", server.uri(), i)))
        .collect()
}

/// Poll until `check` holds; panics after two seconds
async fn wait_until(runner: &CollectionRunner, check: impl Fn(&CollectionRunner) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check(runner) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn spawn_start(
    runner: &CollectionRunner,
) -> tokio::task::JoinHandle<reqdeck::Result<reqdeck::results::RunSummary>> {
    let runner = runner.clone();
    tokio::spawn(async move { runner.start().await })
}

// ============================================================================
// Sequential mode
// ============================================================================

#[tokio::test]
async fn test_two_request_scenario() {
    let server = ok_server().await;
    let requests = vec![
        get(1, &format!("{}/a", server.uri())),
        Request::new(2, HttpMethod::Post, &format!("{}/b", server.uri())),
    ];
    let runner = runner(requests, RunMode::Sequential, Duration::ZERO);

    let summary = runner.start().await.unwrap();

    assert_eq!(summary.progress, 100.0);
    assert_eq!(summary.completed, 2);
    for result in &summary.results {
        assert_eq!(result.status, ResultStatus::Completed);
        assert!(result.duration_ms.unwrap() > 0.0);
        assert_eq!(result.response.as_ref().unwrap().status, 200);
    }
    assert_eq!(runner.state(), RunState::Completed);
    assert!(!runner.session().is_running);
}

#[tokio::test]
async fn test_sequential_order_and_delay() {
    let server = ok_server().await;
    let runner = runner(requests(&server, 3), RunMode::Sequential, Duration::from_millis(100));
    let mut events = runner.subscribe();

    let started = Instant::now();
    let summary = runner.start().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(summary.completed, 3);

    // Slot i settles before slot i + 1 is marked running
    let mut updates = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RunEvent::ResultUpdated { index, result } = event {
            updates.push((index, result.status));
        }
    }
    let expected: Vec<(usize, ResultStatus)> = (0..3)
        .flat_map(|i| [(i, ResultStatus::Running), (i, ResultStatus::Completed)])
        .collect();
    assert_eq!(updates, expected);

    let received = server.received_requests().await.unwrap();
    let paths: Vec<String> = received.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(paths, vec!["/r0", "/r1", "/r2"]);
}

#[tokio::test]
async fn test_failure_does_not_abort_run() {
    let server = ok_server().await;
    let mut requests = requests(&server, 2);
    requests.insert(1, get(9, common::REFUSED_URL));
    let runner = runner(requests, RunMode::Sequential, Duration::ZERO);

    let summary = runner.start().await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.results[1].is_failed());
    assert_eq!(summary.progress, 100.0);
}

#[tokio::test]
async fn test_pause_holds_next_dispatch() {
    let server = ok_server().await;
    let runner = runner(requests(&server, 3), RunMode::Sequential, Duration::from_millis(200));

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.results()[0].is_completed()).await;
    runner.pause().unwrap();
    assert_eq!(runner.state(), RunState::Paused);
    assert!(runner.session().is_paused);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(runner.results()[1].status, ResultStatus::Pending);

    let resumed = Instant::now();
    runner.resume().unwrap();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.completed, 3);
    assert_eq!(runner.state(), RunState::Completed);
    // The remaining delays still run in full after the pause
    assert!(resumed.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_stop_prevents_further_dispatch() {
    let server = ok_server().await;
    let runner = runner(requests(&server, 3), RunMode::Sequential, Duration::from_millis(300));

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.results()[0].is_completed()).await;
    runner.stop().unwrap();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(runner.state(), RunState::Stopped);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pending, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // A finished run must be reset before it starts again
    assert!(matches!(
        runner.start().await,
        Err(ReqdeckError::InvalidTransition { .. })
    ));
    runner.reset();
    assert_eq!(runner.progress(), 0.0);
    assert!(runner.results().iter().all(|r| r.status == ResultStatus::Pending));
}

#[tokio::test]
async fn test_variables_read_at_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut store = VariableStore::new();
    store.set(Variable::environment("base", &server.uri()));
    store.set(Variable::environment("version", "v1"));
    let requests = vec![get(1, "{{base}}/{{version}}/a"), get(2, "{{base}}/{{version}}/b")];
    let runner = runner_with_variables(
        requests,
        RunMode::Sequential,
        Duration::from_millis(300),
        store,
    );

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.results()[0].is_completed()).await;
    runner
        .variables()
        .write()
        .unwrap()
        .set(Variable::environment("version", "v2"));
    handle.await.unwrap().unwrap();

    let received = server.received_requests().await.unwrap();
    let paths: Vec<String> = received.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(paths, vec!["/v1/a", "/v2/b"]);
}

#[tokio::test]
async fn test_reset_discards_late_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;

    let runner = runner(
        vec![get(1, &format!("{}/slow", server.uri()))],
        RunMode::Sequential,
        Duration::ZERO,
    );

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.results()[0].status == ResultStatus::Running).await;
    runner.reset();
    handle.await.unwrap().unwrap();

    // Give the in-flight response time to land
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(runner.state(), RunState::Idle);
    assert_eq!(runner.results()[0].status, ResultStatus::Pending);
    assert_eq!(runner.progress(), 0.0);
}

#[tokio::test]
async fn test_options_locked_while_running() {
    let server = ok_server().await;
    let runner = runner(requests(&server, 2), RunMode::Sequential, Duration::from_millis(300));

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.state() == RunState::Running).await;
    let options = runner.options();
    assert!(runner.set_options(options).is_err());
    runner.stop().unwrap();
    handle.await.unwrap().unwrap();
    assert!(runner.set_options(options).is_ok());
}

// ============================================================================
// Parallel mode
// ============================================================================

#[tokio::test]
async fn test_parallel_completeness() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let mut requests = requests(&server, 5);
    requests.push(get(99, common::REFUSED_URL));
    let runner = runner(requests, RunMode::Parallel, Duration::from_secs(10));

    let started = Instant::now();
    let summary = runner.start().await.unwrap();

    // Dispatched together, and the configured delay is not applied
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(summary.results.len(), 6);
    assert!(summary.results.iter().all(|r| r.status.is_settled()));
    let mut ids: Vec<i64> = summary.results.iter().map(|r| r.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 99]);
    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.progress, 100.0);
}

#[tokio::test]
async fn test_pause_rejected_in_parallel_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let runner = runner(requests(&server, 2), RunMode::Parallel, Duration::ZERO);
    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.state() == RunState::Running).await;

    assert!(matches!(
        runner.pause(),
        Err(ReqdeckError::InvalidTransition { action: "pause", .. })
    ));
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.completed, 2);
}

#[tokio::test]
async fn test_stop_while_paused() {
    let server = ok_server().await;
    let runner = runner(requests(&server, 3), RunMode::Sequential, Duration::from_millis(200));

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.results()[0].is_completed()).await;
    runner.pause().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let stopped = Instant::now();
    runner.stop().unwrap();
    let summary = handle.await.unwrap().unwrap();

    assert!(stopped.elapsed() < Duration::from_millis(150));
    assert_eq!(runner.state(), RunState::Stopped);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pending, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_in_flight_result_recorded_after_stop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let runner = runner(
        vec![get(1, &format!("{}/slow", server.uri()))],
        RunMode::Sequential,
        Duration::ZERO,
    );

    let handle = spawn_start(&runner);
    wait_until(&runner, |r| r.results()[0].status == ResultStatus::Running).await;
    runner.stop().unwrap();
    handle.await.unwrap().unwrap();

    // Same generation: the response still lands once it arrives
    wait_until(&runner, |r| r.results()[0].is_completed()).await;
    assert_eq!(runner.state(), RunState::Stopped);
    assert_eq!(runner.progress(), 100.0);
}
