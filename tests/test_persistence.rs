//! Storage backend client, run poller and script autosave tests

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reqdeck::http::HttpMethod;
use reqdeck::models::Request;
use reqdeck::persistence::{
    ApiClient, RemoteRunStatus, RunPoller, RunRequest, ScriptAutosave, ScriptEdit,
};
use reqdeck::runner::RunMode;
use reqdeck::{ReqdeckError, VariableScope};

async fn client(server: &MockServer) -> ApiClient {
    ApiClient::with_timeout(&format!("{}/api", server.uri()), "user-1", Duration::from_secs(2))
        .unwrap()
}

// ============================================================================
// REST endpoints
// ============================================================================

#[tokio::test]
async fn test_list_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collections"))
        .and(query_param("userId", "user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": [
                {"id": 1, "name": "Users", "requests": [
                    {"id": 10, "name": "List", "method": "GET", "url": "http://x/users"}
                ]},
                {"id": 2, "name": "Empty"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let collections = client(&server).await.list_collections().await.unwrap();

    assert_eq!(collections.len(), 2);
    assert_eq!(collections[0].requests[0].method, HttpMethod::Get);
    assert!(collections[1].requests.is_empty());
}

#[tokio::test]
async fn test_create_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/requests"))
        .and(query_param("userId", "user-1"))
        .and(body_partial_json(json!({
            "name": "Create user",
            "method": "POST",
            "url": "http://x/users",
            "collection_id": 4
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "request": {"id": 77, "name": "Create user", "method": "POST", "url": "http://x/users", "collection_id": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = Request::new(0, HttpMethod::Post, "http://x/users").with_name("Create user");
    request.collection_id = Some(4);
    let created = client(&server).await.create_request(&request).await.unwrap();

    assert_eq!(created.id, 77);
    assert_eq!(created.collection_id, Some(4));
}

#[tokio::test]
async fn test_update_request_accepts_bare_reply() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/requests/5"))
        .and(body_partial_json(json!({"url": "http://x/v2", "pre_request_script": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5, "name": "Renamed", "method": "GET", "url": "http://x/v2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(5, HttpMethod::Get, "http://x/v2").with_name("Renamed");
    let updated = client(&server).await.update_request(&request).await.unwrap();

    assert_eq!(updated.name, "Renamed");
}

#[tokio::test]
async fn test_list_variables_are_environment_scoped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "variables": [{"id": 1, "variable_key": "host", "value": "api.local"}]
        })))
        .mount(&server)
        .await;

    let variables = client(&server).await.list_variables().await.unwrap();

    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].key, "host");
    assert_eq!(variables[0].scope, VariableScope::Environment);
}

#[tokio::test]
async fn test_start_run_sends_user_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/collections/3/run"))
        .and(body_partial_json(json!({
            "executionMode": "sequential",
            "delayBetweenRequests": 500,
            "userId": "user-1"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"runId": 12, "status": "running"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let run = RunRequest {
        execution_mode: RunMode::Sequential,
        delay_between_requests: 500,
        environment: None,
        variables: Vec::new(),
    };
    let started = client(&server).await.start_run(3, &run).await.unwrap();

    assert_eq!(started.run_id, "12");
    assert_eq!(started.status, RemoteRunStatus::Running);
}

#[tokio::test]
async fn test_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/collections"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Name is required"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .create_collection("", None)
        .await
        .unwrap_err();

    match err {
        ReqdeckError::Persistence(message) => {
            assert_eq!(message, "Name is required (HTTP 400)");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_error_without_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server).await.list_collections().await.unwrap_err();
    assert!(err.to_string().contains("An error occurred (HTTP 500)"));
}

#[tokio::test]
async fn test_unreachable_backend() {
    let client =
        ApiClient::with_timeout("http://127.0.0.1:9/api", "u", Duration::from_secs(2)).unwrap();
    assert!(matches!(
        client.list_variables().await,
        Err(ReqdeckError::Persistence(_))
    ));
}

// ============================================================================
// Run polling
// ============================================================================

#[tokio::test]
async fn test_poller_stops_on_terminal_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collections/3/runs/12"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "running", "results": []})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/collections/3/runs/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "results": [{"requestId": 1, "status": 200}]
        })))
        .mount(&server)
        .await;

    let (poller, mut reports) = RunPoller::spawn(
        client(&server).await,
        3,
        "12".to_string(),
        Duration::from_millis(50),
    );

    let mut statuses = Vec::new();
    while let Some(report) = reports.recv().await {
        let report = report.unwrap();
        statuses.push(report.status);
        if report.status == RemoteRunStatus::Completed {
            assert_eq!(report.results.len(), 1);
        }
    }

    assert_eq!(
        statuses,
        vec![RemoteRunStatus::Running, RemoteRunStatus::Running, RemoteRunStatus::Completed]
    );
    poller.join().await;
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_poller_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .mount(&server)
        .await;

    let (poller, mut reports) = RunPoller::spawn(
        client(&server).await,
        3,
        "12".to_string(),
        Duration::from_millis(50),
    );
    assert!(reports.recv().await.unwrap().is_ok());
    poller.cancel();
    poller.join().await;

    // Drain what was queued before the cancel; the channel then closes
    while reports.recv().await.is_some() {}
}

#[tokio::test]
async fn test_poller_zero_interval_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collections/3/runs/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failed"})))
        .expect(1)
        .mount(&server)
        .await;

    let (poller, mut reports) =
        RunPoller::spawn(client(&server).await, 3, "12".to_string(), Duration::ZERO);

    let report = reports.recv().await.unwrap().unwrap();
    assert_eq!(report.status, RemoteRunStatus::Failed);
    assert!(reports.recv().await.is_none());
    poller.join().await;
}

// ============================================================================
// Script autosave
// ============================================================================

#[tokio::test]
async fn test_autosave_debounces_bursts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/requests/scripts"))
        .and(body_json(json!({
            "requestId": 8,
            "preRequestScript": "console.log(3)",
            "postRequestScript": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (autosave, mut failures) =
        ScriptAutosave::spawn(client(&server).await, Duration::from_millis(100));
    for i in 1..=3 {
        autosave.edit(ScriptEdit {
            request_id: 8,
            pre_request_script: format!("console.log({})", i),
            post_request_script: String::new(),
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    autosave.flush().await.unwrap();
    assert!(failures.recv().await.is_none());
}

#[tokio::test]
async fn test_autosave_flushes_on_request_switch_and_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/requests/scripts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let (autosave, _failures) =
        ScriptAutosave::spawn(client(&server).await, Duration::from_secs(30));
    autosave.edit(ScriptEdit {
        request_id: 1,
        pre_request_script: "a".to_string(),
        post_request_script: String::new(),
    });
    autosave.edit(ScriptEdit {
        request_id: 2,
        pre_request_script: "b".to_string(),
        post_request_script: String::new(),
    });
    autosave.flush().await.unwrap();

    let received = server.received_requests().await.unwrap();
    let ids: Vec<i64> = received
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["requestId"].as_i64().unwrap()
        })
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_autosave_reports_background_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/requests/scripts"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "db down"})))
        .expect(1)
        .mount(&server)
        .await;

    let (autosave, mut failures) =
        ScriptAutosave::spawn(client(&server).await, Duration::from_millis(50));
    autosave.edit(ScriptEdit {
        request_id: 3,
        pre_request_script: "x".to_string(),
        post_request_script: String::new(),
    });

    let failure = failures.recv().await.unwrap();
    assert_eq!(failure.request_id, 3);
    assert_eq!(failure.error.to_string(), "Persistence error: db down (HTTP 500)");
    autosave.flush().await.unwrap();
}

#[tokio::test]
async fn test_autosave_flush_returns_final_write_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/requests/scripts"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "db down"})))
        .expect(1)
        .mount(&server)
        .await;

    let (autosave, mut failures) =
        ScriptAutosave::spawn(client(&server).await, Duration::from_secs(30));
    autosave.edit(ScriptEdit {
        request_id: 4,
        pre_request_script: "y".to_string(),
        post_request_script: String::new(),
    });

    match autosave.flush().await {
        Err(ReqdeckError::Persistence(message)) => assert_eq!(message, "db down (HTTP 500)"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(failures.recv().await.is_none());
}
