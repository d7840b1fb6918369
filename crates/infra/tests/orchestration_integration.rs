//! End-to-end orchestration tests against a mock HTTP server
//!
//! Exercises the whole stack as wired by `FabricClient::from_config`:
//! client-credentials token endpoint, reqwest transport, dispatcher retries,
//! operation polling and the batch tracker.

use std::time::{Duration, Instant};

use fabricflow_domain::{ApiRequest, FlowConfig, JobId, OperationOutcome, RunSummary};
use fabricflow_infra::FabricClient;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

fn config(server: &MockServer) -> FlowConfig {
    let mut config = FlowConfig::default();
    config.api.base_url = format!("{}/v1", server.uri());
    config.api.request_timeout_secs = 5;
    config.auth.authority_url = server.uri();
    config.auth.tenant_id = Some("tenant-1".into());
    config.auth.client_id = Some("deploy-app".into());
    config.auth.client_secret = Some("secret".into());
    config.retry.base_backoff_ms = 10;
    config.retry.max_backoff_secs = 1;
    config.polling.resource_interval_secs = 1;
    config.polling.job_interval_secs = 1;
    config.polling.max_wait_secs = 10;
    config
}

fn token_response(value: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token_type": "Bearer",
        "expires_in": 3600,
        "access_token": value
    }))
}

fn status(value: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": value }))
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("tok-1"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_item_follows_operation_to_result() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/v1/workspaces/w1/items"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/v1/operations/op-1", server.uri()))
                .insert_header("Retry-After", "1"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/op-1"))
        .respond_with(status("Running"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/op-1"))
        .respond_with(status("Succeeded"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/op-1/result"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "item-9", "type": "Notebook"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = FabricClient::from_config(config(&server)).expect("client");
    let request = ApiRequest::post("workspaces/w1/items")
        .with_json(&json!({"displayName": "nightly", "type": "Notebook"}))
        .unwrap();
    let outcome = client.execute_with_result("create notebook", request).await.unwrap();

    let body = outcome.body().expect("completed with body");
    assert_eq!(body["id"], "item-9");
}

#[tokio::test]
async fn rate_limited_request_waits_for_retry_after() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    let client = FabricClient::from_config(config(&server)).unwrap();
    let started = Instant::now();
    let listing: Value = client.get_json("workspaces").await.unwrap();

    assert_eq!(listing["value"], json!([]));
    assert!(started.elapsed() >= Duration::from_secs(1), "retried too early");
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("tok-1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_response("tok-2"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/capacities"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/capacities"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": ["c1"]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = FabricClient::from_config(config(&server)).unwrap();
    let capacities: Value = client.get_json("capacities").await.unwrap();
    assert_eq!(capacities["value"][0], "c1");
}

#[tokio::test]
async fn batch_records_every_job() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    // a: accepted, completes on first poll
    Mock::given(method("POST"))
        .and(path("/v1/items/a/jobs/instances"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/v1/items/a/jobs/instances/1", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items/a/jobs/instances/1"))
        .respond_with(status("Completed"))
        .mount(&server)
        .await;

    // b: rejected outright
    Mock::given(method("POST"))
        .and(path("/v1/items/b/jobs/instances"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"errorCode": "InvalidJobType", "message": "no such job"})),
        )
        .mount(&server)
        .await;

    // c: accepted, the run fails
    Mock::given(method("POST"))
        .and(path("/v1/items/c/jobs/instances"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/v1/items/c/jobs/instances/7", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items/c/jobs/instances/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Failed",
            "failureReason": {"errorCode": "NotebookFailed", "message": "cell 4 raised"}
        })))
        .mount(&server)
        .await;

    let client = FabricClient::from_config(config(&server)).unwrap();
    let jobs = ["a", "b", "c"]
        .iter()
        .map(|item| {
            let request = ApiRequest::post(format!("items/{item}/jobs/instances"));
            client.job(format!("run {item}"), request)
        })
        .collect();

    let records =
        client.tracker().run_batch(jobs, Duration::from_secs(10), Duration::from_secs(1)).await;

    assert_eq!(records.len(), 3);
    assert!(records[&JobId::new(0)].outcome.is_completed());
    assert_eq!(records[&JobId::new(0)].polls, 1);
    match &records[&JobId::new(1)].outcome {
        OperationOutcome::Failed { code, message } => {
            assert_eq!(code, "HTTP400");
            assert!(message.contains("InvalidJobType: no such job"), "got {message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(records[&JobId::new(1)].polls, 0);
    assert_eq!(
        records[&JobId::new(2)].outcome,
        OperationOutcome::failed("NotebookFailed", "cell 4 raised")
    );

    let summary = RunSummary::from_records(records.values());
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn vanished_status_endpoint_counts_as_completed() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/workspaces/w1"))
        .and(header("authorization", "Bearer pipeline-token"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/v1/operations/gone", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/operations/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.auth.tenant_id = None;
    config.auth.client_id = None;
    config.auth.client_secret = None;
    config.auth.token = Some("pipeline-token".into());

    let client = FabricClient::from_config(config).unwrap();
    let records = client
        .tracker()
        .run_sequential(vec![client.job("delete workspace", ApiRequest::delete("workspaces/w1"))])
        .await;

    assert!(records[0].outcome.is_completed());
    assert_eq!(records[0].polls, 1);
}
