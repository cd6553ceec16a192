//! End-to-end tests for the gateway over a real TCP listener.
//!
//! Uses the in-memory stub runtime so no Docker daemon is needed.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use secrecy::SecretString;
use serde_json::Value;

use remotedocker::auth::CredentialCodec;
use remotedocker::gateway::{GatewayApi, GatewayState};
use remotedocker::runtime::ComposeRunner;
use remotedocker::testing::{ScriptStep, StubRuntime};

const SECRET: &str = "integration-secret-0123456789abcdef";

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

struct TestServer {
    base: String,
    codec: Arc<CredentialCodec>,
    runtime: Arc<StubRuntime>,
    state: GatewayState,
    _shutdown: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn token(&self) -> String {
        self.codec.issue("integration", None).unwrap().token
    }
}

async fn start_test_server() -> TestServer {
    let codec = Arc::new(CredentialCodec::new(
        &SecretString::from(SECRET.to_string()),
        Duration::from_secs(3600),
    ));
    let runtime = Arc::new(StubRuntime::new());
    let state = GatewayState::new(codec.clone(), runtime.clone(), ComposeRunner::default());

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (bound, _handle) = GatewayApi::start(state.clone(), addr, async {
        let _ = rx.await;
    })
    .await
    .expect("Failed to start test server");

    TestServer {
        base: format!("http://{}", bound),
        codec,
        runtime,
        state,
        _shutdown: tx,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

fn context_form() -> Form {
    Form::new().part(
        "context",
        Part::bytes(b"fake build context".to_vec()).file_name("context.tar"),
    )
}

async fn submit(server: &TestServer, form: Form) -> String {
    let resp = client()
        .post(server.url("/build"))
        .bearer_auth(server.token())
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Build started");
    body["build_id"].as_str().unwrap().to_string()
}

async fn poll(server: &TestServer, build_id: &str) -> (StatusCode, Value) {
    let resp = client()
        .get(server.url(&format!("/builds/{}/logs", build_id)))
        .bearer_auth(server.token())
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn wait_for_terminal(server: &TestServer, build_id: &str) -> Value {
    for _ in 0..400 {
        let (status, body) = poll(server, build_id).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("build {} did not finish", build_id);
}

// ---------------------------------------------------------------------------
// Build lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn build_completes_with_logs_and_image() {
    let server = start_test_server().await;
    server.runtime.push_build(vec![
        ScriptStep::log("Step 1/2 : FROM alpine"),
        ScriptStep::log("Step 2/2 : RUN echo hi"),
        ScriptStep::success("sha256:feedbeef"),
    ]);

    let build_id = submit(&server, context_form().text("tag", "demo:1")).await;
    let done = wait_for_terminal(&server, &build_id).await;

    assert_eq!(done["build_id"], build_id.as_str());
    assert_eq!(done["status"], "completed");
    assert_eq!(
        done["logs"],
        serde_json::json!(["Step 1/2 : FROM alpine", "Step 2/2 : RUN echo hi"])
    );
    assert_eq!(done["image_id"], "sha256:feedbeef");
    assert!(done["error"].is_null());

    // Terminal snapshots do not change.
    let (_, again) = poll(&server, &build_id).await;
    assert_eq!(again["status"], done["status"]);
    assert_eq!(again["image_id"], done["image_id"]);
    assert_eq!(again["logs"], done["logs"]);
}

#[tokio::test]
async fn missing_dockerfile_fails_build() {
    let server = start_test_server().await;
    server.runtime.push_build(vec![ScriptStep::failure(
        vec!["Sending build context to Docker daemon"],
        "Cannot locate specified Dockerfile: Dockerfile.missing",
    )]);

    let build_id = submit(&server, context_form().text("dockerfile", "Dockerfile.missing")).await;
    let done = wait_for_terminal(&server, &build_id).await;

    assert_eq!(done["status"], "failed");
    assert_eq!(
        done["error"],
        "Cannot locate specified Dockerfile: Dockerfile.missing"
    );
    assert!(done["image_id"].is_null());
    assert_eq!(server.runtime.build_requests()[0].dockerfile, "Dockerfile.missing");
}

#[tokio::test]
async fn immediate_poll_never_misses() {
    let server = start_test_server().await;
    let gate = server.runtime.hold_builds();

    let build_id = submit(&server, context_form()).await;
    let (status, body) = poll(&server, &build_id).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["status"] == "queued" || body["status"] == "running");

    gate.add_permits(1);
    wait_for_terminal(&server, &build_id).await;
}

#[tokio::test]
async fn unknown_build_id_is_not_found() {
    let server = start_test_server().await;
    let (status, body) = poll(&server, &uuid::Uuid::new_v4().to_string()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Build ID not found");
}

#[tokio::test]
async fn logs_only_grow_between_polls() {
    let server = start_test_server().await;
    let mut script = Vec::new();
    for i in 0..200 {
        script.push(ScriptStep::log(format!("line {}", i)));
        script.push(ScriptStep::Yield);
    }
    script.push(ScriptStep::success("sha256:long"));
    server.runtime.push_build(script);

    let build_id = submit(&server, context_form()).await;

    let mut previous: Vec<Value> = Vec::new();
    loop {
        let (_, body) = poll(&server, &build_id).await;
        let logs = body["logs"].as_array().unwrap().clone();
        assert!(logs.len() >= previous.len());
        assert_eq!(&logs[..previous.len()], &previous[..]);
        previous = logs;
        if body["status"] == "completed" {
            break;
        }
    }
    assert_eq!(previous.len(), 200);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_builds_get_distinct_ids_and_ordered_logs() {
    let server = Arc::new(start_test_server().await);
    const BUILDS: usize = 12;
    const LINES: usize = 20;

    for b in 0..BUILDS {
        let mut script: Vec<ScriptStep> = (0..LINES)
            .flat_map(|l| [ScriptStep::log(format!("b{} l{}", b, l)), ScriptStep::Yield])
            .collect();
        script.push(ScriptStep::success(format!("sha256:{}", b)));
        server.runtime.push_build(script);
    }

    let mut tasks = Vec::new();
    for _ in 0..BUILDS {
        let server = server.clone();
        tasks.push(tokio::spawn(async move { submit(&server, context_form()).await }));
    }
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), BUILDS);

    for id in &ids {
        let done = wait_for_terminal(&server, id).await;
        assert_eq!(done["status"], "completed");
        let logs: Vec<String> = done["logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l.as_str().unwrap().to_string())
            .collect();
        assert_eq!(logs.len(), LINES);
        let prefix = logs[0].split(' ').next().unwrap().to_string();
        for (l, line) in logs.iter().enumerate() {
            assert_eq!(line, &format!("{} l{}", prefix, l));
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expired_token_is_rejected_without_side_effects() {
    let server = start_test_server().await;
    let stale = chrono::Utc::now() - chrono::TimeDelta::days(31);
    let expired = server
        .codec
        .issue_at("integration", Some(Duration::from_secs(60)), stale)
        .unwrap()
        .token;

    let resp = client()
        .post(server.url("/build"))
        .bearer_auth(&expired)
        .multipart(context_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["www-authenticate"], "Bearer");
    assert!(server.state.registry().is_empty().await);
    assert!(server.runtime.build_requests().is_empty());
}

#[tokio::test]
async fn token_from_another_key_is_rejected() {
    let server = start_test_server().await;
    let foreign = CredentialCodec::new(
        &SecretString::from("some-other-secret-0123456789abcdef".to_string()),
        Duration::from_secs(3600),
    )
    .issue("intruder", None)
    .unwrap()
    .token;

    let resp = client()
        .get(server.url("/version"))
        .bearer_auth(&foreign)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client().get(server.url("/version")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_reaches_pass_through_routes() {
    let server = start_test_server().await;
    let token = server.token();

    let resp = client()
        .post(server.url("/images/pull"))
        .bearer_auth(&token)
        .json(&serde_json::json!({"repository": "nginx", "tag": "1.27"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let images: Value = client()
        .get(server.url("/images"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(images[0]["tags"], serde_json::json!(["nginx:1.27"]));
}
