//! Integration tests for the funnel REST API.
//!
//! Each test spins up a fake registration backend and the funnel routes on
//! random ports, then drives the funnel over HTTP with reqwest.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use coral_funnel::analytics::RecordingSink;
use coral_funnel::api::HttpRegistrationClient;
use coral_funnel::config::FunnelConfig;
use coral_funnel::funnel::{FunnelManager, FunnelRouteState, funnel_routes};
use coral_funnel::storage::{ANSWERS_SLOT, MemoryStorage, SlotStorage};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What the fake backend replies to `/register`.
#[derive(Clone)]
struct Backend {
    register_status: StatusCode,
    register_reply: Value,
    signin_reply: Value,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Backend {
    fn ok(link: &str) -> Self {
        Self {
            register_status: StatusCode::OK,
            register_reply: json!({"success": true, "user_id": "u-7", "account_created": true}),
            signin_reply: json!({"success": true, "magicLink": link, "user_id": "u-7"}),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn paths(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    fn body(&self, path: &str) -> Value {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
            .expect("call not recorded")
    }
}

async fn register(State(b): State<Backend>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    b.calls.lock().unwrap().push(("register".into(), body));
    (b.register_status, Json(b.register_reply.clone()))
}

async fn signin(State(b): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    b.calls.lock().unwrap().push(("signin".into(), body));
    Json(b.signin_reply.clone())
}

async fn serve(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Start backend + funnel. Returns (funnel base URL, storage).
async fn start(backend: Backend) -> (String, Arc<MemoryStorage>) {
    let backend_app = Router::new()
        .route("/register", post(register))
        .route("/signin", post(signin))
        .with_state(backend);
    let backend_port = serve(backend_app).await;

    let config = FunnelConfig {
        api_base_url: format!("http://127.0.0.1:{backend_port}"),
        advance_delay: Duration::ZERO,
        ..FunnelConfig::default()
    };
    let storage = Arc::new(MemoryStorage::new());
    let api = Arc::new(
        HttpRegistrationClient::new(config.api_base_url.clone(), Duration::from_secs(2)).unwrap(),
    );
    let manager = Arc::new(FunnelManager::new(
        &config,
        storage.clone(),
        api,
        Arc::new(RecordingSink::new()),
    ));
    manager.start_session().await.unwrap();

    let port = serve(funnel_routes(FunnelRouteState { manager })).await;
    (format!("http://127.0.0.1:{port}/api/funnel"), storage)
}

async fn post_json(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    (status, resp.json().await.unwrap())
}

async fn post_empty(base: &str, path: &str) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/{path}"))
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    (status, resp.json().await.unwrap())
}

/// Landing → Q1 "Right away" → Q2 {Homeschooling} → name "Alex".
async fn walk_to_email(base: &str) {
    let (status, view) = post_empty(base, "continue").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], 1);
    assert_eq!(view["screen"]["kind"], "single_select");

    let (_, view) = post_json(base, "select", json!({"index": 0})).await;
    assert_eq!(view["step"], 2);
    assert_eq!(view["screen"]["kind"], "multi_select");
    assert_eq!(view["screen"]["submit_enabled"], false);

    let (_, view) = post_json(base, "toggle", json!({"index": 1})).await;
    assert_eq!(view["screen"]["submit_enabled"], true);

    let (_, view) = post_empty(base, "submit-selection").await;
    assert_eq!(view["step"], 3);

    let (_, view) = post_json(base, "text", json!({"value": "Alex"})).await;
    assert_eq!(view["step"], 4);
    assert_eq!(view["screen"]["input_type"], "email");
    assert_eq!(view["screen"]["requires_token"], true);
}

#[tokio::test]
async fn scenario_a_full_funnel_reaches_thank_you() {
    timeout(TEST_TIMEOUT, async {
        let backend = Backend::ok("https://coral.example/magic/abc");
        let (base, storage) = start(backend.clone()).await;

        let view: Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(view["step"], 0);
        assert_eq!(view["screen"]["kind"], "landing");

        walk_to_email(&base).await;

        let (status, view) = post_json(
            &base,
            "email",
            json!({"email": "alex@example.com", "token": "captcha-token"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["display"]["state"], "submitted");
        assert_eq!(view["display"]["redirect_url"], "https://coral.example/magic/abc");
        assert_eq!(view["thank_you"]["redirect_after_ms"], 1800);

        assert_eq!(backend.paths(), vec!["register", "signin"]);
        let reg = backend.body("register");
        assert_eq!(reg["name"], "Alex");
        assert_eq!(reg["email"], "alex@example.com");
        assert_eq!(reg["source"], "ITW_Quiz_Page");
        assert_eq!(reg["how_soon"], "Right Away");
        assert_eq!(reg["preferred_topics"], "homeschooling");
        assert_eq!(reg["recaptchaToken"], "captcha-token");
        assert_eq!(backend.body("signin")["recaptchaToken"], "captcha-token");

        let stored = storage.get(ANSWERS_SLOT).await.unwrap().unwrap();
        let stored: Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored["q2"], "Homeschooling");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scenario_b_duplicate_email_stays_on_email_step() {
    timeout(TEST_TIMEOUT, async {
        let backend = Backend {
            register_status: StatusCode::CONFLICT,
            register_reply: json!({
                "success": false,
                "error": "Email already exists",
                "error_type": "duplicate_email"
            }),
            ..Backend::ok("https://unused")
        };
        let (base, _) = start(backend.clone()).await;
        walk_to_email(&base).await;

        let (status, body) = post_json(
            &base,
            "email",
            json!({"email": "alex@example.com", "token": "t"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "duplicate_email");
        assert_eq!(
            body["error"],
            "Email already registered. Please use a different email address."
        );
        assert_eq!(backend.paths(), vec!["register"]);

        let view: Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(view["display"]["state"], "step");
        assert_eq!(view["step"], 4);
        assert_eq!(view["notification"]["kind"], "duplicate_email");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_token_is_rejected_locally() {
    timeout(TEST_TIMEOUT, async {
        let backend = Backend::ok("https://x");
        let (base, _) = start(backend.clone()).await;
        walk_to_email(&base).await;

        let (status, body) = post_json(&base, "email", json!({"email": "alex@example.com"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
        assert!(backend.paths().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn back_and_invalid_actions() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start(Backend::ok("https://x")).await;

        let (status, body) = post_empty(&base, "back").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_action");

        post_empty(&base, "continue").await;
        post_json(&base, "select", json!({"index": 3})).await;
        let (status, view) = post_empty(&base, "back").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], 1);
        assert_eq!(view["answered"], 1);

        let (status, _) = post_json(&base, "select", json!({"index": 40})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn start_resets_the_session() {
    timeout(TEST_TIMEOUT, async {
        let (base, storage) = start(Backend::ok("https://x")).await;
        post_empty(&base, "continue").await;
        post_json(&base, "select", json!({"index": 0})).await;
        assert!(storage.get(ANSWERS_SLOT).await.unwrap().is_some());

        let (status, view) = post_empty(&base, "start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["step"], 0);
        assert_eq!(view["answered"], 0);
        assert!(storage.get(ANSWERS_SLOT).await.unwrap().is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start(Backend::ok("https://x")).await;
        post_empty(&base, "continue").await;

        let (status, body) = post_json(&base, "select", json!({"index": "first"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

        let resp = reqwest::Client::new()
            .post(format!("{base}/select"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["kind"], "invalid_request");

        let view: Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
        assert_eq!(view["step"], 1);
    })
    .await
    .expect("test timed out");
}
