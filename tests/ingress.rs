use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};
use futures::StreamExt;
use pixel_live_feed::{
    AppState, build_router,
    config::{
        AuthConfig, Config, EndpointPaths, IndexerConfig, LiveConfig, ServerConfig,
        UpstreamConfig,
    },
    live::{EventSink, LiveEvent, PaintStatus},
    services::feed::FeedListener,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const CONTRACT: &str = "canvas-contract";
const SECRET: &str = "s3cret";

fn test_config(shared_secret: Option<&str>) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            allow_origins: vec!["*".into()],
            max_concurrent_requests: 64,
            paths: EndpointPaths::default(),
        },
        auth: AuthConfig {
            shared_secret: shared_secret.map(str::to_string),
            ..AuthConfig::default()
        },
        upstream: UpstreamConfig {
            contract_id: Some(CONTRACT.into()),
            feed_url: None,
            node_url: None,
            wallet_target: None,
            wallet_id: None,
            chain_id: String::new(),
            decoder_url: None,
            decoder_cache_capacity: 16,
            request_timeout: Duration::from_secs(1),
        },
        indexer: IndexerConfig::default(),
        live: LiveConfig::default(),
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<LiveEvent>>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: &LiveEvent) -> bool {
        self.events.lock().unwrap().push(event.clone());
        true
    }
}

struct Harness {
    state: AppState,
    app: Router,
    sink: RecordingSink,
}

impl Harness {
    fn new(shared_secret: Option<&str>) -> Self {
        let state = AppState::new(test_config(shared_secret));
        let sink = RecordingSink::default();
        state.hub.register(Box::new(sink.clone())).unwrap();
        let app = build_router(state.clone());
        Self { state, app, sink }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn post_pending(&self, uri: &str, body: impl Into<Body>) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn pending_paint_is_broadcast_and_listed_separately() {
    let harness = Harness::new(None);

    let response = harness
        .post_pending(
            "/pending",
            json!({"paints": [{"x": 2, "y": 3, "color": "#ABCDEF"}], "txId": "tx1", "sender": "alice"})
                .to_string(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await, json!({"ok": true, "sent": 1}));

    let events = harness.sink.events();
    assert_eq!(events.len(), 1);
    let LiveEvent::Pending(event) = &events[0] else {
        panic!("expected a pending event, got {:?}", events[0]);
    };
    assert_eq!((event.x, event.y), (2, 3));
    assert_eq!(event.color, "#abcdef");
    assert_eq!(event.status, PaintStatus::Pending);
    assert_eq!(event.tx_hash.as_deref(), Some("tx1"));
    assert_eq!(event.contract.as_deref(), Some(CONTRACT));

    let snapshot = json_body(harness.get("/snapshot").await).await;
    assert_eq!(snapshot["ok"], json!(true));
    assert_eq!(snapshot["contract"], json!(CONTRACT));
    assert_eq!(snapshot["pixels"], json!([]));
    assert_eq!(snapshot["pending"][0]["txId"], json!("tx1"));
    assert_eq!(
        snapshot["pending"][0]["paints"],
        json!([{"x": 2, "y": 3, "color": "#abcdef"}])
    );
}

#[tokio::test]
async fn confirmed_feed_paint_clears_the_pending_entry() {
    let harness = Harness::new(None);
    harness
        .post_pending(
            "/pending",
            json!({"paints": [{"x": 2, "y": 3, "color": "#abcdef"}], "txId": "tx1"}).to_string(),
        )
        .await;
    assert_eq!(harness.state.pending.len().await, 1);

    let feed = FeedListener::new(
        "ws://feed.invalid".into(),
        Some(CONTRACT.into()),
        harness.state.store.clone(),
        harness.state.pending.clone(),
        harness.state.hub.clone(),
    );
    let tx = json!({
        "payload": {
            "function": "paint",
            "contract": CONTRACT,
            "sender": "alice",
            "kwargs": {"x": 2, "y": 3, "color": "#abcdef"},
        }
    });
    assert_eq!(feed.apply_transaction(&tx, Some("tx1".into())).await, 1);

    let snapshot = json_body(harness.get("/snapshot?format=map").await).await;
    assert_eq!(snapshot["pixels"], json!({"2:3": "#abcdef"}));
    assert_eq!(snapshot["pending"], json!([]));
    assert_eq!(snapshot["paint_count"], json!(1));
    assert_eq!(snapshot["unique_count"], json!(1));

    let names: Vec<_> = harness.sink.events().iter().map(LiveEvent::name).collect();
    assert_eq!(names, vec!["pending", "paint"]);
}

#[tokio::test]
async fn pending_without_tx_id_is_broadcast_but_not_tracked() {
    let harness = Harness::new(None);
    let response = harness
        .post_pending(
            "/pending",
            json!({"paints": [{"x": 1, "y": 1, "color": "#fff"}, {"x": "bad", "y": 1, "color": "#000"}]})
                .to_string(),
        )
        .await;

    assert_eq!(json_body(response).await, json!({"ok": true, "sent": 1}));
    assert!(harness.state.pending.is_empty().await);
    assert_eq!(harness.sink.events().len(), 1);
}

#[tokio::test]
async fn pending_requires_the_shared_secret_when_configured() {
    let harness = Harness::new(Some(SECRET));
    let body = json!({"paints": [{"x": 0, "y": 0, "color": "#000"}]}).to_string();

    let response = harness.post_pending("/pending", body.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"ok": false, "error": "Unauthorized"})
    );

    let response = harness
        .post_pending("/pending?secret=wrong", body.clone())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = harness
        .post_pending(&format!("/pending?secret={SECRET}"), body.clone())
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let request = Request::builder()
        .method("POST")
        .uri("/pending")
        .header("x-live-feed-secret", SECRET)
        .body(Body::from(body))
        .unwrap();
    assert_eq!(harness.send(request).await.status(), StatusCode::ACCEPTED);

    // Reads stay open.
    assert_eq!(harness.get("/snapshot").await.status(), StatusCode::OK);
    assert_eq!(harness.sink.events().len(), 2);
}

#[tokio::test]
async fn malformed_pending_bodies_are_rejected() {
    let harness = Harness::new(None);

    let response = harness.post_pending("/pending", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"ok": false, "error": "Invalid JSON"})
    );

    for body in ["", "{}", r#"{"paints": []}"#, r#"{"paints": {"x": 1}}"#] {
        let response = harness.post_pending("/pending", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(json_body(response).await["error"], json!("Missing paints"));
    }

    assert!(harness.sink.events().is_empty());
}

#[tokio::test]
async fn oversized_pending_body_is_rejected() {
    let harness = Harness::new(None);
    let body = vec![b' '; 256 * 1024 + 1];

    let response = harness.post_pending("/pending", body).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(harness.sink.events().is_empty());
}

#[tokio::test]
async fn pending_for_another_contract_is_ignored() {
    let harness = Harness::new(None);
    let response = harness
        .post_pending(
            "/pending",
            json!({"paints": [{"x": 1, "y": 1, "color": "#fff"}], "contract": "other", "txId": "tx2"})
                .to_string(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        json_body(response).await,
        json!({"ok": true, "ignored": true})
    );
    assert!(harness.sink.events().is_empty());
    assert!(harness.state.pending.is_empty().await);
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let harness = Harness::new(Some(SECRET));

    let response = harness.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"ok": true}));

    let response = harness.get("/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({"ok": false, "error": "Not found"})
    );
}

#[tokio::test]
async fn live_stream_opens_with_hello_and_unregisters_on_drop() {
    let harness = Harness::new(None);
    assert_eq!(harness.state.hub.subscriber_count(), 1);

    let response = harness.get("/live").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );
    assert_eq!(harness.state.hub.subscriber_count(), 2);

    let mut stream = response.into_body().into_data_stream();
    let first = stream.next().await.unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(first.contains("event: hello"), "{first}");
    assert!(first.contains(r#"data: {"ok":true}"#), "{first}");

    drop(stream);
    assert_eq!(harness.state.hub.subscriber_count(), 1);
}

#[tokio::test]
async fn live_stream_is_refused_after_close() {
    let harness = Harness::new(None);
    harness.state.hub.close();

    let response = harness.get("/live").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
