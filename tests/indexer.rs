use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use pixel_live_feed::{
    AppState, build_router,
    config::{
        AuthConfig, Config, EndpointPaths, IndexerConfig, IndexerMode, LiveConfig, ServerConfig,
        UpstreamConfig,
    },
    error::{AppError, Result},
    live::{EventSink, LiveEvent},
    services::{
        indexer::{CycleOutcome, HistoryReplay, Indexer, IndexerSettings},
        node::{
            ArgumentDecoder, DecodeRequest, HistoryEntry, HistoryPage, HistorySource,
            StateSource,
        },
    },
};
use serde_json::{Value, json};
use tower::ServiceExt;

const CONTRACT: &str = "canvas-contract";

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            allow_origins: vec!["https://canvas.example".into()],
            max_concurrent_requests: 8,
            paths: EndpointPaths::default(),
        },
        auth: AuthConfig::default(),
        upstream: UpstreamConfig {
            contract_id: Some(CONTRACT.into()),
            feed_url: None,
            node_url: Some("http://node.invalid".into()),
            wallet_target: None,
            wallet_id: None,
            chain_id: "hathor:testnet".into(),
            decoder_url: Some("http://decoder.invalid".into()),
            decoder_cache_capacity: 16,
            request_timeout: Duration::from_secs(1),
        },
        indexer: IndexerConfig::default(),
        live: LiveConfig::default(),
    }
}

/// Reports stats but refuses every pixel page, so auto mode cannot trust the table.
struct RefusingState {
    paint_count: Mutex<u64>,
    unique_count: Mutex<u64>,
}

#[async_trait]
impl StateSource for RefusingState {
    async fn query(&self, calls: &[String], _fields: &[String]) -> Result<Value> {
        let paint_count = *self.paint_count.lock().unwrap();
        let unique_count = *self.unique_count.lock().unwrap();

        let mut results = serde_json::Map::new();
        for call in calls {
            let value = match call.as_str() {
                "get_stats()" => json!({"value": [paint_count, 0]}),
                "get_pixels_count()" => json!({"value": unique_count}),
                _ => json!({"errmsg": "page limit exceeded"}),
            };
            results.insert(call.clone(), value);
        }
        Ok(json!({"success": true, "calls": results}))
    }

    fn label(&self) -> &'static str {
        "refusing"
    }
}

#[derive(Default)]
struct FixedHistory {
    /// Newest first.
    entries: Mutex<Vec<HistoryEntry>>,
}

#[async_trait]
impl HistorySource for FixedHistory {
    async fn page(&self, after: Option<&str>) -> Result<HistoryPage> {
        let entries = self.entries.lock().unwrap();
        let start = match after {
            Some(after) => entries
                .iter()
                .position(|entry| entry.hash.as_deref() == Some(after))
                .map_or(entries.len(), |index| index + 1),
            None => 0,
        };
        Ok(HistoryPage {
            history: entries[start..].to_vec(),
            has_more: false,
        })
    }
}

#[derive(Default)]
struct BatchDecoder {
    args: HashMap<String, Vec<Value>>,
}

impl BatchDecoder {
    fn with(mut self, args: &str, xs: &[i64], ys: &[i64], colors: &[&str]) -> Self {
        self.args
            .insert(args.into(), vec![json!(xs), json!(ys), json!(colors)]);
        self
    }
}

#[async_trait]
impl ArgumentDecoder for BatchDecoder {
    async fn decode(&self, request: &DecodeRequest) -> Result<Vec<Value>> {
        self.args
            .get(&request.args)
            .cloned()
            .ok_or_else(|| AppError::Decode(format!("unknown args {}", request.args)))
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<LiveEvent>>>,
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: &LiveEvent) -> bool {
        self.events.lock().unwrap().push(event.clone());
        true
    }
}

fn paint_batch(hash: &str, args: &str) -> HistoryEntry {
    HistoryEntry {
        hash: Some(hash.into()),
        is_voided: Some(false),
        nc_method: Some("paint_batch".into()),
        nc_args: Some(args.into()),
        nc_address: Some("painter".into()),
        nc_blueprint_id: Some("blueprint".into()),
        ..HistoryEntry::default()
    }
}

#[tokio::test]
async fn auto_mode_falls_back_to_history_with_last_write_wins() {
    let app_state = AppState::new(test_config());
    let sink = RecordingSink::default();
    app_state.hub.register(Box::new(sink.clone())).unwrap();

    let state = Arc::new(RefusingState {
        paint_count: Mutex::new(2),
        unique_count: Mutex::new(5),
    });
    let history = Arc::new(FixedHistory::default());
    *history.entries.lock().unwrap() = vec![
        paint_batch("newer", "b2"),
        paint_batch("older", "b1"),
    ];
    let decoder = BatchDecoder::default()
        .with("b1", &[0, 1, 2], &[0, 0, 0], &["#111111", "#111111", "#111111"])
        .with("b2", &[2, 3, 4], &[0, 0, 0], &["#222222", "#222222", "#222222"])
        .with("b3", &[0], &[0], &["#333333"]);

    let indexer = Indexer::new(
        IndexerSettings {
            mode: IndexerMode::Auto,
            contract_id: CONTRACT.into(),
            page_size: 1000,
            page_calls: 4,
        },
        Some(state.clone() as Arc<dyn StateSource>),
        Some(HistoryReplay {
            source: history.clone(),
            decoder: Arc::new(decoder),
            network: "testnet".into(),
            contract_id: CONTRACT.into(),
        }),
        app_state.store.clone(),
        app_state.pending.clone(),
        app_state.hub.clone(),
    );

    assert_eq!(
        indexer.run_cycle().await.unwrap(),
        CycleOutcome::HistoryReplayed {
            entries: 2,
            full_refresh: true,
        }
    );
    assert!(sink.events.lock().unwrap().is_empty());

    let app = build_router(app_state.clone());
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/snapshot?format=map")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let snapshot: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap())
            .unwrap();
    assert_eq!(
        snapshot["pixels"],
        json!({
            "0:0": "#111111",
            "1:0": "#111111",
            "2:0": "#222222",
            "3:0": "#222222",
            "4:0": "#222222",
        })
    );
    assert_eq!(snapshot["unique_count"], json!(5));
    assert_eq!(snapshot["paint_count"], json!(2));

    assert_eq!(indexer.run_cycle().await.unwrap(), CycleOutcome::Unchanged);

    history.entries.lock().unwrap().insert(0, paint_batch("newest", "b3"));
    *state.paint_count.lock().unwrap() = 3;
    assert_eq!(
        indexer.run_cycle().await.unwrap(),
        CycleOutcome::HistoryReplayed {
            entries: 1,
            full_refresh: false,
        }
    );

    let events = sink.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    let LiveEvent::Paint(event) = &events[0] else {
        panic!("expected a confirmed paint, got {:?}", events[0]);
    };
    assert_eq!((event.x, event.y, event.color.as_str()), (0, 0, "#333333"));
    assert_eq!(event.tx_hash.as_deref(), Some("newest"));
    assert_eq!(event.sender.as_deref(), Some("painter"));
    assert_eq!(app_state.store.paint_count().await, 3);
}

#[tokio::test]
async fn from_config_skips_indexer_when_feed_is_configured() {
    let app_state = AppState::new(test_config());
    let mut config = test_config();
    config.upstream.feed_url = Some("wss://feed.invalid/websocket".into());

    let indexer = Indexer::from_config(
        &config,
        app_state.store.clone(),
        app_state.pending.clone(),
        app_state.hub.clone(),
    )
    .unwrap();
    assert!(indexer.is_none());

    config.indexer.force = true;
    let indexer = Indexer::from_config(
        &config,
        app_state.store.clone(),
        app_state.pending.clone(),
        app_state.hub.clone(),
    )
    .unwrap();
    assert!(indexer.is_some());
}
