//! Confirmed-transaction feed from the node websocket.

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::{AppError, Result},
    live::{BroadcastHub, LiveEvent, PaintSource},
    services::{canvas::CanvasStore, pending::PendingOverlay},
    utils::schedule::ScheduledTask,
};

pub mod backoff;
pub mod decode;

pub use backoff::Backoff;
pub use decode::{FeedCall, TxData, decode_tx_blob, extract_tx_data, parse_payload};

const TX_QUERY: &str = "tm.event='Tx'";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a connection ended without an error.
enum Closed {
    Shutdown,
    Remote,
}

pub struct FeedListener {
    url: String,
    contract_id: Option<String>,
    store: Arc<CanvasStore>,
    pending: Arc<PendingOverlay>,
    hub: Arc<BroadcastHub>,
    connect_timeout: Duration,
}

/// Drops any `#fragment`; an empty result means the feed is off.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let url = raw.split('#').next().unwrap_or_default().trim();
    (!url.is_empty()).then(|| url.to_string())
}

pub fn subscribe_message() -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "subscribe",
        "id": 1,
        "params": { "query": TX_QUERY },
    })
    .to_string()
}

impl FeedListener {
    pub fn new(
        url: String,
        contract_id: Option<String>,
        store: Arc<CanvasStore>,
        pending: Arc<PendingOverlay>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            url,
            contract_id,
            store,
            pending,
            hub,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bounds the websocket handshake; a stalled connect is retried with backoff.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// `None` when no feed URL is configured.
    pub fn from_config(
        config: &Config,
        store: Arc<CanvasStore>,
        pending: Arc<PendingOverlay>,
        hub: Arc<BroadcastHub>,
    ) -> Option<Self> {
        let Some(url) = config.upstream.feed_url.as_deref().and_then(sanitize_url) else {
            tracing::warn!("No feed URL configured; confirmed feed disabled");
            return None;
        };
        Some(
            Self::new(
                url,
                config.upstream.contract_id.clone(),
                store,
                pending,
                hub,
            )
            .with_connect_timeout(config.upstream.request_timeout),
        )
    }

    /// Without a configured contract everything is accepted; otherwise the ids must match.
    pub fn accepts_contract(&self, contract: Option<&str>) -> bool {
        match &self.contract_id {
            None => true,
            Some(expected) => contract == Some(expected.as_str()),
        }
    }

    /// Handles one raw feed frame. Returns how many paint events went out.
    pub async fn handle_message(&self, text: &str) -> usize {
        let Ok(message) = serde_json::from_str::<Value>(text) else {
            return 0;
        };
        let Some(TxData { tx_hash, blob }) = extract_tx_data(&message) else {
            return 0;
        };
        let Some(tx) = decode_tx_blob(&blob) else {
            tracing::debug!(tx_hash = ?tx_hash, "Undecodable transaction blob dropped");
            return 0;
        };
        self.apply_transaction(&tx, tx_hash).await
    }

    /// Applies a decoded transaction to the store and announces changed pixels.
    pub async fn apply_transaction(&self, tx: &Value, tx_hash: Option<String>) -> usize {
        let Some(call) = parse_payload(tx) else {
            return 0;
        };
        if !self.accepts_contract(call.contract.as_deref()) {
            return 0;
        }

        let source = PaintSource {
            sender: call.sender,
            tx_hash,
            contract: call.contract,
        };

        let mut sent = 0;
        for paint in &call.paints {
            if self.store.record_paint(paint.coord(), &paint.color).await {
                self.hub.broadcast(&LiveEvent::confirmed(paint, &source));
                sent += 1;
            }
        }

        let confirmed = self.pending.reconcile(&self.store).await;
        tracing::debug!(
            tx_hash = ?source.tx_hash,
            method = call.method.name(),
            paints = call.paints.len(),
            sent,
            confirmed,
            "Feed transaction applied"
        );
        sent
    }

    /// Connects, listens and reconnects with backoff until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let mut backoff = Backoff::default();

        loop {
            match self.listen(&token, &mut backoff).await {
                Ok(Closed::Shutdown) => break,
                Ok(Closed::Remote) => tracing::warn!("Feed closed, reconnecting"),
                Err(e) => tracing::warn!(error = %e, "Feed connection failed"),
            }

            let delay = backoff.next_delay();
            tracing::info!(delay_ms = delay.as_millis() as u64, "Waiting before feed reconnect");
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Feed listener stopped");
    }

    async fn listen(&self, token: &CancellationToken, backoff: &mut Backoff) -> Result<Closed> {
        let (socket, _) = tokio::select! {
            _ = token.cancelled() => return Ok(Closed::Shutdown),
            connected = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str())) => {
                connected.map_err(|_| {
                    AppError::Upstream(format!(
                        "Feed connect timed out after {}ms",
                        self.connect_timeout.as_millis()
                    ))
                })??
            }
        };
        backoff.reset();

        let (mut write, mut read) = socket.split();
        write.send(Message::text(subscribe_message())).await?;
        tracing::info!("Subscribed to transaction events");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!(error = %e, "Feed close frame not sent");
                    }
                    return Ok(Closed::Shutdown);
                }
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_message(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Ok(text) = std::str::from_utf8(&bytes) {
                            self.handle_message(text).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(Closed::Remote),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }

    pub fn spawn(self, token: &CancellationToken) -> ScheduledTask {
        ScheduledTask::spawn("feed", token, move |token| self.run(token))
    }
}
