use axum::response::sse::Event;
use serde::Serialize;
use serde_json::json;

use crate::codec::Paint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintStatus {
    Confirmed,
    Pending,
}

/// Where a paint came from; every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaintSource {
    pub sender: Option<String>,
    pub tx_hash: Option<String>,
    pub contract: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintEvent {
    pub x: i64,
    pub y: i64,
    pub color: String,
    pub status: PaintStatus,
    pub sender: Option<String>,
    pub tx_hash: Option<String>,
    pub contract: Option<String>,
}

impl PaintEvent {
    fn new(paint: &Paint, status: PaintStatus, source: &PaintSource) -> Self {
        Self {
            x: paint.x,
            y: paint.y,
            color: paint.color.clone(),
            status,
            sender: source.sender.clone(),
            tx_hash: source.tx_hash.clone(),
            contract: source.contract.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Hello,
    Paint(PaintEvent),
    Pending(PaintEvent),
    Ping { t: u64 },
}

impl LiveEvent {
    pub fn confirmed(paint: &Paint, source: &PaintSource) -> Self {
        Self::Paint(PaintEvent::new(paint, PaintStatus::Confirmed, source))
    }

    pub fn pending(paint: &Paint, source: &PaintSource) -> Self {
        Self::Pending(PaintEvent::new(paint, PaintStatus::Pending, source))
    }

    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Paint(_) => "paint",
            Self::Pending(_) => "pending",
            Self::Ping { .. } => "ping",
        }
    }

    /// JSON `data:` payload.
    pub fn data(&self) -> String {
        let encoded = match self {
            Self::Hello => serde_json::to_string(&json!({ "ok": true })),
            Self::Paint(event) | Self::Pending(event) => serde_json::to_string(event),
            Self::Ping { t } => serde_json::to_string(&json!({ "t": t })),
        };
        encoded.unwrap_or_else(|_| "{}".into())
    }

    pub fn to_sse(&self) -> Event {
        Event::default().event(self.name()).data(self.data())
    }
}
