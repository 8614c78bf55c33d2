use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    codec::Paint,
    services::{
        canvas::CanvasSnapshot,
        pending::{PendingSnapshotEntry, normalize_paints},
    },
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub ok: bool,
    pub contract: Option<String>,
    #[serde(flatten)]
    pub canvas: CanvasSnapshot,
    pub pending: Vec<PendingSnapshotEntry>,
}

#[derive(Debug, Serialize)]
pub struct PendingAccepted {
    pub ok: bool,
    pub sent: usize,
}

#[derive(Debug, Serialize)]
pub struct PendingIgnored {
    pub ok: bool,
    pub ignored: bool,
}

/// A client announcement of paints it has just submitted on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub paints: Vec<Paint>,
    /// Number of raw items received, well-formed or not.
    pub submitted: usize,
    pub contract: Option<String>,
    pub sender: Option<String>,
    pub tx_id: Option<String>,
}

impl PendingSubmission {
    /// `None` when the body carries no `paints` list (or an empty one).
    pub fn from_json(body: &Value) -> Option<Self> {
        let raw = body.get("paints").and_then(Value::as_array)?;
        if raw.is_empty() {
            return None;
        }

        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            paints: normalize_paints(raw),
            submitted: raw.len(),
            contract: text("contract"),
            sender: text("sender"),
            tx_id: text("txId").or_else(|| text("txHash")),
        })
    }
}
