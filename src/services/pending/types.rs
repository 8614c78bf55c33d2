use serde::Serialize;

use crate::codec::Paint;

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub paints: Vec<Paint>,
    pub sender: Option<String>,
    pub contract: Option<String>,
    pub created_at: u64,
}

impl PendingEntry {
    pub fn is_expired(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > ttl_ms
    }
}

/// One pending transaction as returned in the snapshot payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSnapshotEntry {
    #[serde(rename = "txId")]
    pub tx_id: String,
    pub paints: Vec<Paint>,
    pub sender: Option<String>,
    pub timestamp: u64,
}
