use std::{collections::HashMap, time::Duration};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{codec::Paint, services::canvas::CanvasStore};

pub mod types;

pub use types::{PendingEntry, PendingSnapshotEntry};

/// Paints announced by clients before the chain confirmed them, keyed by tx id.
///
/// A batch leaves the overlay only when every one of its pixels is confirmed
/// with the same color, or when it outlives the TTL. Partial confirmation
/// keeps the whole batch.
pub struct PendingOverlay {
    entries: Mutex<HashMap<String, PendingEntry>>,
    ttl: Duration,
}

/// Keeps the well-formed `{x, y, color}` items of a client submission.
pub fn normalize_paints(raw: &[Value]) -> Vec<Paint> {
    raw.iter().filter_map(Paint::from_value).collect()
}

impl PendingOverlay {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_ms(&self) -> u64 {
        self.ttl.as_millis() as u64
    }

    /// Stores (or replaces) the entry for `tx_id`. Empty batches are ignored.
    pub async fn track(
        &self,
        tx_id: &str,
        paints: Vec<Paint>,
        sender: Option<String>,
        contract: Option<String>,
        now_ms: u64,
    ) -> bool {
        if tx_id.is_empty() || paints.is_empty() {
            return false;
        }

        let entry = PendingEntry {
            paints,
            sender,
            contract,
            created_at: now_ms,
        };
        self.entries.lock().await.insert(tx_id.to_string(), entry);
        true
    }

    /// Drops every entry whose pixels all resolve to the same color in `store`.
    pub async fn reconcile(&self, store: &CanvasStore) -> usize {
        let mut entries = self.entries.lock().await;
        if entries.is_empty() {
            return 0;
        }

        let before = entries.len();
        store
            .with_pixels(|pixels| {
                entries.retain(|_, entry| {
                    !entry
                        .paints
                        .iter()
                        .all(|paint| pixels.get(&paint.coord()) == Some(&paint.color))
                });
            })
            .await;

        let confirmed = before - entries.len();
        if confirmed > 0 {
            tracing::debug!(confirmed, remaining = entries.len(), "Pending entries confirmed");
        }
        confirmed
    }

    /// Removes entries older than the TTL.
    pub async fn sweep(&self, now_ms: u64) -> usize {
        let ttl_ms = self.ttl_ms();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_ms, ttl_ms));
        before - entries.len()
    }

    /// Live entries, oldest first. Expired entries are swept as a side effect.
    pub async fn snapshot_pending(&self, now_ms: u64) -> Vec<PendingSnapshotEntry> {
        let ttl_ms = self.ttl_ms();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| !entry.is_expired(now_ms, ttl_ms));

        let mut live: Vec<PendingSnapshotEntry> = entries
            .iter()
            .map(|(tx_id, entry)| PendingSnapshotEntry {
                tx_id: tx_id.clone(),
                paints: entry.paints.clone(),
                sender: entry.sender.clone(),
                timestamp: entry.created_at,
            })
            .collect();
        live.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.tx_id.cmp(&b.tx_id)));
        live
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
