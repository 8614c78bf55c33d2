use std::sync::Arc;

use crate::{
    codec::{Paint, PaintMethod},
    error::Result,
    live::PaintSource,
    services::node::{ArgumentDecoder, DecodeRequest, HistoryEntry, HistorySource},
};

/// History entries newer than the cursor, newest first.
#[derive(Debug, Default)]
pub struct HistoryBatch {
    pub entries: Vec<HistoryEntry>,
    /// The cursor was missing or never found: the table must be rebuilt from scratch.
    pub full_refresh: bool,
}

impl HistoryBatch {
    /// Cursor to store once this batch has been applied.
    pub fn next_cursor(&self) -> Option<String> {
        self.entries.first().and_then(|entry| entry.hash.clone())
    }
}

/// One replayable paint call.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedCall {
    pub paints: Vec<Paint>,
    pub source: PaintSource,
}

/// History endpoint plus the decoder its raw arguments need.
pub struct HistoryReplay {
    pub source: Arc<dyn HistorySource>,
    pub decoder: Arc<dyn ArgumentDecoder>,
    pub network: String,
    pub contract_id: String,
}

impl HistoryReplay {
    /// Walks pages backwards until `cursor` is reached or history runs out.
    pub async fn fetch_updates(&self, cursor: Option<&str>) -> Result<HistoryBatch> {
        let mut entries = Vec::new();
        let mut after: Option<String> = None;
        let mut reached_cursor = false;

        loop {
            let page = self.source.page(after.as_deref()).await?;
            if page.history.is_empty() {
                break;
            }

            let last_hash = page.history.last().and_then(|entry| entry.hash.clone());
            for entry in page.history {
                if cursor.is_some() && entry.hash.as_deref() == cursor {
                    reached_cursor = true;
                    break;
                }
                entries.push(entry);
            }

            if reached_cursor || !page.has_more {
                break;
            }
            match last_hash {
                Some(hash) if after.as_deref() != Some(hash.as_str()) => after = Some(hash),
                _ => break,
            }
        }

        Ok(HistoryBatch {
            entries,
            full_refresh: !reached_cursor,
        })
    }

    /// Decodes paint calls oldest first. Entries that cannot be decoded are skipped.
    pub async fn decode(&self, entries: &[HistoryEntry]) -> Vec<ReplayedCall> {
        let mut calls = Vec::new();

        for entry in entries.iter().rev() {
            if entry.is_voided() {
                continue;
            }
            let Some(method) = entry.nc_method.as_deref().and_then(PaintMethod::from_name) else {
                continue;
            };
            let Some(request) = self.decode_request(entry, method) else {
                continue;
            };

            let args = match self.decoder.decode(&request).await {
                Ok(args) => args,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        tx_hash = ?entry.tx_hash(),
                        method = method.name(),
                        "Failed to decode history arguments"
                    );
                    continue;
                }
            };

            let paints = method.paints_from_args(&args);
            if paints.is_empty() {
                continue;
            }
            calls.push(ReplayedCall {
                paints,
                source: PaintSource {
                    sender: entry.sender(),
                    tx_hash: entry.tx_hash(),
                    contract: Some(self.contract_id.clone()),
                },
            });
        }

        calls
    }

    fn decode_request(&self, entry: &HistoryEntry, method: PaintMethod) -> Option<DecodeRequest> {
        Some(DecodeRequest {
            blueprint_id: entry.nc_blueprint_id.clone()?,
            method: method.name().to_string(),
            address: entry.nc_address.clone()?,
            network: self.network.clone(),
            args: entry.nc_args.clone()?,
        })
    }
}
