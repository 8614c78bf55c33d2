//! Periodic reconciliation of the canvas against the contract.
//!
//! Each cycle reads the contract stats, then either re-reads the full pixel
//! table (state mode) or replays transaction history since the last cursor
//! (history mode). `auto` prefers the table and falls back to history when
//! the table cannot be trusted. A failed cycle leaves the store, the cursor
//! and the readiness flags exactly as they were.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{Coord, Paint},
    config::{Config, IndexerMode},
    error::{AppError, Result},
    live::{BroadcastHub, LiveEvent, PaintSource},
    services::{
        canvas::CanvasStore,
        node::{HistoryClient, HttpArgumentDecoder, StateClient, StateSource, build_http_client},
        pending::PendingOverlay,
    },
    utils::schedule::{FirstRun, ScheduledTask},
};

pub mod history;
pub mod state;

pub use history::{HistoryBatch, HistoryReplay, ReplayedCall};
pub use state::{ContractStats, PixelTable, fetch_pixel_table, fetch_stats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A previous cycle was still running.
    Skipped,
    Unchanged,
    StateRefreshed { changed: usize, broadcast: bool },
    HistoryReplayed { entries: usize, full_refresh: bool },
}

#[derive(Debug, Clone, Default)]
struct Progress {
    ready: bool,
    history_ready: bool,
    last_unique_count: Option<u64>,
    cursor: Option<String>,
}

pub struct IndexerSettings {
    pub mode: IndexerMode,
    pub contract_id: String,
    pub page_size: u64,
    pub page_calls: u64,
}

pub struct Indexer {
    settings: IndexerSettings,
    state: Option<Arc<dyn StateSource>>,
    history: Option<HistoryReplay>,
    store: Arc<CanvasStore>,
    pending: Arc<PendingOverlay>,
    hub: Arc<BroadcastHub>,
    progress: Mutex<Progress>,
}

impl Indexer {
    pub fn new(
        settings: IndexerSettings,
        state: Option<Arc<dyn StateSource>>,
        history: Option<HistoryReplay>,
        store: Arc<CanvasStore>,
        pending: Arc<PendingOverlay>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            settings,
            state,
            history,
            store,
            pending,
            hub,
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Builds the indexer from configuration. `Ok(None)` when it should not
    /// run or a prerequisite is missing; the rest of the server is unaffected.
    pub fn from_config(
        config: &Config,
        store: Arc<CanvasStore>,
        pending: Arc<PendingOverlay>,
        hub: Arc<BroadcastHub>,
    ) -> Result<Option<Self>> {
        if !config.should_run_indexer() {
            tracing::info!("Indexer not started (disabled or confirmed feed configured)");
            return Ok(None);
        }
        let Some(contract_id) = config.upstream.contract_id.clone() else {
            tracing::warn!("Indexer disabled (missing contract id)");
            return Ok(None);
        };

        config.indexer.validate()?;

        let mode = config.indexer.mode;
        let backend = config.state_backend();
        if mode != IndexerMode::History && backend.is_none() {
            tracing::warn!("Indexer disabled (no state backend)");
            return Ok(None);
        }

        let client = build_http_client(config.upstream.request_timeout)?;

        let state: Option<Arc<dyn StateSource>> = backend
            .as_ref()
            .map(|backend| Arc::new(StateClient::new(client.clone(), backend, &contract_id)) as _);

        let history = match (mode, &config.upstream.node_url, &config.upstream.decoder_url) {
            (IndexerMode::State, _, _) => None,
            (_, Some(node_url), Some(decoder_url)) => Some(HistoryReplay {
                source: Arc::new(HistoryClient::new(
                    client.clone(),
                    node_url,
                    &contract_id,
                    config.indexer.history_page_size,
                )),
                decoder: Arc::new(HttpArgumentDecoder::new(
                    client,
                    decoder_url,
                    config.upstream.decoder_cache_capacity,
                )),
                network: config.network_name(),
                contract_id: contract_id.clone(),
            }),
            _ => None,
        };

        if mode == IndexerMode::History && history.is_none() {
            tracing::warn!("Indexer disabled (history mode needs a node URL and a decoder URL)");
            return Ok(None);
        }

        tracing::info!(
            mode = ?mode,
            backend = state.as_ref().map(|state| state.label()).unwrap_or("history"),
            history = history.is_some(),
            poll_ms = config.indexer.poll_interval.as_millis() as u64,
            "Indexer enabled"
        );

        Ok(Some(Self::new(
            IndexerSettings {
                mode,
                contract_id,
                page_size: config.indexer.page_size,
                page_calls: config.indexer.page_calls,
            },
            state,
            history,
            store,
            pending,
            hub,
        )))
    }

    /// Runs one cycle. Progress is only committed when the cycle succeeds.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Ok(mut progress) = self.progress.try_lock() else {
            return Ok(CycleOutcome::Skipped);
        };

        let mut next = progress.clone();
        let outcome = self.cycle(&mut next).await?;
        *progress = next;
        Ok(outcome)
    }

    async fn cycle(&self, progress: &mut Progress) -> Result<CycleOutcome> {
        let stats = match &self.state {
            Some(state) => fetch_stats(state.as_ref()).await?,
            None => ContractStats::default(),
        };

        let stored_paint_count = self.store.paint_count().await;
        let paint_changed = stats
            .paint_count
            .is_some_and(|count| count != stored_paint_count);
        let unique_changed = stats
            .unique_count
            .is_some_and(|count| Some(count) != progress.last_unique_count);
        let should_refresh = !progress.ready || paint_changed || unique_changed;

        if self.settings.mode != IndexerMode::History
            && let Some(state) = &self.state
        {
            if !should_refresh {
                return Ok(CycleOutcome::Unchanged);
            }
            if let Some(outcome) = self.refresh_from_state(state.as_ref(), stats, progress).await? {
                return Ok(outcome);
            }
        }

        // Without a stats source there is nothing to compare against, so replay every cycle.
        let history_should_refresh = !progress.history_ready || should_refresh || self.state.is_none();
        if !history_should_refresh {
            return Ok(CycleOutcome::Unchanged);
        }

        let Some(replay) = &self.history else {
            return Err(AppError::IncompletePixelTable(
                "pixel table rejected and history replay is unavailable".into(),
            ));
        };
        self.replay_history(replay, stats, progress).await
    }

    /// `Ok(None)` means the table was rejected in auto mode and history should take over.
    async fn refresh_from_state(
        &self,
        state: &dyn StateSource,
        stats: ContractStats,
        progress: &mut Progress,
    ) -> Result<Option<CycleOutcome>> {
        let table = fetch_pixel_table(
            state,
            stats.unique_count,
            self.settings.page_size,
            self.settings.page_calls,
        )
        .await?;

        let rejection = match table {
            PixelTable::Complete(pixels)
                if !pixels.is_empty() || matches!(stats.unique_count, None | Some(0)) =>
            {
                return Ok(Some(self.accept_table(pixels, stats, progress).await));
            }
            PixelTable::Complete(_) => format!(
                "empty table while the contract reports {} pixels",
                stats.unique_count.unwrap_or_default()
            ),
            PixelTable::Incomplete { call } => format!("error marker in {call}"),
        };

        if self.settings.mode == IndexerMode::State {
            return Err(AppError::IncompletePixelTable(rejection));
        }
        tracing::warn!(reason = %rejection, "Pixel table rejected, falling back to history");
        Ok(None)
    }

    async fn accept_table(
        &self,
        pixels: HashMap<Coord, String>,
        stats: ContractStats,
        progress: &mut Progress,
    ) -> CycleOutcome {
        let diffs = self.store.replace_all(pixels, stats.paint_count).await;

        // The first refresh seeds the store; announcing every pixel would flood subscribers.
        let broadcast = progress.ready;
        if broadcast {
            let source = PaintSource {
                contract: Some(self.settings.contract_id.clone()),
                ..PaintSource::default()
            };
            for diff in &diffs {
                let paint = Paint::new(diff.coord, diff.color.clone());
                self.hub.broadcast(&LiveEvent::confirmed(&paint, &source));
            }
        }

        progress.ready = true;
        if stats.unique_count.is_some() {
            progress.last_unique_count = stats.unique_count;
        }

        let confirmed = self.pending.reconcile(&self.store).await;
        tracing::debug!(changed = diffs.len(), broadcast, confirmed, "Pixel table refreshed");

        CycleOutcome::StateRefreshed {
            changed: diffs.len(),
            broadcast,
        }
    }

    async fn replay_history(
        &self,
        replay: &HistoryReplay,
        stats: ContractStats,
        progress: &mut Progress,
    ) -> Result<CycleOutcome> {
        let batch = replay.fetch_updates(progress.cursor.as_deref()).await?;
        let calls = replay.decode(&batch.entries).await;

        if batch.full_refresh {
            let mut table = HashMap::new();
            for call in &calls {
                for paint in &call.paints {
                    table.insert(paint.coord(), paint.color.clone());
                }
            }
            self.store.replace_all(table, stats.paint_count).await;
        } else {
            let broadcast = progress.history_ready;
            for call in &calls {
                for paint in &call.paints {
                    let changed = self.store.apply_one(paint.coord(), &paint.color).await;
                    if changed && broadcast {
                        self.hub.broadcast(&LiveEvent::confirmed(paint, &call.source));
                    }
                }
            }
            self.store.set_paint_count(stats.paint_count).await;
        }

        if let Some(cursor) = batch.next_cursor() {
            progress.cursor = Some(cursor);
        }
        if stats.unique_count.is_some() {
            progress.last_unique_count = stats.unique_count;
        }
        progress.ready = true;
        progress.history_ready = true;

        tracing::debug!(
            entries = batch.entries.len(),
            calls = calls.len(),
            full_refresh = batch.full_refresh,
            "History replayed"
        );

        Ok(CycleOutcome::HistoryReplayed {
            entries: batch.entries.len(),
            full_refresh: batch.full_refresh,
        })
    }

    async fn tick(&self) {
        match self.run_cycle().await {
            Ok(CycleOutcome::Skipped) => tracing::debug!("Indexer cycle still running, tick skipped"),
            Ok(outcome) => tracing::debug!(outcome = ?outcome, "Indexer cycle finished"),
            Err(e) => tracing::warn!(error = %e, "Indexer cycle failed"),
        }
    }

    /// Runs a cycle immediately and then every `poll_interval`. A zero interval runs once.
    pub fn spawn(self: Arc<Self>, poll_interval: Duration, token: &CancellationToken) -> ScheduledTask {
        if poll_interval.is_zero() {
            return ScheduledTask::spawn("indexer", token, move |token| async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = self.tick() => {}
                }
            });
        }

        ScheduledTask::every("indexer", poll_interval, FirstRun::Immediately, token, move || {
            let indexer = Arc::clone(&self);
            async move { indexer.tick().await }
        })
    }
}
