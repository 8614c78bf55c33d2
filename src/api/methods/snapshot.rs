use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::types::{SnapshotQuery, SnapshotResponse},
    services::canvas::SnapshotFormat,
    utils::time::now_ms,
};

/// Confirmed canvas plus live pending entries. Reads memory only.
pub async fn snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<SnapshotResponse> {
    let format = query
        .format
        .as_deref()
        .and_then(|format| format.parse::<SnapshotFormat>().ok())
        .unwrap_or_default();

    let pending = state.pending.snapshot_pending(now_ms()).await;
    let canvas = state.store.snapshot(format).await;

    Json(SnapshotResponse {
        ok: true,
        contract: state.config.upstream.contract_id.clone(),
        canvas,
        pending,
    })
}
