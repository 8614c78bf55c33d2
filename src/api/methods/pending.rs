use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    AppState,
    api::types::{PendingAccepted, PendingIgnored, PendingSubmission},
    error::{AppError, Result},
    live::{LiveEvent, PaintSource},
    utils::time::now_ms,
};

pub const MAX_PENDING_BODY_BYTES: usize = 256 * 1024;

async fn read_body(body: Body) -> Result<Value> {
    let bytes = to_bytes(body, MAX_PENDING_BODY_BYTES)
        .await
        .map_err(|e| {
            if e.to_string().contains("length limit") {
                AppError::PayloadTooLarge
            } else {
                AppError::InvalidParams("Invalid body".into())
            }
        })?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(&bytes).map_err(|_| AppError::InvalidParams("Invalid JSON".into()))
}

/// Accepts optimistic paints from a client and fans them out as `pending` events.
pub async fn submit_pending(State(state): State<AppState>, request: Request) -> Result<Response> {
    let body = read_body(request.into_body()).await?;
    let submission = PendingSubmission::from_json(&body)
        .ok_or_else(|| AppError::InvalidParams("Missing paints".into()))?;

    let configured = state.config.upstream.contract_id.as_deref();
    let contract = submission
        .contract
        .clone()
        .or_else(|| configured.map(str::to_string));

    if let Some(expected) = configured
        && contract.as_deref() != Some(expected)
    {
        tracing::debug!(contract = ?contract, "Pending paints for another contract ignored");
        let body = PendingIgnored {
            ok: true,
            ignored: true,
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    if let Some(tx_id) = submission.tx_id.as_deref() {
        state
            .pending
            .track(
                tx_id,
                submission.paints.clone(),
                submission.sender.clone(),
                contract.clone(),
                now_ms(),
            )
            .await;
    }

    let source = PaintSource {
        sender: submission.sender,
        tx_hash: submission.tx_id,
        contract,
    };
    for paint in &submission.paints {
        state.hub.broadcast(&LiveEvent::pending(paint, &source));
    }

    tracing::debug!(
        tx_id = ?source.tx_hash,
        submitted = submission.submitted,
        sent = submission.paints.len(),
        "Pending paints announced"
    );

    let body = PendingAccepted {
        ok: true,
        sent: submission.paints.len(),
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}
