use axum::Json;

use crate::api::types::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
