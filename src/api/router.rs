use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::{
    AppState,
    api::methods::{health, snapshot, submit_pending},
    middleware::shared_secret::require_shared_secret,
};

pub fn router(state: &AppState) -> Router<AppState> {
    let paths = &state.config.server.paths;

    Router::new()
        .route(&paths.health, get(health))
        .route(&paths.snapshot, get(snapshot))
        .route(
            &paths.pending,
            post(submit_pending)
                .route_layer(from_fn_with_state(state.clone(), require_shared_secret)),
        )
}
