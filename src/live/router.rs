use axum::{Router, routing::get};

use crate::{AppState, live::handler::live_handler};

pub fn router(path: &str) -> Router<AppState> {
    Router::new().route(path, get(live_handler))
}
