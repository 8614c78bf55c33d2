pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod live;
pub mod middleware;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, Method, header},
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    live::BroadcastHub,
    services::{canvas::CanvasStore, pending::PendingOverlay},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<CanvasStore>,
    pub pending: Arc<PendingOverlay>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pending = PendingOverlay::new(config.live.pending_ttl);
        Self {
            config: Arc::new(config),
            store: Arc::new(CanvasStore::new()),
            pending: Arc::new(pending),
            hub: Arc::new(BroadcastHub::new()),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = &config.server.allow_origins;
    let allow_origin = if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| origin.parse().ok()))
    };

    let mut headers = vec![header::CONTENT_TYPE];
    if let Ok(secret_header) = HeaderName::from_bytes(config.auth.header_name.as_bytes()) {
        headers.push(secret_header);
    }

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::list(headers))
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let secret_param = state.config.auth.query_name.clone();

    Router::new()
        .merge(api::router(&state))
        .merge(live::router(&state.config.server.paths.live))
        .fallback(api::methods::not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &axum::extract::Request| {
                    middleware::logging::make_log_span(request, &secret_param)
                })
                .on_request(())
                .on_eos(()),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(ConcurrencyLimitLayer::new(
            state.config.server.max_concurrent_requests,
        ))
        .with_state(state)
}
