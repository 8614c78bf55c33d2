use std::{net::SocketAddr, sync::Arc};

use pixel_live_feed::{
    AppState, build_router,
    config::Config,
    error::Result,
    services::{feed::FeedListener, indexer::Indexer},
    utils::server::{init_tracing, join_all, shutdown_signal, stop_on},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = Config::from_env()?;
    config.validate()?;
    tracing::info!(
        contract = ?config.upstream.contract_id,
        indexer_mode = ?config.indexer.mode,
        "Configuration loaded"
    );

    let state = AppState::new(config.clone());
    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    tasks.push(
        state
            .hub
            .spawn_heartbeat(config.live.heartbeat_interval, &shutdown),
    );
    tracing::info!("Heartbeat started");

    if let Some(feed) = FeedListener::from_config(
        &config,
        state.store.clone(),
        state.pending.clone(),
        state.hub.clone(),
    ) {
        tasks.push(feed.spawn(&shutdown));
        tracing::info!("Confirmed feed listener started");
    }

    match Indexer::from_config(
        &config,
        state.store.clone(),
        state.pending.clone(),
        state.hub.clone(),
    ) {
        Ok(Some(indexer)) => {
            tasks.push(Arc::new(indexer).spawn(config.indexer.poll_interval, &shutdown));
            tracing::info!(poll = ?config.indexer.poll_interval, "Indexer started");
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Indexer could not be built; continuing without it"),
    }

    let hub = state.hub.clone();
    let app = build_router(state);

    let server_addr = format!("{}:{}", config.server.host, config.server.port);

    let listener = TcpListener::bind(server_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(stop_on(shutdown_signal(), shutdown.clone(), hub))
    .await?;

    // Also reached when the server stops without a signal.
    shutdown.cancel();
    join_all(tasks).await;
    tracing::info!("Server shutdown complete");

    Ok(())
}
