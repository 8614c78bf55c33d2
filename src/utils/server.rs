use std::{future::Future, sync::Arc};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{error::Result, live::BroadcastHub, utils::schedule::ScheduledTask};

const DEFAULT_LOG_FILTER: &str =
    "info,pixel_live_feed=debug,tower_http=info,hyper=warn,reqwest=warn,tungstenite=warn";

/// JSON logs, filtered by `RUST_LOG` when set.
pub fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    Ok(tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true),
        )
        .try_init()?)
}

/// Resolves with the name of the first termination signal received.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Waits for `signal`, then stops the background tasks and ends open live
/// streams so the HTTP server can drain.
pub async fn stop_on<S>(signal: S, tasks: CancellationToken, hub: Arc<BroadcastHub>)
where
    S: Future<Output = &'static str>,
{
    let received = signal.await;
    tracing::warn!(signal = received, "Shutting down");

    tracing::info!("Stopping feed listener, indexer and heartbeat");
    tasks.cancel();

    // Live streams only end once their sinks are dropped.
    tracing::info!(subscribers = hub.subscriber_count(), "Closing live streams");
    hub.close();
}

/// Joins every background task, logging which one is being waited on.
pub async fn join_all(tasks: Vec<ScheduledTask>) {
    for task in tasks {
        tracing::debug!(task = task.name(), "Waiting for background task");
        task.join().await;
    }
}
