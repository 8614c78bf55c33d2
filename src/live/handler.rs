use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    live::{
        hub::{BroadcastHub, ChannelSink},
        types::LiveEvent,
    },
};

/// Removes the subscriber when the response stream is dropped.
struct SubscriptionGuard {
    hub: Arc<BroadcastHub>,
    id: Uuid,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.hub.unregister(&self.id) {
            tracing::info!(subscriber = %self.id, "Live subscriber disconnected");
        }
    }
}

pub async fn live_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let (sender, receiver) = mpsc::channel(state.config.live.subscriber_buffer);

    // Queued before registration so nothing can overtake it.
    sender
        .try_send(LiveEvent::Hello)
        .map_err(|e| AppError::InternalServerError(format!("Failed to queue hello: {e}")))?;

    let id = state
        .hub
        .register(Box::new(ChannelSink::new(sender)))
        .ok_or_else(|| AppError::ServiceUnavailable("Server is shutting down".into()))?;
    tracing::info!(subscriber = %id, subscribers = state.hub.subscriber_count(), "Live subscriber connected");

    let guard = SubscriptionGuard {
        hub: state.hub.clone(),
        id,
    };

    let stream = ReceiverStream::new(receiver).map(move |event| {
        let _guard = &guard;
        Ok(event.to_sse())
    });

    Ok(Sse::new(stream))
}
