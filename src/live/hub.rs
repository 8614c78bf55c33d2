use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    live::types::LiveEvent,
    utils::{
        schedule::{FirstRun, ScheduledTask},
        time::now_ms,
    },
};

/// Anything that can take an event without blocking. Returning `false`
/// means the sink is gone and should be dropped.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &LiveEvent) -> bool;
}

/// Sink backed by a bounded channel; a full buffer counts as a dead subscriber.
pub struct ChannelSink {
    sender: mpsc::Sender<LiveEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<LiveEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: &LiveEvent) -> bool {
        self.sender.try_send(event.clone()).is_ok()
    }
}

pub struct BroadcastHub {
    subscribers: Mutex<HashMap<Uuid, Box<dyn EventSink>>>,
    accepting: AtomicBool,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
        }
    }

    // Unregistration runs from Drop, so a poisoned lock is recovered rather than propagated.
    fn subscribers(&self) -> MutexGuard<'_, HashMap<Uuid, Box<dyn EventSink>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a sink. `None` once the hub has been closed.
    pub fn register(&self, sink: Box<dyn EventSink>) -> Option<Uuid> {
        // `accepting` only flips while the map is locked, see `close`.
        let mut subscribers = self.subscribers();
        if !self.is_accepting() {
            return None;
        }
        let id = Uuid::new_v4();
        subscribers.insert(id, sink);
        drop(subscribers);

        tracing::debug!(subscriber = %id, "Subscriber registered");
        Some(id)
    }

    pub fn unregister(&self, id: &Uuid) -> bool {
        let removed = self.subscribers().remove(id).is_some();
        if removed {
            tracing::debug!(subscriber = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Sends `event` to every subscriber and prunes the ones that failed.
    /// Returns how many received it.
    pub fn broadcast(&self, event: &LiveEvent) -> usize {
        let mut subscribers = self.subscribers();
        let before = subscribers.len();
        subscribers.retain(|_, sink| sink.deliver(event));

        let pruned = before - subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, event = event.name(), "Dropped unresponsive subscribers");
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stops accepting subscribers and drops every open sink, which ends their streams.
    pub fn close(&self) {
        let dropped = {
            let mut subscribers = self.subscribers();
            self.accepting.store(false, Ordering::SeqCst);
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        tracing::info!(dropped, "Subscriber hub closed");
    }

    /// Broadcasts a `ping` every `period` until `token` is cancelled.
    pub fn spawn_heartbeat(
        self: &Arc<Self>,
        period: Duration,
        token: &CancellationToken,
    ) -> ScheduledTask {
        let hub = Arc::clone(self);
        ScheduledTask::every("heartbeat", period, FirstRun::AfterPeriod, token, move || {
            let hub = Arc::clone(&hub);
            async move {
                hub.broadcast(&LiveEvent::Ping { t: now_ms() });
            }
        })
    }
}
