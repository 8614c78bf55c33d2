pub mod handler;
pub mod hub;
pub mod router;
pub mod types;

pub use hub::{BroadcastHub, ChannelSink, EventSink};
pub use router::router;
pub use types::{LiveEvent, PaintEvent, PaintSource, PaintStatus};
