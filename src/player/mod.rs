mod element;
mod engine;
mod queue;

pub use element::{ElementState, MediaElement};
pub use engine::{PlaybackEngine, PlaybackState, PlayerEvent, PlayerHandle, TICK_INTERVAL};
pub use queue::{DragState, QueueManager};
