// Profile-scoped podcast playback: one engine owns the media element, the
// queue feeds it, and the synchronizer turns position ticks into durable
// listening-status records.

pub mod backends;
pub mod config;
pub mod models;
pub mod player;
pub mod progress;

pub use config::Config;
pub use player::{PlaybackEngine, PlaybackState, PlayerEvent, PlayerHandle, QueueManager};
pub use progress::ProgressSynchronizer;
