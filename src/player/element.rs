use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Coarse transport state reported by the underlying media resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Idle,
    Paused,
    Playing,
    Ended,
}

/// Boundary to the platform media resource. The playback engine owns
/// exactly one element and is its only caller; implementations carry their
/// own interior mutability.
#[async_trait]
pub trait MediaElement: Send {
    async fn load(&self, url: &str) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn seek(&self, position: Duration) -> Result<()>;
    async fn position(&self) -> Option<Duration>;
    async fn duration(&self) -> Option<Duration>;
    async fn state(&self) -> ElementState;
}
