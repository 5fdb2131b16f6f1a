use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{EpisodeId, EpisodeProgress, EpisodeStatus, PodcastId, ResumeCandidate};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("remote store returned {status}")]
    Http { status: u16 },

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

/// Partial upsert body; absent fields leave the stored value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressUpdate {
    pub status: Option<EpisodeStatus>,
    pub position: Option<Duration>,
}

impl ProgressUpdate {
    pub fn position(position: Duration) -> Self {
        Self {
            status: None,
            position: Some(position),
        }
    }

    pub fn status(status: EpisodeStatus) -> Self {
        Self {
            status: Some(status),
            position: None,
        }
    }
}

/// Remote episode-status store for the active profile. Every upsert is a
/// full-state overwrite keyed by profile and episode, so concurrent writes
/// may complete out of order without corrupting anything; the next
/// heartbeat converges on the truth.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// All known records for one podcast's episodes.
    async fn fetch_podcast_progress(
        &self,
        podcast: &PodcastId,
    ) -> Result<Vec<(EpisodeId, EpisodeProgress)>, StoreError>;

    /// Upsert one record, returning what the store now holds.
    async fn upsert(
        &self,
        episode: &EpisodeId,
        update: ProgressUpdate,
    ) -> Result<EpisodeProgress, StoreError>;

    /// Most recent in-progress episodes, newest first.
    async fn recently_played(&self, limit: usize) -> Result<Vec<ResumeCandidate>, StoreError>;

    /// Fire-and-forget delivery that survives the caller going away;
    /// errors are logged, never returned.
    fn beacon(&self, episode: &EpisodeId, update: ProgressUpdate);
}
