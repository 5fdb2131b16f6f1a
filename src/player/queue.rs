use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::{PlayerEvent, PlayerHandle};
use crate::models::{EpisodeId, PlayableTrack, ResumeCandidate};

/// Ordered list of tracks queued after the current one. The queue never
/// touches the media element; handing a track to the engine always goes
/// through the player handle.
#[derive(Clone)]
pub struct QueueManager {
    player: PlayerHandle,
    pending: Arc<RwLock<Vec<PlayableTrack>>>,
}

impl QueueManager {
    pub fn new(player: PlayerHandle) -> Self {
        Self {
            player,
            pending: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn player(&self) -> &PlayerHandle {
        &self.player
    }

    /// Append tracks at the end, preserving input order.
    pub async fn enqueue(&self, tracks: Vec<PlayableTrack>) {
        if tracks.is_empty() {
            return;
        }
        let mut pending = self.pending.write().await;
        debug!("queueing {} track(s) at the end", tracks.len());
        pending.extend(tracks);
    }

    /// Prepend tracks so they play immediately after the current one.
    pub async fn enqueue_next(&self, tracks: Vec<PlayableTrack>) {
        if tracks.is_empty() {
            return;
        }
        let mut pending = self.pending.write().await;
        debug!("queueing {} track(s) up next", tracks.len());
        pending.splice(0..0, tracks);
    }

    /// Atomically set a new current track and replace the whole pending
    /// queue. The replacement is filtered so the queue never holds the
    /// track that is now playing.
    pub async fn play_now(
        &self,
        track: PlayableTrack,
        replacement: Vec<PlayableTrack>,
    ) -> Result<()> {
        let current = track.id.clone();
        info!("playing {current} now, replacing queue");
        self.player.play(track).await?;

        let mut pending = self.pending.write().await;
        *pending = replacement
            .into_iter()
            .filter(|t| t.id != current)
            .collect();
        Ok(())
    }

    /// Remove an entry by episode identity; no-op if absent.
    pub async fn remove(&self, id: &EpisodeId) {
        let mut pending = self.pending.write().await;
        pending.retain(|t| &t.id != id);
    }

    /// Reorder a single entry. Out-of-range indices and from == to are
    /// no-ops; up/down buttons and drag-and-drop both land here.
    pub async fn move_item(&self, from: usize, to: usize) {
        let mut pending = self.pending.write().await;
        if from == to || from >= pending.len() || to >= pending.len() {
            return;
        }
        let entry = pending.remove(from);
        pending.insert(to, entry);
    }

    /// Empty the pending list without touching the current track.
    pub async fn clear(&self) {
        self.pending.write().await.clear();
    }

    pub async fn snapshot(&self) -> Vec<PlayableTrack> {
        self.pending.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.pending.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.read().await.is_empty()
    }

    /// Pop the head of the queue and hand it to the engine. Returns the
    /// episode that started, or None when the queue was empty.
    pub async fn advance(&self) -> Result<Option<EpisodeId>> {
        let next = {
            let mut pending = self.pending.write().await;
            if pending.is_empty() {
                None
            } else {
                Some(pending.remove(0))
            }
        };
        match next {
            Some(track) => {
                let id = track.id.clone();
                info!("advancing to queued track {id}");
                self.player.play(track).await?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Wire end-of-track to `advance`. Embedders that prompt before playing
    /// the next episode simply never spawn this.
    pub fn spawn_auto_advance(&self) -> JoinHandle<()> {
        let queue = self.clone();
        let mut events = self.player.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PlayerEvent::Ended(id)) => {
                        if let Err(e) = queue.advance().await {
                            warn!("auto-advance after {id} failed: {e:#}");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("auto-advance missed {skipped} event(s)");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Seed playback from the recently-played feed: the chosen candidate
    /// resumes at its saved position and the tail of the list becomes the
    /// new queue.
    pub async fn resume_from(&self, candidates: &[ResumeCandidate], index: usize) -> Result<()> {
        let Some(chosen) = candidates.get(index) else {
            anyhow::bail!("resume index {index} out of range");
        };
        let tail: Vec<PlayableTrack> = candidates[index + 1..]
            .iter()
            .map(ResumeCandidate::to_track)
            .collect();
        self.play_now(chosen.to_track(), tail).await
    }
}

/// Transient pointer-gesture state for the reorder UI. Never part of the
/// durable queue; completing a drag resolves to a single `move_item` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragState {
    source: Option<usize>,
    hover: Option<usize>,
}

impl DragState {
    pub fn begin(&mut self, index: usize) {
        self.source = Some(index);
        self.hover = Some(index);
    }

    pub fn hover_over(&mut self, index: usize) {
        if self.source.is_some() {
            self.hover = Some(index);
        }
    }

    pub fn source(&self) -> Option<usize> {
        self.source
    }

    pub fn target(&self) -> Option<usize> {
        self.hover
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// Finish the gesture, yielding the (from, to) move if it would change
    /// anything.
    pub fn complete(&mut self) -> Option<(usize, usize)> {
        let result = self.source.zip(self.hover).filter(|(from, to)| from != to);
        *self = Self::default();
        result
    }
}
