#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use podkids_player::backends::{ProgressStore, ProgressUpdate, StoreError};
use podkids_player::models::{
    EpisodeId, EpisodeProgress, PlayableTrack, PodcastId, ResumeCandidate,
};
use podkids_player::player::{ElementState, MediaElement};

/// Opt-in log output for debugging a failing test: RUST_LOG=debug.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Let spawned tasks (engine, monitor, fire-and-forget flushes) run.
pub async fn settle() {
    for _ in 0..40 {
        tokio::task::yield_now().await;
    }
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

pub fn track(id: &str, url: &str) -> PlayableTrack {
    PlayableTrack::new(id, format!("Episode {id}"), url)
}

pub fn candidate(id: &str, url: &str, position: u64, duration: u64) -> ResumeCandidate {
    ResumeCandidate {
        episode_id: EpisodeId::new(id),
        title: format!("Episode {id}"),
        stream_url: url.to_string(),
        cover_url: None,
        podcast_title: None,
        duration: Some(secs(duration)),
        position: secs(position),
        last_played_at: None,
    }
}

/// Media element that advances its position with the (test) clock while
/// playing. Durations are seeded per URL; failure modes are injectable.
#[derive(Clone, Default)]
pub struct SimulatedElement {
    inner: Arc<Mutex<Sim>>,
}

#[derive(Default)]
struct Sim {
    url: Option<String>,
    durations: HashMap<String, Duration>,
    base: Duration,
    started_at: Option<Instant>,
    ended: bool,
    fail_load: bool,
    fail_play: bool,
}

impl Sim {
    fn current_duration(&self) -> Option<Duration> {
        self.url
            .as_ref()
            .and_then(|url| self.durations.get(url))
            .copied()
    }

    fn current_position(&mut self) -> Duration {
        let mut position = self.base;
        if let Some(started) = self.started_at {
            position += Instant::now().duration_since(started);
        }
        if let Some(duration) = self.current_duration()
            && position >= duration
        {
            position = duration;
            self.base = duration;
            self.started_at = None;
            self.ended = true;
        }
        position
    }
}

impl SimulatedElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(self, url: &str, duration: Duration) -> Self {
        self.inner
            .lock()
            .unwrap()
            .durations
            .insert(url.to_string(), duration);
        self
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.inner.lock().unwrap().fail_load = fail;
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.inner.lock().unwrap().fail_play = fail;
    }

    pub fn loaded_url(&self) -> Option<String> {
        self.inner.lock().unwrap().url.clone()
    }
}

#[async_trait]
impl MediaElement for SimulatedElement {
    async fn load(&self, url: &str) -> Result<()> {
        let mut sim = self.inner.lock().unwrap();
        if sim.fail_load {
            return Err(anyhow!("resource unavailable"));
        }
        sim.url = Some(url.to_string());
        sim.base = Duration::ZERO;
        sim.started_at = None;
        sim.ended = false;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut sim = self.inner.lock().unwrap();
        if sim.url.is_none() {
            return Err(anyhow!("nothing loaded"));
        }
        if sim.fail_play {
            return Err(anyhow!("autoplay rejected"));
        }
        if sim.started_at.is_none() {
            sim.started_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut sim = self.inner.lock().unwrap();
        let position = sim.current_position();
        sim.base = position;
        sim.started_at = None;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut sim = self.inner.lock().unwrap();
        sim.url = None;
        sim.base = Duration::ZERO;
        sim.started_at = None;
        sim.ended = false;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        let mut sim = self.inner.lock().unwrap();
        if sim.url.is_none() {
            return Err(anyhow!("nothing loaded"));
        }
        let clamped = match sim.current_duration() {
            Some(duration) => position.min(duration),
            None => position,
        };
        sim.base = clamped;
        if sim.started_at.is_some() {
            sim.started_at = Some(Instant::now());
        }
        sim.ended = false;
        Ok(())
    }

    async fn position(&self) -> Option<Duration> {
        let mut sim = self.inner.lock().unwrap();
        if sim.url.is_none() {
            return None;
        }
        Some(sim.current_position())
    }

    async fn duration(&self) -> Option<Duration> {
        self.inner.lock().unwrap().current_duration()
    }

    async fn state(&self) -> ElementState {
        let mut sim = self.inner.lock().unwrap();
        if sim.url.is_none() {
            return ElementState::Idle;
        }
        let _ = sim.current_position();
        if sim.ended {
            ElementState::Ended
        } else if sim.started_at.is_some() {
            ElementState::Playing
        } else {
            ElementState::Paused
        }
    }
}

/// In-memory progress store that records every write and can be told to
/// fail on demand.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreState>>,
}

#[derive(Default)]
struct MockStoreState {
    remote: HashMap<String, Vec<(EpisodeId, EpisodeProgress)>>,
    recent: Vec<ResumeCandidate>,
    upserts: Vec<(EpisodeId, ProgressUpdate)>,
    beacons: Vec<(EpisodeId, ProgressUpdate)>,
    fail_upserts: bool,
    fail_fetch: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_podcast(&self, podcast: &PodcastId, rows: Vec<(EpisodeId, EpisodeProgress)>) {
        self.inner
            .lock()
            .unwrap()
            .remote
            .insert(podcast.as_str().to_string(), rows);
    }

    pub fn seed_recent(&self, rows: Vec<ResumeCandidate>) {
        self.inner.lock().unwrap().recent = rows;
    }

    pub fn set_fail_upserts(&self, fail: bool) {
        self.inner.lock().unwrap().fail_upserts = fail;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.inner.lock().unwrap().fail_fetch = fail;
    }

    pub fn upserts(&self) -> Vec<(EpisodeId, ProgressUpdate)> {
        self.inner.lock().unwrap().upserts.clone()
    }

    pub fn beacons(&self) -> Vec<(EpisodeId, ProgressUpdate)> {
        self.inner.lock().unwrap().beacons.clone()
    }

    pub fn clear_writes(&self) {
        let mut state = self.inner.lock().unwrap();
        state.upserts.clear();
        state.beacons.clear();
    }
}

#[async_trait]
impl ProgressStore for MockStore {
    async fn fetch_podcast_progress(
        &self,
        podcast: &PodcastId,
    ) -> Result<Vec<(EpisodeId, EpisodeProgress)>, StoreError> {
        let state = self.inner.lock().unwrap();
        if state.fail_fetch {
            return Err(StoreError::Network("injected fetch failure".to_string()));
        }
        Ok(state
            .remote
            .get(podcast.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert(
        &self,
        episode: &EpisodeId,
        update: ProgressUpdate,
    ) -> Result<EpisodeProgress, StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_upserts {
            return Err(StoreError::Http { status: 500 });
        }
        state.upserts.push((episode.clone(), update));
        Ok(EpisodeProgress {
            status: update.status.unwrap_or_default(),
            position: update.position.unwrap_or_default(),
        })
    }

    async fn recently_played(&self, limit: usize) -> Result<Vec<ResumeCandidate>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state.recent.iter().take(limit).cloned().collect())
    }

    fn beacon(&self, episode: &EpisodeId, update: ProgressUpdate) {
        self.inner
            .lock()
            .unwrap()
            .beacons
            .push((episode.clone(), update));
    }
}
