use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::policy::{FlushKind, FlushPolicy};
use super::session_cache::SessionCache;
use crate::backends::{ProgressStore, ProgressUpdate};
use crate::config::SyncConfig;
use crate::models::{EpisodeId, EpisodeProgress, EpisodeStatus, PodcastId, ProfileId};
use crate::player::PlaybackState;

/// Cadence of the flush-rule monitor. Decoupled from however often the
/// media element reports position natively.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Translates playback ticks into durable listening-status records: local
/// state first, remote writes under the flush policy, rollback only on the
/// explicit toggle path.
#[derive(Clone)]
pub struct ProgressSynchronizer {
    store: Arc<dyn ProgressStore>,
    cache: SessionCache,
    config: SyncConfig,
    state: Arc<RwLock<SyncState>>,
}

struct SyncState {
    profile: Option<ProfileId>,
    podcast: Option<PodcastId>,
    records: HashMap<EpisodeId, EpisodeProgress>,
    current: Option<CurrentTrack>,
}

/// Flush bookkeeping scoped to the track currently in the engine.
struct CurrentTrack {
    episode: EpisodeId,
    policy: FlushPolicy,
    last_position: Duration,
}

impl ProgressSynchronizer {
    pub fn new(store: Arc<dyn ProgressStore>, config: SyncConfig) -> Self {
        let cache = SessionCache::new(config.cached_podcasts);
        Self {
            store,
            cache,
            config,
            state: Arc::new(RwLock::new(SyncState {
                profile: None,
                podcast: None,
                records: HashMap::new(),
                current: None,
            })),
        }
    }

    /// Hydrate for one podcast: the session cache is the fast path, then
    /// the remote fetch overwrites the map (remote is authoritative at
    /// load time). A failed fetch degrades to the cached view.
    pub async fn mount(&self, podcast: PodcastId) {
        {
            let mut state = self.state.write().await;
            state.podcast = Some(podcast.clone());
            state.records = self.cache.get(&podcast).await.unwrap_or_default();
        }

        match self.store.fetch_podcast_progress(&podcast).await {
            Ok(rows) => {
                let records: HashMap<_, _> = rows.into_iter().collect();
                debug!("hydrated {} record(s) for {podcast}", records.len());
                self.cache.put(podcast.clone(), records.clone()).await;

                let mut state = self.state.write().await;
                // Adopt the fetch only if the view was not remounted while
                // it was in flight.
                if state.podcast.as_ref() == Some(&podcast) {
                    state.records = records;
                }
            }
            Err(e) => warn!("progress fetch for {podcast} failed, keeping cached view: {e}"),
        }
    }

    /// A profile switch is a full reset; nothing listened by one profile
    /// may bleed into another.
    pub async fn set_active_profile(&self, profile: ProfileId) {
        info!("switching active profile to {profile}");
        self.cache.clear().await;

        let mut state = self.state.write().await;
        state.profile = Some(profile);
        state.podcast = None;
        state.records.clear();
        state.current = None;
    }

    pub async fn active_profile(&self) -> Option<ProfileId> {
        self.state.read().await.profile.clone()
    }

    /// Record for one episode, defaulting to unlistened at zero.
    pub async fn progress(&self, episode: &EpisodeId) -> EpisodeProgress {
        self.state
            .read()
            .await
            .records
            .get(episode)
            .copied()
            .unwrap_or_default()
    }

    /// Read-only view of the in-memory map for UI rendering.
    pub async fn records(&self) -> HashMap<EpisodeId, EpisodeProgress> {
        self.state.read().await.records.clone()
    }

    /// Explicit status toggle: optimistic local update, then the remote
    /// upsert; the local state is rolled back if the upsert fails. This is
    /// the only path with rollback; everything else is fire-and-forget.
    pub async fn toggle_status(
        &self,
        episode: &EpisodeId,
        next: EpisodeStatus,
        duration: Option<Duration>,
    ) -> Result<()> {
        let (previous, record) = {
            let mut state = self.state.write().await;
            let previous = state.records.get(episode).copied();
            let record = EpisodeProgress {
                status: next,
                position: match next {
                    EpisodeStatus::Listened => duration
                        .or(previous.map(|p| p.position))
                        .unwrap_or_default(),
                    EpisodeStatus::Unlistened => Duration::ZERO,
                    EpisodeStatus::Listening => previous.map(|p| p.position).unwrap_or_default(),
                },
            };
            state.records.insert(episode.clone(), record);
            (previous, record)
        };
        self.write_cache(episode, record).await;

        let update = ProgressUpdate {
            status: Some(next),
            position: Some(record.position),
        };
        match self.store.upsert(episode, update).await {
            Ok(_) => {
                debug!("{episode} toggled to {next}");
                Ok(())
            }
            Err(e) => {
                // Put the pre-toggle value back so the UI reflects reality.
                let restored = previous.unwrap_or_default();
                {
                    let mut state = self.state.write().await;
                    match previous {
                        Some(previous) => state.records.insert(episode.clone(), previous),
                        None => state.records.remove(episode),
                    };
                }
                self.write_cache(episode, restored).await;
                Err(e).context(format!("status toggle for {episode} failed"))
            }
        }
    }

    /// Best-effort flush for the page-hide path: sends whatever position
    /// was last observed, bypassing every threshold, over a delivery
    /// channel detached from the caller.
    pub async fn hide_flush(&self) {
        let flush = {
            let mut state = self.state.write().await;
            let Some(current) = state.current.as_mut() else {
                return;
            };
            let position = current.last_position;
            current.policy.record(FlushKind::Heartbeat, Instant::now());
            let episode = current.episode.clone();
            let record = state.records.entry(episode.clone()).or_default();
            record.position = position;
            (episode, *record, position)
        };

        let (episode, record, position) = flush;
        debug!("hide flush for {episode} at {position:?}");
        self.write_cache(&episode, record).await;
        self.store.beacon(&episode, ProgressUpdate::position(position));
    }

    /// Run the once-per-second evaluator over the engine's state stream. A
    /// flush in flight never delays the next tick.
    pub fn spawn_monitor(&self, state_rx: watch::Receiver<PlaybackState>) -> JoinHandle<()> {
        let sync = self.clone();
        tokio::spawn(async move { sync.monitor(state_rx).await })
    }

    async fn monitor(self, mut state_rx: watch::Receiver<PlaybackState>) {
        let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Pick up whatever is already in the engine before the first tick.
        let initial = state_rx.borrow_and_update().clone();
        self.observe(initial).await;

        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    self.observe(state).await;
                }
                _ = ticker.tick() => {
                    let state = state_rx.borrow().clone();
                    self.evaluate(state).await;
                }
            }
        }
        debug!("progress monitor stopped");
    }

    /// Track the engine state between rule evaluations; a change of the
    /// current episode marks it listening right away and rearms the flush
    /// bookkeeping in the new track's context.
    async fn observe(&self, state: PlaybackState) {
        let Some(track) = state.track else {
            self.state.write().await.current = None;
            return;
        };

        let mut transition = None;
        {
            let mut guard = self.state.write().await;
            if let Some(current) = guard.current.as_mut() {
                if current.episode == track.id {
                    current.last_position = state.position;
                    return;
                }
            }

            guard.current = Some(CurrentTrack {
                episode: track.id.clone(),
                policy: FlushPolicy::new(&self.config, state.position, Instant::now()),
                last_position: state.position,
            });

            let record = guard.records.entry(track.id.clone()).or_default();
            if record.status == EpisodeStatus::Unlistened {
                record.status = EpisodeStatus::Listening;
            }
            // A track already marked listened stays listened; no write goes out.
            if record.status == EpisodeStatus::Listening {
                transition = Some((track.id.clone(), *record));
            }
        }

        if let Some((episode, record)) = transition {
            debug!("now playing {episode}, status {}", record.status);
            self.write_cache(&episode, record).await;
            self.spawn_upsert(episode, ProgressUpdate::status(EpisodeStatus::Listening));
        }
    }

    /// Apply the flush rules to the latest known position. At most one
    /// write per tick goes out, and only while a track is actually playing.
    async fn evaluate(&self, state: PlaybackState) {
        if !state.playing {
            return;
        }
        let Some(track) = state.track else {
            return;
        };

        let now = Instant::now();
        let flush = {
            let mut guard = self.state.write().await;
            let Some(current) = guard.current.as_mut() else {
                return;
            };
            if current.episode != track.id {
                // A change the observer has not processed yet; let it.
                return;
            }
            current.last_position = state.position;

            let Some(kind) = current.policy.on_tick(state.position, state.duration, now) else {
                return;
            };
            current.policy.record(kind, now);
            let episode = current.episode.clone();

            let record = guard.records.entry(episode.clone()).or_default();
            let update = match kind {
                FlushKind::Completed => {
                    let duration = state.duration.unwrap_or(state.position);
                    *record = EpisodeProgress::listened(duration);
                    ProgressUpdate {
                        status: Some(EpisodeStatus::Listened),
                        position: Some(duration),
                    }
                }
                FlushKind::Delta => {
                    let became_listening = record.status == EpisodeStatus::Unlistened;
                    if became_listening {
                        record.status = EpisodeStatus::Listening;
                    }
                    record.position = state.position;
                    ProgressUpdate {
                        status: became_listening.then_some(EpisodeStatus::Listening),
                        position: Some(state.position),
                    }
                }
                FlushKind::Heartbeat => {
                    record.position = state.position;
                    ProgressUpdate::position(state.position)
                }
            };
            Some((kind, episode, *record, update))
        };

        if let Some((kind, episode, record, update)) = flush {
            debug!("{kind:?} flush for {episode} at {:?}", record.position);
            self.write_cache(&episode, record).await;
            self.spawn_upsert(episode, update);
        }
    }

    /// Fire-and-forget write; a later heartbeat reconciles anything lost.
    fn spawn_upsert(&self, episode: EpisodeId, update: ProgressUpdate) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.upsert(&episode, update).await {
                warn!("progress upsert for {episode} failed: {e}");
            }
        });
    }

    async fn write_cache(&self, episode: &EpisodeId, record: EpisodeProgress) {
        let podcast = self.state.read().await.podcast.clone();
        if let Some(podcast) = podcast {
            self.cache.update(&podcast, episode.clone(), record).await;
        }
    }
}
