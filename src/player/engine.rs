use anyhow::Result;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::element::{ElementState, MediaElement};
use crate::models::{EpisodeId, PlayableTrack};

/// Engine tick cadence; observers see position updates at least this often
/// while a track is loaded.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of the transport, published on every tick and every transition.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub track: Option<PlayableTrack>,
    pub playing: bool,
    pub position: Duration,
    /// Becomes known once the element resolves the track's metadata.
    pub duration: Option<Duration>,
}

impl PlaybackState {
    pub fn current_episode(&self) -> Option<&EpisodeId> {
        self.track.as_ref().map(|t| &t.id)
    }
}

/// Discrete transitions, for consumers that care about edges rather than
/// the latest snapshot.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackChanged(PlayableTrack),
    Ended(EpisodeId),
    Stopped,
}

#[derive(Debug)]
enum PlayerCommand {
    Play {
        track: PlayableTrack,
        respond_to: oneshot::Sender<()>,
    },
    Toggle {
        respond_to: oneshot::Sender<()>,
    },
    Stop {
        respond_to: oneshot::Sender<()>,
    },
    SeekTo {
        position: Duration,
        respond_to: oneshot::Sender<()>,
    },
    SeekBy {
        delta_secs: i64,
        respond_to: oneshot::Sender<()>,
    },
    Snapshot {
        respond_to: oneshot::Sender<PlaybackState>,
    },
}

/// Actor that owns the single media element and processes transport
/// commands. Everything observable goes out through the watch and
/// broadcast channels; nothing else touches the element.
pub struct PlaybackEngine {
    element: Box<dyn MediaElement>,
    receiver: mpsc::UnboundedReceiver<PlayerCommand>,
    state_tx: watch::Sender<PlaybackState>,
    event_tx: broadcast::Sender<PlayerEvent>,
    state: PlaybackState,
}

impl PlaybackEngine {
    pub fn new(element: Box<dyn MediaElement>) -> (PlayerHandle, PlaybackEngine) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlaybackState::default());
        let (event_tx, _) = broadcast::channel(32);

        let engine = PlaybackEngine {
            element,
            receiver,
            state_tx,
            event_tx: event_tx.clone(),
            state: PlaybackState::default(),
        };
        let handle = PlayerHandle {
            sender,
            state_rx,
            event_tx,
        };

        (handle, engine)
    }

    /// Spawn the engine on the current runtime and return its handle.
    pub fn spawn(element: Box<dyn MediaElement>) -> PlayerHandle {
        let (handle, engine) = Self::new(element);
        tokio::spawn(engine.run());
        handle
    }

    /// Run the engine event loop.
    pub async fn run(mut self) {
        debug!("playback engine loop started");

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = ticker.tick() => self.tick().await,
            }
        }

        debug!("playback engine loop terminated");
    }

    async fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Play { track, respond_to } => {
                self.play(track).await;
                let _ = respond_to.send(());
            }
            PlayerCommand::Toggle { respond_to } => {
                self.toggle().await;
                let _ = respond_to.send(());
            }
            PlayerCommand::Stop { respond_to } => {
                self.stop().await;
                let _ = respond_to.send(());
            }
            PlayerCommand::SeekTo {
                position,
                respond_to,
            } => {
                self.seek_to(position).await;
                let _ = respond_to.send(());
            }
            PlayerCommand::SeekBy {
                delta_secs,
                respond_to,
            } => {
                self.seek_by(delta_secs).await;
                let _ = respond_to.send(());
            }
            PlayerCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }
        }
    }

    async fn play(&mut self, track: PlayableTrack) {
        trace!("loading track {}", track.id);
        let start = track.start_offset.unwrap_or_default();

        if let Err(e) = self.element.load(&track.stream_url).await {
            // Load failures surface only as the playing flag never turning
            // true; callers see no error.
            warn!("media element refused to load {}: {e:#}", track.id);
            self.state = PlaybackState {
                track: Some(track.clone()),
                playing: false,
                position: start,
                duration: track.duration,
            };
            let _ = self.event_tx.send(PlayerEvent::TrackChanged(track));
            self.publish();
            return;
        }

        if !start.is_zero() {
            // Seek fallback: elements that ignore a start offset embedded in
            // the source get an explicit seek right after load.
            if let Err(e) = self.element.seek(start).await {
                warn!("start-offset seek failed for {}: {e:#}", track.id);
            }
        }

        let playing = match self.element.play().await {
            Ok(()) => true,
            Err(e) => {
                debug!("autoplay rejected for {}: {e:#}", track.id);
                false
            }
        };

        let duration = self.element.duration().await.or(track.duration);
        self.state = PlaybackState {
            track: Some(track.clone()),
            playing,
            position: start,
            duration,
        };
        let _ = self.event_tx.send(PlayerEvent::TrackChanged(track));
        self.publish();
    }

    async fn toggle(&mut self) {
        if self.state.track.is_none() {
            return;
        }

        if self.state.playing {
            trace!("pausing playback");
            if let Err(e) = self.element.pause().await {
                warn!("pause failed: {e:#}");
            }
            self.state.playing = false;
        } else {
            trace!("resuming playback");
            match self.element.play().await {
                Ok(()) => self.state.playing = true,
                Err(e) => debug!("resume rejected: {e:#}"),
            }
        }
        self.publish();
    }

    async fn stop(&mut self) {
        trace!("stopping playback");
        if let Err(e) = self.element.stop().await {
            debug!("element stop failed: {e:#}");
        }
        self.state = PlaybackState::default();
        let _ = self.event_tx.send(PlayerEvent::Stopped);
        self.publish();
    }

    async fn seek_to(&mut self, position: Duration) {
        if self.state.track.is_none() {
            return;
        }
        let target = match self.state.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        if let Err(e) = self.element.seek(target).await {
            warn!("seek to {target:?} failed: {e:#}");
            return;
        }
        self.state.position = target;
        self.publish();
    }

    async fn seek_by(&mut self, delta_secs: i64) {
        if self.state.track.is_none() {
            return;
        }
        let current = self.state.position;
        let target = if delta_secs >= 0 {
            current + Duration::from_secs(delta_secs as u64)
        } else {
            current.saturating_sub(Duration::from_secs(delta_secs.unsigned_abs()))
        };
        self.seek_to(target).await;
    }

    async fn tick(&mut self) {
        if self.state.track.is_none() {
            return;
        }

        if let Some(duration) = self.element.duration().await {
            self.state.duration = Some(duration);
        }
        if let Some(position) = self.element.position().await {
            self.state.position = match self.state.duration {
                Some(duration) => position.min(duration),
                None => position,
            };
        }

        if self.state.playing && self.element.state().await == ElementState::Ended {
            // End of track parks the transport in the paused state.
            self.state.playing = false;
            if let Some(duration) = self.state.duration {
                self.state.position = duration;
            }
            if let Some(id) = self.state.current_episode().cloned() {
                debug!("track {id} reached end of playback");
                let _ = self.event_tx.send(PlayerEvent::Ended(id));
            }
        }

        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Cloneable handle for sending commands to the engine and observing its
/// state. UI components hold this, never the element itself.
#[derive(Clone)]
pub struct PlayerHandle {
    sender: mpsc::UnboundedSender<PlayerCommand>,
    state_rx: watch::Receiver<PlaybackState>,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle").finish_non_exhaustive()
    }
}

impl PlayerHandle {
    /// Replace the current track and begin playback. Media failures are
    /// swallowed; the call errors only if the engine itself is gone.
    pub async fn play(&self, track: PlayableTrack) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PlayerCommand::Play { track, respond_to })
            .map_err(|_| anyhow::anyhow!("playback engine disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("playback engine dropped the request"))
    }

    /// Pause if playing, resume if paused. No-op with no track loaded.
    pub async fn toggle(&self) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PlayerCommand::Toggle { respond_to })
            .map_err(|_| anyhow::anyhow!("playback engine disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("playback engine dropped the request"))
    }

    /// Clear the current track and return to the empty state.
    pub async fn stop(&self) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PlayerCommand::Stop { respond_to })
            .map_err(|_| anyhow::anyhow!("playback engine disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("playback engine dropped the request"))
    }

    pub async fn seek_to(&self, position: Duration) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PlayerCommand::SeekTo {
                position,
                respond_to,
            })
            .map_err(|_| anyhow::anyhow!("playback engine disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("playback engine dropped the request"))
    }

    pub async fn seek_by(&self, delta_secs: i64) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PlayerCommand::SeekBy {
                delta_secs,
                respond_to,
            })
            .map_err(|_| anyhow::anyhow!("playback engine disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("playback engine dropped the request"))
    }

    pub async fn snapshot(&self) -> Result<PlaybackState> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(PlayerCommand::Snapshot { respond_to })
            .map_err(|_| anyhow::anyhow!("playback engine disconnected"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("playback engine dropped the request"))
    }

    /// Latest-state subscription; republished every tick.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    /// Edge-event subscription (track changes, end of track, stop).
    pub fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }
}
