mod identifiers;

pub use identifiers::{EpisodeId, PodcastId, ProfileId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One playable unit handed to the playback engine. Immutable once built;
/// starting another episode replaces the current track wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableTrack {
    pub id: EpisodeId,
    pub title: String,
    /// Already-proxied stream URL; the engine never sees upstream origins.
    pub stream_url: String,
    pub cover_url: Option<String>,
    pub podcast_title: Option<String>,
    pub duration: Option<Duration>,
    /// Position to resume from, set when seeding playback from the
    /// recently-played feed.
    pub start_offset: Option<Duration>,
}

impl PlayableTrack {
    pub fn new(
        id: impl Into<EpisodeId>,
        title: impl Into<String>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            stream_url: stream_url.into(),
            cover_url: None,
            podcast_title: None,
            duration: None,
            start_offset: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_start_offset(mut self, offset: Duration) -> Self {
        self.start_offset = Some(offset);
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_podcast_title(mut self, title: impl Into<String>) -> Self {
        self.podcast_title = Some(title.into());
        self
    }
}

/// Listening status for one (profile, episode) pair. Transitions are
/// normally monotonic (unlistened -> listening -> listened) but an explicit
/// toggle may regress to unlistened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EpisodeStatus {
    #[default]
    Unlistened,
    Listening,
    Listened,
}

impl EpisodeStatus {
    /// Uppercase enum string used by the remote store.
    pub fn as_wire(&self) -> &'static str {
        match self {
            EpisodeStatus::Unlistened => "UNLISTENED",
            EpisodeStatus::Listening => "LISTENING",
            EpisodeStatus::Listened => "LISTENED",
        }
    }

    /// Decode a wire status. Anything unrecognized reads as unlistened
    /// rather than failing.
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "LISTENING" => EpisodeStatus::Listening,
            "LISTENED" => EpisodeStatus::Listened,
            _ => EpisodeStatus::Unlistened,
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EpisodeStatus::Unlistened => "unlistened",
            EpisodeStatus::Listening => "listening",
            EpisodeStatus::Listened => "listened",
        };
        write!(f, "{s}")
    }
}

/// Status plus elapsed position for one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpisodeProgress {
    pub status: EpisodeStatus,
    pub position: Duration,
}

impl EpisodeProgress {
    pub fn listening(position: Duration) -> Self {
        Self {
            status: EpisodeStatus::Listening,
            position,
        }
    }

    pub fn listened(duration: Duration) -> Self {
        Self {
            status: EpisodeStatus::Listened,
            position: duration,
        }
    }
}

/// One row of the recently-played feed: an in-progress episode joined with
/// enough metadata to rebuild a playable track.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeCandidate {
    pub episode_id: EpisodeId,
    pub title: String,
    pub stream_url: String,
    pub cover_url: Option<String>,
    pub podcast_title: Option<String>,
    pub duration: Option<Duration>,
    pub position: Duration,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl ResumeCandidate {
    /// Track that resumes where the listener left off.
    pub fn to_track(&self) -> PlayableTrack {
        PlayableTrack {
            id: self.episode_id.clone(),
            title: self.title.clone(),
            stream_url: self.stream_url.clone(),
            cover_url: self.cover_url.clone(),
            podcast_title: self.podcast_title.clone(),
            duration: self.duration,
            start_offset: Some(self.position),
        }
    }
}
