use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::traits::{ProgressStore, ProgressUpdate, StoreError};
use crate::config::RemoteConfig;
use crate::models::{EpisodeId, EpisodeProgress, EpisodeStatus, PodcastId, ResumeCandidate};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Episode-status client over the hosted backend's JSON API. The client is
/// cheap to clone; all of its state is shared.
#[derive(Clone)]
pub struct HttpProgressStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    profile: Option<String>,
    session_id: String,
}

impl HttpProgressStore {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn from_config(remote: &RemoteConfig, token: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_timeout(&remote.base_url, token, remote.timeout())
    }

    fn with_timeout(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base = Url::parse(base_url)
            .map_err(|e| StoreError::InvalidConfig(format!("bad base url {base_url:?}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            token: token.into(),
            profile: None,
            session_id: Uuid::new_v4().to_string(),
        })
    }

    /// Scope subsequent requests to one profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(profile) = &self.profile
            && let Ok(value) = HeaderValue::from_str(profile)
        {
            headers.insert("x-profile-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.session_id) {
            headers.insert("x-client-session", value);
        }
        headers
    }
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    episode_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<i64>,
}

impl StatusRow {
    fn into_record(self) -> (EpisodeId, EpisodeProgress) {
        let status = self
            .status
            .as_deref()
            .map(EpisodeStatus::from_wire)
            .unwrap_or_default();
        let position = Duration::from_secs(self.progress.unwrap_or(0).max(0) as u64);
        (EpisodeId::new(self.episode_id), EpisodeProgress { status, position })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertBody<'a> {
    episode_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RecentRow {
    episode_id: String,
    #[serde(default)]
    title: Option<String>,
    episode_url: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    podcast_title: Option<String>,
    #[serde(default)]
    duration: Option<i64>,
    #[serde(default)]
    progress: Option<i64>,
    #[serde(default)]
    last_played_at: Option<DateTime<Utc>>,
}

impl RecentRow {
    fn into_candidate(self) -> ResumeCandidate {
        ResumeCandidate {
            episode_id: EpisodeId::new(self.episode_id),
            title: self.title.unwrap_or_default(),
            stream_url: self.episode_url,
            cover_url: self.image_url,
            podcast_title: self.podcast_title,
            duration: self
                .duration
                .filter(|d| *d > 0)
                .map(|d| Duration::from_secs(d as u64)),
            position: Duration::from_secs(self.progress.unwrap_or(0).max(0) as u64),
            last_played_at: self.last_played_at,
        }
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn fetch_podcast_progress(
        &self,
        podcast: &PodcastId,
    ) -> Result<Vec<(EpisodeId, EpisodeProgress)>, StoreError> {
        let url = format!("{}/episode-status", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&[("podcastId", podcast.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Http {
                status: response.status().as_u16(),
            });
        }

        // An unexpected payload shape reads as "no records", not an error.
        match response.json::<Vec<StatusRow>>().await {
            Ok(rows) => Ok(rows.into_iter().map(StatusRow::into_record).collect()),
            Err(e) => {
                warn!("discarding malformed episode-status payload: {e}");
                Ok(Vec::new())
            }
        }
    }

    async fn upsert(
        &self,
        episode: &EpisodeId,
        update: ProgressUpdate,
    ) -> Result<EpisodeProgress, StoreError> {
        let url = format!("{}/episode-status", self.base_url);
        let body = UpsertBody {
            episode_id: episode.as_str(),
            status: update.status.map(|s| s.as_wire()),
            progress: update.position.map(|p| p.as_secs() as i64),
        };
        debug!("upserting {episode}: {body:?}");

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Http {
                status: response.status().as_u16(),
            });
        }

        match response.json::<StatusRow>().await {
            Ok(row) => Ok(row.into_record().1),
            Err(e) => {
                // The write itself succeeded; an unreadable echo falls back
                // to what was sent.
                warn!("unreadable upsert response for {episode}: {e}");
                Ok(EpisodeProgress {
                    status: update.status.unwrap_or_default(),
                    position: update.position.unwrap_or_default(),
                })
            }
        }
    }

    async fn recently_played(&self, limit: usize) -> Result<Vec<ResumeCandidate>, StoreError> {
        let url = format!("{}/episode-status/recent", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Http {
                status: response.status().as_u16(),
            });
        }

        match response.json::<Vec<RecentRow>>().await {
            Ok(rows) => Ok(rows.into_iter().map(RecentRow::into_candidate).collect()),
            Err(e) => {
                warn!("discarding malformed recently-played payload: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn beacon(&self, episode: &EpisodeId, update: ProgressUpdate) {
        // Detached delivery so the flush outlives whoever triggered it.
        let store = self.clone();
        let episode = episode.clone();
        tokio::spawn(async move {
            if let Err(e) = store.upsert(&episode, update).await {
                debug!("beacon flush for {episode} failed: {e}");
            }
        });
    }
}
