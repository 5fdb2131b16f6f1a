use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{EpisodeId, EpisodeProgress, PodcastId};

/// Session-scoped progress cache, keyed by podcast. It bridges the gap
/// between view mounts within one app session so the UI does not wait on
/// the remote round-trip; the remote store stays authoritative at mount.
#[derive(Clone)]
pub struct SessionCache {
    entries: Arc<RwLock<LruCache<PodcastId, HashMap<EpisodeId, EpisodeProgress>>>>,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn get(&self, podcast: &PodcastId) -> Option<HashMap<EpisodeId, EpisodeProgress>> {
        let entries = self.entries.read().await;
        entries.peek(podcast).cloned()
    }

    /// Replace the cached map for a podcast wholesale.
    pub async fn put(&self, podcast: PodcastId, records: HashMap<EpisodeId, EpisodeProgress>) {
        let mut entries = self.entries.write().await;
        debug!("caching {} record(s) for {podcast}", records.len());
        entries.put(podcast, records);
    }

    /// Write through a single record.
    pub async fn update(&self, podcast: &PodcastId, episode: EpisodeId, record: EpisodeProgress) {
        let mut entries = self.entries.write().await;
        if let Some(records) = entries.get_mut(podcast) {
            records.insert(episode, record);
        } else {
            entries.put(podcast.clone(), HashMap::from([(episode, record)]));
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
