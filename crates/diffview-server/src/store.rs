//! in-memory store for generated artifacts, keyed by unguessable ids.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: String,
    pub url_path: String,
}

#[derive(Debug)]
struct StoredFile {
    content: String,
    filename: String,
    created_at: Instant,
}

/// Owns every artifact it holds; nothing outside the store retains a
/// reference to stored content. Entries are immutable after `put` and
/// disappear via TTL sweep, explicit removal, or `clear`.
#[derive(Debug)]
pub struct ContentStore {
    entries: RwLock<HashMap<String, StoredFile>>,
    ttl: Duration,
}

impl ContentStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores content under a fresh id: 32 hex characters of
    /// cryptographically random UUID, so ids cannot be enumerated.
    pub async fn put(&self, content: impl Into<String>, filename: impl Into<String>) -> StoredEntry {
        let id = Uuid::new_v4().simple().to_string();
        let file = StoredFile {
            content: content.into(),
            filename: filename.into(),
            created_at: Instant::now(),
        };

        self.entries.write().await.insert(id.clone(), file);

        StoredEntry {
            url_path: format!("/file/{id}"),
            id,
        }
    }

    pub async fn get(&self, id: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|file| file.content.clone())
    }

    pub async fn filename(&self, id: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|file| file.filename.clone())
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Evicts entries older than the TTL and returns how many were
    /// removed. The write lock is held only for the retain pass, so
    /// concurrent `put`/`get` calls are never blocked for long.
    pub async fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, file| file.created_at.elapsed() <= ttl);

        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
