use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::identity::ContentIdentifier;
use crate::utils::sanitize_filename;
use crate::Result;

/// The memoized outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: ContentIdentifier,
    pub url: String,
    pub title: String,
    pub source: String,
    pub description: String,
    pub text: String,
}

/// Host key-value store. Eviction and durability belong to the implementation.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<TranscriptRecord>>;

    async fn set(&self, key: &str, record: &TranscriptRecord) -> Result<()>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, TranscriptRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<TranscriptRecord>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, record: &TranscriptRecord) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }
}

/// Store keeping one JSON document per key under a directory
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs_err::create_dir_all(&dir).context("Failed to create cache directory")?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let name = sanitize_filename(&key.replace('/', "__"));
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> Result<Option<TranscriptRecord>> {
        let path = self.entry_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read cache entry {}", path.display()))
            }
        };

        let record = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt cache entry {}", path.display()))?;
        Ok(Some(record))
    }

    async fn set(&self, key: &str, record: &TranscriptRecord) -> Result<()> {
        let path = self.entry_path(key);
        let content = serde_json::to_string_pretty(record).context("Failed to serialize record")?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write cache entry {}", path.display()))?;
        Ok(())
    }
}

/// Namespaced view over a [`CacheStore`]; keys are `<namespace>/<id>`
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
    namespace: String,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn key(&self, id: &ContentIdentifier) -> String {
        format!("{}/{}", self.namespace, id)
    }

    pub async fn get(&self, id: &ContentIdentifier) -> Result<Option<TranscriptRecord>> {
        self.store.get(&self.key(id)).await
    }

    pub async fn set(&self, id: &ContentIdentifier, record: &TranscriptRecord) -> Result<()> {
        self.store.set(&self.key(id), record).await
    }
}
