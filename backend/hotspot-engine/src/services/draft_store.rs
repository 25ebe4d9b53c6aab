use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::error::{EngineError, EngineResult};
use crate::metrics::track_draft_operation;

/// Durable key/value home for encoded drafts and local templates.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load(&self, key: &str) -> EngineResult<Option<String>>;
    async fn save(&self, key: &str, value: &str) -> EngineResult<()>;
    async fn clear(&self, key: &str) -> EngineResult<()>;
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> EngineResult<()> {
        Ok(())
    }
}

pub struct RedisDraftStore {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisDraftStore {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn load(&self, key: &str) -> EngineResult<Option<String>> {
        let mut conn = self.redis.clone();

        track_draft_operation("get", async {
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
                .map_err(|e| EngineError::Persistence(format!("Failed to load draft {}: {}", key, e)))
        })
        .await
    }

    async fn save(&self, key: &str, value: &str) -> EngineResult<()> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if self.ttl_seconds > 0 {
            cmd.arg("EX").arg(self.ttl_seconds);
        }

        track_draft_operation("set", async {
            cmd.query_async::<()>(&mut conn)
                .await
                .map_err(|e| EngineError::Persistence(format!("Failed to save draft {}: {}", key, e)))
        })
        .await?;

        tracing::debug!("Draft saved: key={}, bytes={}", key, value.len());
        Ok(())
    }

    async fn clear(&self, key: &str) -> EngineResult<()> {
        let mut conn = self.redis.clone();

        track_draft_operation("del", async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<i64>(&mut conn)
                .await
                .map_err(|e| EngineError::Persistence(format!("Failed to clear draft {}: {}", key, e)))
        })
        .await?;

        tracing::debug!("Draft cleared: key={}", key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> EngineResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Persistence(format!("Redis PING failed: {}", e)))
    }
}

/// Process-local store used when Redis is not configured, and in tests.
#[derive(Clone, Default)]
pub struct MemoryDraftStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn load(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> EngineResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        tracing::debug!("Draft saved: key={}, bytes={}", key, value.len());
        Ok(())
    }

    async fn clear(&self, key: &str) -> EngineResult<()> {
        self.entries.write().await.remove(key);
        tracing::debug!("Draft cleared: key={}", key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
