//! 缓存快照持久化
//!
//! 把缓存中未过期的条目连同墙钟过期时间一起序列化为带版本号的
//! JSON blob，经 `SnapshotStore` 落盘；冷启动时回灌。快照损坏或
//! 版本不匹配一律降级为冷启动，绝不向调用方抛错

use std::marker::PhantomData;
use std::sync::Arc;

use arbor_errors::{AppError, AppResult};
use arbor_ports::SnapshotStore;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ttl_cache::TtlCache;

/// 快照格式版本；版本不匹配的快照直接丢弃
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheSnapshot<V> {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<(String, PersistedEntry<V>)>,
}

/// 缓存快照持久化器
pub struct SnapshotPersister<V> {
    store: Arc<dyn SnapshotStore>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> SnapshotPersister<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// 把缓存当前的有效条目写成快照
    pub async fn save(&self, cache: &TtlCache<V>) -> AppResult<()> {
        let now = Utc::now();
        let entries: Vec<(String, PersistedEntry<V>)> = cache
            .dump()
            .into_iter()
            .map(|(key, value, remaining)| {
                let expires_at = now
                    + chrono::Duration::from_std(remaining)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                (key, PersistedEntry { value, expires_at })
            })
            .collect();

        let snapshot = CacheSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            entries,
        };
        let blob = serde_json::to_string(&snapshot)
            .map_err(|e| AppError::serialization(format!("Failed to encode snapshot: {}", e)))?;
        self.store.save(&blob).await
    }

    /// 从快照回灌缓存，返回恢复的条目数
    ///
    /// 任何形式的快照损坏都记录日志并按冷启动处理（返回 0）
    pub async fn load_into(&self, cache: &TtlCache<V>) -> AppResult<usize> {
        let blob = match self.store.load().await? {
            Some(blob) => blob,
            None => return Ok(0),
        };

        let snapshot: CacheSnapshot<V> = match serde_json::from_str(&blob) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Malformed cache snapshot, cold start");
                return Ok(0);
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Cache snapshot version mismatch, cold start"
            );
            return Ok(0);
        }

        let now = Utc::now();
        let mut restored = 0usize;
        for (key, entry) in snapshot.entries {
            let Ok(remaining) = (entry.expires_at - now).to_std() else {
                // 落盘期间已过期
                continue;
            };
            if remaining.is_zero() {
                continue;
            }
            cache.set_with_ttl(key, entry.value, remaining);
            restored += 1;
        }

        info!(restored, saved_at = %snapshot.saved_at, "Cache snapshot restored");
        Ok(restored)
    }
}
