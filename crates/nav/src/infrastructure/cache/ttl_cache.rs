//! 进程内 TTL 缓存
//!
//! 每个条目携带独立 TTL；读到过期条目时惰性删除并计一次未命中。
//! 容量达到上限后按最近访问时间淘汰最旧的十分之一（近似 LRU，
//! 不维护严格的访问链表）。实例由应用根显式构造并注入使用方，
//! 不同功能共享实例时按 `nav:{feature}:{subject}` 约定命名 key

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arbor_telemetry::{METRIC_CACHE_HITS_TOTAL, METRIC_CACHE_MISSES_TOTAL};
use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

/// 缓存配置
#[derive(Debug, Clone)]
pub struct TtlCacheConfig {
    /// 未显式指定 TTL 时使用的默认值
    pub default_ttl: Duration,
    /// 最大条目数
    pub max_entries: usize,
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_entries: 1000,
        }
    }
}

/// 缓存条目
///
/// 不变量：`expires_at = created_at + ttl`；`now > expires_at` 的条目
/// 逻辑上已不存在，即使尚未被物理清除
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
    last_accessed_at: Instant,
    /// 值的 JSON 序列化长度，用于观测
    size: usize,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// 缓存统计
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// 物理存在的条目数
    pub total: usize,
    /// 其中逻辑有效的条目数
    pub valid: usize,
    /// 其中已过期待清除的条目数
    pub expired: usize,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses)，无访问时为 0
    pub hit_rate: f64,
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// TTL 缓存
pub struct TtlCache<V> {
    name: String,
    config: TtlCacheConfig,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone + Serialize + Send + 'static> TtlCache<V> {
    pub fn new(name: impl Into<String>, config: TtlCacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// 以默认 TTL 写入
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.default_ttl);
    }

    /// 以指定 TTL 写入
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let size = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(0);
        let now = Instant::now();

        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_entries {
            self.evict_locked(&mut inner, now);
        }
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                access_count: 0,
                last_accessed_at: now,
                size,
            },
        );
    }

    /// 读取；过期条目被惰性删除并按未命中计数
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let expired = inner.entries.get(key).map(|e| e.is_expired(now));
        match expired {
            None => {
                inner.misses += 1;
                counter!(METRIC_CACHE_MISSES_TOTAL, "cache" => self.name.clone()).increment(1);
                None
            }
            Some(true) => {
                inner.entries.remove(key);
                inner.misses += 1;
                counter!(METRIC_CACHE_MISSES_TOTAL, "cache" => self.name.clone()).increment(1);
                debug!(cache = %self.name, key = %key, "Expired cache entry evicted on read");
                None
            }
            Some(false) => {
                let entry = inner
                    .entries
                    .get_mut(key)
                    .unwrap_or_else(|| unreachable!("entry checked above"));
                entry.access_count += 1;
                entry.last_accessed_at = now;
                let value = entry.value.clone();
                inner.hits += 1;
                counter!(METRIC_CACHE_HITS_TOTAL, "cache" => self.name.clone()).increment(1);
                Some(value)
            }
        }
    }

    /// 逻辑存在性检查，不触碰命中/未命中计数
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner
            .entries
            .get(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// 删除条目，返回条目此前是否物理存在
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.remove(key).is_some()
    }

    /// 清空全部条目（统计保留）
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.entries.clear();
    }

    /// 物理条目数（含已过期待清除的）
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 统计快照
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let total = inner.entries.len();
        let expired = inner
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .count();
        let accesses = inner.hits + inner.misses;
        CacheStats {
            total,
            valid: total - expired,
            expired,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if accesses == 0 {
                0.0
            } else {
                inner.hits as f64 / accesses as f64
            },
        }
    }

    /// 清除所有已过期条目，返回清除数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        before - inner.entries.len()
    }

    /// 启动后台清扫任务
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // 第一个 tick 立即返回
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(cache = %cache.name, purged, "Cache sweep");
                }
            }
        })
    }

    /// 导出所有未过期条目及其剩余 TTL（供快照持久化）
    pub fn dump(&self) -> Vec<(String, V, Duration)> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, e)| (k.clone(), e.value.clone(), e.expires_at - now))
            .collect()
    }

    /// 淘汰最近最少访问的一批条目（持锁调用）
    fn evict_locked(&self, inner: &mut CacheInner<V>, now: Instant) {
        // 先让过期条目出局，过期清理可能已经腾出空间
        inner.entries.retain(|_, e| !e.is_expired(now));
        if inner.entries.len() < self.config.max_entries {
            return;
        }

        let evict_count = (self.config.max_entries / 10).max(1);
        let mut by_access: Vec<(String, Instant)> = inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_accessed_at))
            .collect();
        by_access.sort_by_key(|(_, at)| *at);

        for (key, _) in by_access.into_iter().take(evict_count) {
            inner.entries.remove(&key);
        }
        debug!(cache = %self.name, evicted = evict_count, "Cache eviction");
    }
}
