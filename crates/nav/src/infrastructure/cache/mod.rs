//! 缓存基础设施
//!
//! - `ttl_cache`: 进程内 TTL + 近似 LRU 缓存，带命中率统计
//! - `flight`: 同 key 并发请求合并
//! - `persist`: 缓存快照的带版本持久化

pub mod flight;
pub mod persist;
pub mod ttl_cache;
