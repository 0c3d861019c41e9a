//! 快照存储 trait 定义
//!
//! 缓存快照以字符串 blob 形式读写，序列化格式由上层负责

use arbor_errors::AppResult;
use async_trait::async_trait;

/// 快照存储 trait
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 读取快照，不存在时返回 None
    async fn load(&self) -> AppResult<Option<String>>;

    /// 写入快照（覆盖）
    async fn save(&self, blob: &str) -> AppResult<()>;

    /// 删除快照
    async fn clear(&self) -> AppResult<()>;
}
