//! arbor-adapter-store - 快照落盘适配器
//!
//! 把缓存快照 blob 原样写到本地文件。写入走临时文件 + rename，
//! 避免进程中途退出留下半截快照

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use arbor_errors::{AppError, AppResult};
use arbor_ports::SnapshotStore;
use async_trait::async_trait;
use tracing::debug;

/// 文件快照存储
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> AppResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::internal(format!(
                "Failed to read snapshot {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, blob: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::internal(format!("Failed to create snapshot dir: {}", e))
            })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, blob)
            .await
            .map_err(|e| AppError::internal(format!("Failed to write snapshot: {}", e)))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| AppError::internal(format!("Failed to publish snapshot: {}", e)))?;

        debug!(path = %self.path.display(), bytes = blob.len(), "Snapshot written");
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::internal(format!(
                "Failed to remove snapshot: {}",
                e
            ))),
        }
    }
}
