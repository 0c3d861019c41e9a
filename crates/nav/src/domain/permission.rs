//! 权限实体

use arbor_common::{EntryStatus, PermissionId};
use serde::{Deserialize, Serialize};

/// 权限挂载的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Menu,
    Button,
    Api,
}

/// 权限实体
///
/// 一条权限代表对某个资源路径执行某个操作的许可，
/// 例如: (menu, "/system/user", "read")。`key` 在同一资源类型内
/// 预期唯一，但本层不强制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    /// 权限代码（如 "sys:user:view"）
    pub key: String,
    pub resource_type: ResourceType,
    /// 资源路径（菜单路径或按钮归属路径）
    pub resource_path: String,
    /// 操作标识（如 "read", "write"）
    pub action: String,
    pub status: EntryStatus,
}

impl Permission {
    pub fn new(
        key: impl Into<String>,
        resource_type: ResourceType,
        resource_path: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: PermissionId::new(),
            key: key.into(),
            resource_type,
            resource_path: resource_path.into(),
            action: action.into(),
            status: EntryStatus::Enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }

    /// 是否准确挂载在给定路径上
    pub fn matches_path(&self, path: &str) -> bool {
        self.resource_path == path
    }
}
