//! 用户权限快照（bundle）
//!
//! 后端针对单个用户返回的权限聚合，在一个缓存周期内视为不可变输入

use std::collections::HashSet;

use arbor_common::{UserId, UserProfile};
use arbor_errors::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::menu::{Button, MenuNode};
use super::permission::Permission;
use super::role::UserRoleInfo;

/// 数据范围限定
///
/// 限定已授予权限作用的数据行，与菜单/路由可见性正交
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    #[default]
    All,
    DeptAndChildren,
    DeptOnly,
    SelfOnly,
    Custom,
}

/// 用户权限快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPermissionInfo {
    pub user: UserProfile,
    pub roles: Vec<UserRoleInfo>,
    pub permissions: Vec<Permission>,
    pub menus: Vec<MenuNode>,
    pub buttons: Vec<Button>,
    #[serde(default)]
    pub dept_permissions: Vec<String>,
    #[serde(default)]
    pub data_scope: DataScope,
}

impl UserPermissionInfo {
    pub fn new(user: UserProfile) -> Self {
        Self {
            user,
            roles: Vec::new(),
            permissions: Vec::new(),
            menus: Vec::new(),
            buttons: Vec::new(),
            dept_permissions: Vec::new(),
            data_scope: DataScope::default(),
        }
    }

    /// 已启用权限的 key 集合
    pub fn permission_key_set(&self) -> HashSet<&str> {
        self.permissions
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| p.key.as_str())
            .collect()
    }

    /// 当前生效的角色 key 列表（剔除停用与过期授予）
    pub fn effective_role_keys(&self) -> Vec<String> {
        let now = Utc::now();
        self.roles
            .iter()
            .filter(|grant| grant.is_effective(now))
            .map(|grant| grant.role.key.clone())
            .collect()
    }
}

/// 权限快照来源
///
/// 加载失败直接向上传播：快照没有可用的部分结果可以回退
#[async_trait]
pub trait PermissionBundleSource: Send + Sync {
    async fn load(&self, user_id: &UserId) -> AppResult<UserPermissionInfo>;
}
