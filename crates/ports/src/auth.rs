//! 会话状态 trait 定义
//!
//! 导航管线只读取认证状态，不拥有它

use arbor_common::UserProfile;
use arbor_errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 当前会话快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSnapshot {
    /// 是否已认证
    pub authenticated: bool,
    /// 用户概要（已认证但概要尚未加载时为 None）
    pub user: Option<UserProfile>,
}

impl AuthSnapshot {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user: None,
        }
    }

    pub fn authenticated(user: UserProfile) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
        }
    }

    /// 已认证但概要尚未就绪
    pub fn pending_profile() -> Self {
        Self {
            authenticated: true,
            user: None,
        }
    }
}

/// 会话状态 trait
#[async_trait]
pub trait AuthState: Send + Sync {
    /// 读取当前会话快照（同步视图，不触发网络）
    fn snapshot(&self) -> AuthSnapshot;

    /// 异步获取用户概要，未登录时返回 None
    async fn user_profile(&self) -> AppResult<Option<UserProfile>>;
}
