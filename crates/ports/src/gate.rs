//! 权限后端 trait 定义
//!
//! 四个子检查各自对应后端的一个权限检查端点，调用方把它们视为
//! 可能失败的黑盒远程调用

use arbor_errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 权限检查请求
#[derive(Debug, Clone, Serialize)]
pub struct GateCheck {
    /// 主体标识（用户/角色/菜单/按钮 ID，取决于检查层级）
    pub subject: String,
    /// 资源标识（通常为路由路径）
    pub resource: String,
    /// 操作（如 "read"）
    pub action: String,
    /// 上下文环境（JSON 格式，可选）
    pub context: Option<String>,
}

impl GateCheck {
    pub fn new(
        subject: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
            action: action.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// 权限检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    /// 是否允许
    pub allowed: bool,
    /// 拒绝原因（如果被拒绝）
    pub reason: Option<String>,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// 权限后端 trait
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// 用户级检查
    async fn check_user(&self, check: &GateCheck) -> AppResult<GateDecision>;

    /// 角色级检查
    async fn check_role(&self, check: &GateCheck) -> AppResult<GateDecision>;

    /// 菜单级检查
    async fn check_menu(&self, check: &GateCheck) -> AppResult<GateDecision>;

    /// 按钮级检查
    async fn check_button(&self, check: &GateCheck) -> AppResult<GateDecision>;
}
