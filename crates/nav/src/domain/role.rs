//! 角色实体与用户-角色授予

use arbor_common::{EntryStatus, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 角色实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    /// 角色代码（如 "admin"）
    pub key: String,
    pub name: String,
    pub status: EntryStatus,
}

impl Role {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(),
            key: key.into(),
            name: name.into(),
            status: EntryStatus::Enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }
}

/// 用户-角色授予信息
///
/// 角色与用户多对多；授予本身携带生效窗口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoleInfo {
    pub role: Role,
    pub assigned_by: Option<UserId>,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl UserRoleInfo {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            assigned_by: None,
            assigned_at: Utc::now(),
            expires_at: None,
            is_active: true,
        }
    }

    pub fn with_assigned_by(mut self, user_id: UserId) -> Self {
        self.assigned_by = Some(user_id);
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// 授予在给定时刻是否生效
    ///
    /// 停用、过期或角色本身被禁用的授予一律视为无效
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || !self.role.is_enabled() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_grant_without_expiry_is_effective() {
        let grant = UserRoleInfo::new(Role::new("admin", "Administrator"));
        assert!(grant.is_effective(Utc::now()));
    }

    #[test]
    fn test_expired_grant_is_not_effective() {
        let now = Utc::now();
        let grant =
            UserRoleInfo::new(Role::new("auditor", "Auditor")).with_expiry(now - Duration::hours(1));
        assert!(!grant.is_effective(now));
    }

    #[test]
    fn test_inactive_grant_is_not_effective() {
        let mut grant = UserRoleInfo::new(Role::new("editor", "Editor"));
        grant.is_active = false;
        assert!(!grant.is_effective(Utc::now()));
    }

    #[test]
    fn test_disabled_role_is_not_effective() {
        let mut role = Role::new("legacy", "Legacy");
        role.status = EntryStatus::Disabled;
        let grant = UserRoleInfo::new(role);
        assert!(!grant.is_effective(Utc::now()));
    }
}
