//! 角色维度的可见性判定

use super::bundle::UserPermissionInfo;
use super::menu::MenuNode;

/// 角色可见性判定 trait
///
/// 菜单过滤除权限 key 交集外还要通过一次角色检查；判定策略通过
/// 此接口注入，便于在不改动过滤器的情况下替换
pub trait PermissionResolver: Send + Sync {
    /// 节点对该用户的角色集合是否可见
    fn role_allows(&self, node: &MenuNode, bundle: &UserPermissionInfo) -> bool;

    /// 用户当前生效的角色 key
    fn effective_role_keys(&self, bundle: &UserPermissionInfo) -> Vec<String> {
        bundle.effective_role_keys()
    }
}

/// 全放行判定
///
/// 占位实现：菜单节点尚未建模逐节点的角色约束，后端也未下发该数据，
/// 在此之前所有角色检查一律放行。接入真实角色约束时替换注入的
/// 实现即可，不要依赖这里的放行语义做安全决策
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantAllResolver;

impl PermissionResolver for GrantAllResolver {
    fn role_allows(&self, _node: &MenuNode, _bundle: &UserPermissionInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::{UserId, UserProfile};

    #[test]
    fn test_grant_all_resolver_allows_everything() {
        let resolver = GrantAllResolver;
        let bundle = UserPermissionInfo::new(UserProfile::new(UserId::new(), "guest"));
        let node = MenuNode::new("User", "user", "/system/user");

        assert!(resolver.role_allows(&node, &bundle));
        assert!(resolver.effective_role_keys(&bundle).is_empty());
    }
}
