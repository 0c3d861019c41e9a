//! 动态路由生成器
//!
//! 把用户权限快照展开成路由描述符：每个可见的菜单型节点产出一条
//! 路由（保留树形嵌套），每个启用的按钮产出一条隐藏的叶子路由。
//! 权限关联都是精确匹配——菜单按 resource_path 等值、按钮按
//! key 等值索引，不做子串匹配

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arbor_common::{MenuId, UserId};
use arbor_errors::AppResult;
use tracing::{debug, warn};

use crate::application::filter::{MAX_FILTER_DEPTH, MAX_FILTER_NODES};
use crate::domain::bundle::{PermissionBundleSource, UserPermissionInfo};
use crate::domain::menu::MenuNode;
use crate::domain::permission::Permission;
use crate::domain::resolver::PermissionResolver;
use crate::domain::route::{RouteConfig, RouteOrigin};

/// 动态路由生成器
pub struct RouteGenerator {
    source: Arc<dyn PermissionBundleSource>,
    resolver: Arc<dyn PermissionResolver>,
}

impl RouteGenerator {
    pub fn new(
        source: Arc<dyn PermissionBundleSource>,
        resolver: Arc<dyn PermissionResolver>,
    ) -> Self {
        Self { source, resolver }
    }

    /// 加载用户权限快照并生成可访问的路由表
    ///
    /// 快照加载失败原样向上传播，没有部分结果可回退
    pub async fn generate(&self, user_id: &UserId) -> AppResult<Vec<RouteConfig>> {
        let bundle = self.source.load(user_id).await?;
        Ok(self.generate_from(&bundle))
    }

    /// 从已有快照生成可访问的路由表
    pub fn generate_from(&self, bundle: &UserPermissionInfo) -> Vec<RouteConfig> {
        // resource_path 等值索引（菜单路由用）
        let mut by_path: HashMap<&str, Vec<&Permission>> = HashMap::new();
        // key 等值索引（按钮路由用）
        let mut by_key: HashMap<&str, &Permission> = HashMap::new();
        for perm in bundle.permissions.iter().filter(|p| p.is_enabled()) {
            by_path.entry(perm.resource_path.as_str()).or_default().push(perm);
            by_key.insert(perm.key.as_str(), perm);
        }

        let mut menu_index: HashMap<MenuId, &MenuNode> = HashMap::new();
        index_menus(&bundle.menus, &mut menu_index);

        let mut budget = MAX_FILTER_NODES;
        let mut routes =
            self.menu_routes(&bundle.menus, &by_path, &mut HashSet::new(), 0, &mut budget);
        routes.extend(self.button_routes(bundle, &by_key, &menu_index));

        let role_keys: HashSet<String> =
            self.resolver.effective_role_keys(bundle).into_iter().collect();
        let permission_keys = bundle.permission_key_set();
        let routes = retain_accessible(routes, &role_keys, &permission_keys);

        debug!(
            user = %bundle.user.id,
            routes = routes.len(),
            "Dynamic routes generated"
        );
        routes
    }

    /// 菜单型节点产出的路由（带嵌套）
    ///
    /// 目录节点本身不产出路由，其子节点的路由上提一层
    fn menu_routes(
        &self,
        nodes: &[MenuNode],
        by_path: &HashMap<&str, Vec<&Permission>>,
        path_visited: &mut HashSet<MenuId>,
        depth: usize,
        budget: &mut usize,
    ) -> Vec<RouteConfig> {
        if depth >= MAX_FILTER_DEPTH {
            warn!(depth, "Route generation depth limit reached, branch truncated");
            return Vec::new();
        }

        let mut routes = Vec::new();
        for node in nodes {
            if *budget == 0 {
                warn!("Route generation node budget exhausted, walk truncated");
                break;
            }
            *budget -= 1;
            if path_visited.contains(&node.id) {
                warn!(node_id = %node.id, "Cycle detected during route generation, branch skipped");
                continue;
            }
            path_visited.insert(node.id.clone());
            let child_routes =
                self.menu_routes(&node.children, by_path, path_visited, depth + 1, budget);
            path_visited.remove(&node.id);

            if node.is_routable() && node.visible && node.is_enabled() {
                let mut route = RouteConfig::new(&node.path, &node.key, RouteOrigin::Menu);
                route.title = node.name.clone();
                route.meta.icon = node.icon.clone();
                route.meta.order = node.sort_order;
                route.permissions = by_path
                    .get(node.path.as_str())
                    .map(|perms| perms.iter().map(|p| p.key.clone()).collect())
                    .unwrap_or_default();
                route.children = child_routes;
                routes.push(route);
            } else {
                // 不产出路由的节点：子路由上提
                routes.extend(child_routes);
            }
        }
        routes
    }

    /// 启用按钮产出的隐藏路由
    fn button_routes(
        &self,
        bundle: &UserPermissionInfo,
        by_key: &HashMap<&str, &Permission>,
        menu_index: &HashMap<MenuId, &MenuNode>,
    ) -> Vec<RouteConfig> {
        bundle
            .buttons
            .iter()
            .filter(|b| b.is_enabled())
            .map(|button| {
                let menu_path = menu_index
                    .get(&button.menu_id)
                    .map(|m| m.path.as_str())
                    .unwrap_or("");
                let mut route = RouteConfig::new(
                    format!("{}#{}", menu_path, button.key),
                    &button.key,
                    RouteOrigin::Button,
                );
                route.title = button.name.clone();
                route.hidden = true;
                if let Some(perm) = by_key.get(button.key.as_str()) {
                    route.permissions = vec![perm.key.clone()];
                }
                route
            })
            .collect()
    }
}

/// 按声明的要求筛选路由：角色匹配与权限匹配取与，任一侧为空即自动通过
fn retain_accessible(
    routes: Vec<RouteConfig>,
    role_keys: &HashSet<String>,
    permission_keys: &HashSet<&str>,
) -> Vec<RouteConfig> {
    routes
        .into_iter()
        .filter_map(|mut route| {
            let role_ok = route.roles.is_empty()
                || route.roles.iter().any(|r| role_keys.contains(r));
            let perm_ok = route.permissions.is_empty()
                || route
                    .permissions
                    .iter()
                    .any(|p| permission_keys.contains(p.as_str()));
            if !(role_ok && perm_ok) {
                return None;
            }
            route.children = retain_accessible(
                std::mem::take(&mut route.children),
                role_keys,
                permission_keys,
            );
            Some(route)
        })
        .collect()
}

/// 展平菜单树为 ID 索引（带防御上限）
fn index_menus<'a>(nodes: &'a [MenuNode], index: &mut HashMap<MenuId, &'a MenuNode>) {
    for node in nodes {
        if index.len() >= MAX_FILTER_NODES {
            return;
        }
        if index.contains_key(&node.id) {
            continue;
        }
        index.insert(node.id.clone(), node);
        index_menus(&node.children, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::menu::Button;
    use crate::domain::permission::ResourceType;
    use crate::domain::resolver::GrantAllResolver;
    use arbor_common::UserProfile;
    use arbor_errors::AppError;
    use async_trait::async_trait;

    struct MockSource {
        bundle: Option<UserPermissionInfo>,
    }

    #[async_trait]
    impl PermissionBundleSource for MockSource {
        async fn load(&self, _user_id: &UserId) -> AppResult<UserPermissionInfo> {
            self.bundle
                .clone()
                .ok_or_else(|| AppError::external_service("bundle service unavailable"))
        }
    }

    fn generator(bundle: Option<UserPermissionInfo>) -> RouteGenerator {
        RouteGenerator::new(
            Arc::new(MockSource { bundle }),
            Arc::new(GrantAllResolver),
        )
    }

    fn base_bundle() -> UserPermissionInfo {
        UserPermissionInfo::new(UserProfile::new(UserId::new(), "admin"))
    }

    #[test]
    fn test_menu_route_with_exact_path_permission() {
        let mut bundle = base_bundle();
        bundle.permissions.push(Permission::new(
            "sys:user:view",
            ResourceType::Menu,
            "/system/user",
            "read",
        ));
        bundle
            .menus
            .push(MenuNode::new("User", "user", "/system/user"));

        let routes = generator(None).generate_from(&bundle);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/system/user");
        assert_eq!(routes[0].permissions, vec!["sys:user:view".to_string()]);
    }

    #[test]
    fn test_directory_children_are_hoisted() {
        let mut bundle = base_bundle();
        bundle.menus.push(
            MenuNode::directory("System", "system")
                .with_child(MenuNode::new("User", "user", "/system/user")),
        );

        let routes = generator(None).generate_from(&bundle);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/system/user");
    }

    #[test]
    fn test_button_association_is_exact_not_substring() {
        let mut bundle = base_bundle();
        let menu = MenuNode::new("User", "user", "/system/user");
        let menu_id = menu.id.clone();
        bundle.menus.push(menu);
        // 按钮 key 是权限 resource_path 的子串，但 key 并不相等
        bundle.permissions.push(Permission::new(
            "sys:user:export",
            ResourceType::Button,
            "/system/user/export",
            "write",
        ));
        bundle
            .buttons
            .push(Button::new("Export", "user", menu_id.clone()));
        bundle
            .buttons
            .push(Button::new("Export all", "sys:user:export", menu_id));

        let routes = generator(None).generate_from(&bundle);
        let button_routes: Vec<_> = routes
            .iter()
            .filter(|r| r.meta.origin == RouteOrigin::Button)
            .collect();

        assert_eq!(button_routes.len(), 2);
        let loose = button_routes.iter().find(|r| r.name == "user").unwrap();
        let exact = button_routes
            .iter()
            .find(|r| r.name == "sys:user:export")
            .unwrap();
        // 子串命中不再产生关联
        assert!(loose.permissions.is_empty());
        assert_eq!(exact.permissions, vec!["sys:user:export".to_string()]);
        assert!(exact.hidden);
        assert_eq!(exact.path, "/system/user#sys:user:export");
    }

    #[test]
    fn test_unrestricted_route_auto_passes() {
        let mut bundle = base_bundle();
        bundle.menus.push(MenuNode::new("Home", "home", "/home"));

        let routes = generator(None).generate_from(&bundle);

        assert_eq!(routes.len(), 1);
        assert!(routes[0].is_unrestricted());
    }

    #[test]
    fn test_route_requiring_missing_permission_is_dropped() {
        let mut route = RouteConfig::new("/system/audit", "audit", RouteOrigin::Menu);
        route.permissions = vec!["sys:audit:view".to_string()];

        let kept = retain_accessible(vec![route], &HashSet::new(), &HashSet::new());
        assert!(kept.is_empty());
    }

    #[test]
    fn test_route_requiring_missing_role_is_dropped() {
        let mut route = RouteConfig::new("/system/audit", "audit", RouteOrigin::Menu);
        route.roles = vec!["admin".to_string()];

        let mut permission_keys = HashSet::new();
        permission_keys.insert("sys:audit:view");
        let kept = retain_accessible(vec![route], &HashSet::new(), &permission_keys);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_route_with_matching_role_is_kept() {
        let mut route = RouteConfig::new("/system/audit", "audit", RouteOrigin::Menu);
        route.roles = vec!["admin".to_string()];

        let mut role_keys = HashSet::new();
        role_keys.insert("admin".to_string());
        let kept = retain_accessible(vec![route], &role_keys, &HashSet::new());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_hidden_menu_produces_no_route_but_children_survive() {
        let mut bundle = base_bundle();
        bundle.menus.push(
            MenuNode::new("Legacy", "legacy", "/legacy")
                .hidden()
                .with_child(MenuNode::new("Kept", "kept", "/legacy/kept")),
        );

        let routes = generator(None).generate_from(&bundle);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/legacy/kept");
    }

    #[tokio::test]
    async fn test_bundle_load_failure_propagates() {
        let result = generator(None).generate(&UserId::new()).await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_generate_loads_bundle_from_source() {
        let mut bundle = base_bundle();
        bundle.menus.push(MenuNode::new("Home", "home", "/home"));

        let routes = generator(Some(bundle))
            .generate(&UserId::new())
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
    }
}
