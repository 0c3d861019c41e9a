//! 菜单路由编排
//!
//! 缓存优先地加载用户权限快照，过滤菜单树，按 sort_order 排序，
//! 定位当前路径对应的活动节点并构建面包屑。产出的 `NavigationView`
//! 是交给渲染层的纯数据结构

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use arbor_common::{MenuId, UserId};
use arbor_errors::AppResult;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::filter::{FilterStats, MAX_FILTER_DEPTH, MenuFilter};
use crate::domain::bundle::{PermissionBundleSource, UserPermissionInfo};
use crate::domain::menu::{MenuNode, sort_tree};
use crate::infrastructure::cache::ttl_cache::TtlCache;

/// 面包屑条目，从根到活动节点
#[derive(Debug, Clone, PartialEq)]
pub struct BreadcrumbItem {
    pub id: MenuId,
    pub name: String,
    pub path: String,
}

/// 导航视图
#[derive(Debug, Clone)]
pub struct NavigationView {
    /// 过滤并排序后的菜单树
    pub menus: Vec<MenuNode>,
    /// 与当前路径精确匹配的节点
    pub active_menu: Option<MenuNode>,
    pub breadcrumbs: Vec<BreadcrumbItem>,
    pub stats: FilterStats,
    pub generated_at: DateTime<Utc>,
}

/// 菜单路由编排器
pub struct MenuRouter {
    source: Arc<dyn PermissionBundleSource>,
    cache: Arc<TtlCache<UserPermissionInfo>>,
    filter: MenuFilter,
    last_view: RwLock<Option<NavigationView>>,
}

impl MenuRouter {
    pub fn new(
        source: Arc<dyn PermissionBundleSource>,
        cache: Arc<TtlCache<UserPermissionInfo>>,
        filter: MenuFilter,
    ) -> Self {
        Self {
            source,
            cache,
            filter,
            last_view: RwLock::new(None),
        }
    }

    fn bundle_key(user_id: &UserId) -> String {
        format!("nav:bundle:{}", user_id)
    }

    /// 缓存优先加载快照，未命中时回源并写回
    async fn load_bundle(&self, user_id: &UserId) -> AppResult<UserPermissionInfo> {
        let key = Self::bundle_key(user_id);
        if let Some(bundle) = self.cache.get(&key) {
            debug!(user = %user_id, "Permission bundle served from cache");
            return Ok(bundle);
        }

        let bundle = self.source.load(user_id).await?;
        self.cache.set(key, bundle.clone());
        Ok(bundle)
    }

    /// 为当前路径解析导航视图
    pub async fn resolve(
        &self,
        user_id: &UserId,
        current_path: &str,
    ) -> AppResult<NavigationView> {
        let bundle = self.load_bundle(user_id).await?;
        let outcome = self.filter.filter(&bundle.menus, &bundle);

        let mut menus = outcome.filtered;
        sort_tree(&mut menus);

        let active_menu = find_active(&menus, current_path);
        let breadcrumbs = active_menu
            .as_ref()
            .map(|active| build_breadcrumbs(&menus, active))
            .unwrap_or_default();

        let view = NavigationView {
            menus,
            active_menu,
            breadcrumbs,
            stats: outcome.stats,
            generated_at: Utc::now(),
        };
        *self.last_view.write().expect("router view lock poisoned") = Some(view.clone());
        Ok(view)
    }

    /// 最近一次成功解析的视图
    pub fn current_view(&self) -> Option<NavigationView> {
        self.last_view
            .read()
            .expect("router view lock poisoned")
            .clone()
    }

    /// 丢弃用户的缓存快照（登出 / 管理端清缓存）
    pub fn invalidate(&self, user_id: &UserId) -> bool {
        self.cache.remove(&Self::bundle_key(user_id))
    }
}

/// 深度优先查找与路径精确匹配的第一个节点
fn find_active(nodes: &[MenuNode], path: &str) -> Option<MenuNode> {
    for node in nodes {
        if node.path == path && node.is_routable() {
            return Some(node.clone());
        }
        if let Some(found) = find_active(&node.children, path) {
            return Some(found);
        }
    }
    None
}

/// 沿 parent_id 链从活动节点走到根，产出根在前的面包屑
///
/// parent_id 图可能失守，walk 带 visited 集与深度上限防御
fn build_breadcrumbs(menus: &[MenuNode], active: &MenuNode) -> Vec<BreadcrumbItem> {
    let mut index: HashMap<MenuId, (&MenuNode, Option<MenuId>)> = HashMap::new();
    index_with_parent(menus, None, &mut index);

    let mut chain = vec![BreadcrumbItem {
        id: active.id.clone(),
        name: active.name.clone(),
        path: active.path.clone(),
    }];
    let mut visited: HashSet<MenuId> = HashSet::new();
    visited.insert(active.id.clone());

    let mut cursor = active.parent_id.clone();
    while let Some(parent_id) = cursor {
        if visited.contains(&parent_id) || chain.len() >= MAX_FILTER_DEPTH {
            tracing::warn!(node_id = %parent_id, "Breadcrumb walk aborted");
            break;
        }
        let Some((node, grandparent)) = index.get(&parent_id) else {
            break;
        };
        chain.push(BreadcrumbItem {
            id: node.id.clone(),
            name: node.name.clone(),
            path: node.path.clone(),
        });
        visited.insert(parent_id);
        cursor = grandparent.clone();
    }

    chain.reverse();
    chain
}

fn index_with_parent<'a>(
    nodes: &'a [MenuNode],
    parent: Option<MenuId>,
    index: &mut HashMap<MenuId, (&'a MenuNode, Option<MenuId>)>,
) {
    for node in nodes {
        if index.contains_key(&node.id) {
            continue;
        }
        index.insert(node.id.clone(), (node, parent.clone()));
        index_with_parent(&node.children, Some(node.id.clone()), index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::ttl_cache::TtlCacheConfig;
    use arbor_common::UserProfile;
    use arbor_errors::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        bundle: Option<UserPermissionInfo>,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl PermissionBundleSource for MockSource {
        async fn load(&self, _user_id: &UserId) -> AppResult<UserPermissionInfo> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.bundle
                .clone()
                .ok_or_else(|| AppError::external_service("bundle service unavailable"))
        }
    }

    fn bundle() -> UserPermissionInfo {
        let mut bundle = UserPermissionInfo::new(UserProfile::new(UserId::new(), "admin"));
        bundle.menus.push(
            MenuNode::directory("System", "system")
                .with_sort_order(2)
                .with_child(
                    MenuNode::new("User", "user", "/system/user").with_sort_order(2),
                )
                .with_child(
                    MenuNode::new("Dept", "dept", "/system/dept").with_sort_order(1),
                ),
        );
        bundle
            .menus
            .push(MenuNode::new("Home", "home", "/home").with_sort_order(1));
        bundle
    }

    fn router(bundle: Option<UserPermissionInfo>) -> (MenuRouter, Arc<MockSource>) {
        let source = Arc::new(MockSource {
            bundle,
            loads: AtomicUsize::new(0),
        });
        let cache = Arc::new(TtlCache::new("bundle", TtlCacheConfig::default()));
        (
            MenuRouter::new(source.clone(), cache, MenuFilter::with_grant_all()),
            source,
        )
    }

    #[tokio::test]
    async fn test_resolve_builds_sorted_view() {
        let (router, _) = router(Some(bundle()));

        let view = router
            .resolve(&UserId::new(), "/system/user")
            .await
            .unwrap();

        // Home 排在 System 目录之前，目录内部 Dept 在 User 之前
        assert_eq!(view.menus[0].name, "Home");
        assert_eq!(view.menus[1].children[0].name, "Dept");
        assert_eq!(view.stats.visible, 4);
    }

    #[tokio::test]
    async fn test_active_menu_and_breadcrumbs() {
        let (router, _) = router(Some(bundle()));

        let view = router
            .resolve(&UserId::new(), "/system/user")
            .await
            .unwrap();

        let active = view.active_menu.unwrap();
        assert_eq!(active.path, "/system/user");
        let names: Vec<&str> = view.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["System", "User"]);
    }

    #[tokio::test]
    async fn test_unknown_path_has_no_active_menu() {
        let (router, _) = router(Some(bundle()));

        let view = router.resolve(&UserId::new(), "/missing").await.unwrap();

        assert!(view.active_menu.is_none());
        assert!(view.breadcrumbs.is_empty());
    }

    #[tokio::test]
    async fn test_bundle_is_cache_first() {
        let (router, source) = router(Some(bundle()));
        let user = UserId::new();

        router.resolve(&user, "/home").await.unwrap();
        router.resolve(&user, "/system/user").await.unwrap();

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let (router, source) = router(Some(bundle()));
        let user = UserId::new();

        router.resolve(&user, "/home").await.unwrap();
        assert!(router.invalidate(&user));
        router.resolve(&user, "/home").await.unwrap();

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let (router, _) = router(None);

        let result = router.resolve(&UserId::new(), "/home").await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn test_current_view_tracks_last_resolve() {
        let (router, _) = router(Some(bundle()));
        assert!(router.current_view().is_none());

        router.resolve(&UserId::new(), "/home").await.unwrap();

        let view = router.current_view().unwrap();
        assert_eq!(view.active_menu.unwrap().path, "/home");
    }
}
