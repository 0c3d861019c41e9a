//! 菜单权限过滤器
//!
//! 按用户权限快照裁剪菜单树。子节点先于父节点的最终裁决被过滤
//! （深度优先、后序），父节点自身通过检查时即使子节点全部被剪
//! 也会保留。对同一快照过滤是幂等的：已过滤的树再过滤一次不会
//! 继续收缩

use std::collections::HashSet;
use std::sync::Arc;

use arbor_common::MenuId;
use tracing::warn;

use crate::domain::bundle::UserPermissionInfo;
use crate::domain::menu::MenuNode;
use crate::domain::resolver::{GrantAllResolver, PermissionResolver};

/// 单次过滤最多访问的节点数
pub const MAX_FILTER_NODES: usize = 5000;
/// 单次过滤最多下降的层数
pub const MAX_FILTER_DEPTH: usize = 50;

/// 过滤统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterStats {
    /// 保留的节点数
    pub visible: usize,
    /// 裁掉的节点数（不含随分支一起消失的子孙）
    pub hidden: usize,
    /// 沿根到节点路径检测到的重复 ID 数
    pub cycles_detected: usize,
    /// 因节点/深度上限而截断的分支数
    pub capped: usize,
}

/// 过滤结果
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub filtered: Vec<MenuNode>,
    pub original_count: usize,
    pub filtered_count: usize,
    pub stats: FilterStats,
}

struct WalkState {
    stats: FilterStats,
    visited_budget: usize,
}

/// 菜单权限过滤器
pub struct MenuFilter {
    resolver: Arc<dyn PermissionResolver>,
}

impl MenuFilter {
    pub fn new(resolver: Arc<dyn PermissionResolver>) -> Self {
        Self { resolver }
    }

    /// 使用全放行角色判定的过滤器
    pub fn with_grant_all() -> Self {
        Self::new(Arc::new(GrantAllResolver))
    }

    /// 过滤菜单树
    pub fn filter(&self, tree: &[MenuNode], bundle: &UserPermissionInfo) -> FilterOutcome {
        let permission_keys = bundle.permission_key_set();
        let mut state = WalkState {
            stats: FilterStats::default(),
            visited_budget: MAX_FILTER_NODES,
        };
        let mut path_visited: HashSet<MenuId> = HashSet::new();

        let filtered =
            self.filter_level(tree, bundle, &permission_keys, &mut path_visited, 0, &mut state);

        FilterOutcome {
            original_count: count_nodes(tree),
            filtered_count: count_nodes(&filtered),
            filtered,
            stats: state.stats,
        }
    }

    fn filter_level(
        &self,
        nodes: &[MenuNode],
        bundle: &UserPermissionInfo,
        permission_keys: &HashSet<&str>,
        path_visited: &mut HashSet<MenuId>,
        depth: usize,
        state: &mut WalkState,
    ) -> Vec<MenuNode> {
        let mut kept = Vec::new();

        for node in nodes {
            if state.visited_budget == 0 {
                state.stats.capped += 1;
                warn!(node_id = %node.id, "Menu filter node budget exhausted, branch truncated");
                break;
            }
            state.visited_budget -= 1;

            // 根到当前节点的路径上出现重复 ID：停止下降该分支并留下诊断
            if path_visited.contains(&node.id) {
                state.stats.cycles_detected += 1;
                warn!(node_id = %node.id, name = %node.name, "Cycle detected in menu tree, branch skipped");
                continue;
            }

            if !self.node_passes(node, bundle, permission_keys) {
                state.stats.hidden += 1;
                continue;
            }
            state.stats.visible += 1;

            let children = if node.children.is_empty() {
                Vec::new()
            } else if depth + 1 >= MAX_FILTER_DEPTH {
                state.stats.capped += 1;
                warn!(node_id = %node.id, depth, "Menu filter depth limit reached, children dropped");
                Vec::new()
            } else {
                path_visited.insert(node.id.clone());
                let children = self.filter_level(
                    &node.children,
                    bundle,
                    permission_keys,
                    path_visited,
                    depth + 1,
                    state,
                );
                path_visited.remove(&node.id);
                children
            };

            let mut node = node.clone();
            node.children = children;
            kept.push(node);
        }

        kept
    }

    /// 节点自身的保留条件：可见、启用、权限 key 有交集、角色检查通过
    fn node_passes(
        &self,
        node: &MenuNode,
        bundle: &UserPermissionInfo,
        permission_keys: &HashSet<&str>,
    ) -> bool {
        if !node.visible || !node.is_enabled() {
            return false;
        }
        if !node.required_permissions.is_empty()
            && !node
                .required_permissions
                .iter()
                .any(|key| permission_keys.contains(key.as_str()))
        {
            return false;
        }
        self.resolver.role_allows(node, bundle)
    }
}

/// 统计树的节点总数（带与过滤器相同的防御上限）
fn count_nodes(tree: &[MenuNode]) -> usize {
    fn walk(nodes: &[MenuNode], path: &mut HashSet<MenuId>, depth: usize, budget: &mut usize) -> usize {
        let mut count = 0;
        for node in nodes {
            if *budget == 0 || path.contains(&node.id) || depth >= MAX_FILTER_DEPTH {
                continue;
            }
            *budget -= 1;
            count += 1;
            path.insert(node.id.clone());
            count += walk(&node.children, path, depth + 1, budget);
            path.remove(&node.id);
        }
        count
    }
    let mut budget = MAX_FILTER_NODES;
    walk(tree, &mut HashSet::new(), 0, &mut budget)
}
