//! 菜单树与按钮实体

use arbor_common::{ButtonId, EntryStatus, MenuId};
use serde::{Deserialize, Serialize};

/// 菜单节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    /// 目录：只做分组，不对应可导航路由
    Directory,
    /// 菜单：对应一个可导航路由
    #[default]
    Menu,
    /// 按钮：叶子操作点
    Button,
}

/// 菜单树节点
///
/// 树不变量：`children[i].parent_id == Some(node.id)`，兄弟节点按
/// `sort_order` 升序。parent_id 图的无环性由数据层保证，本层的所有
/// 递归遍历都带 visited 集防御
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuNode {
    pub id: MenuId,
    pub name: String,
    pub key: String,
    pub path: String,
    pub component: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<MenuId>,
    pub sort_order: i32,
    pub kind: MenuKind,
    pub visible: bool,
    pub status: EntryStatus,
    /// 访问该节点所需的权限代码；为空表示不作权限要求
    #[serde(default)]
    pub required_permissions: Vec<String>,
    #[serde(default)]
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub fn new(name: impl Into<String>, key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: MenuId::new(),
            name: name.into(),
            key: key.into(),
            path: path.into(),
            component: None,
            icon: None,
            parent_id: None,
            sort_order: 0,
            kind: MenuKind::Menu,
            visible: true,
            status: EntryStatus::Enabled,
            required_permissions: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn directory(name: impl Into<String>, key: impl Into<String>) -> Self {
        let mut node = Self::new(name, key, "");
        node.kind = MenuKind::Directory;
        node
    }

    pub fn with_sort_order(mut self, order: i32) -> Self {
        self.sort_order = order;
        self
    }

    pub fn with_required_permissions(mut self, keys: Vec<String>) -> Self {
        self.required_permissions = keys;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// 挂接子节点并维护 parent_id 链
    pub fn with_child(mut self, mut child: MenuNode) -> Self {
        child.parent_id = Some(self.id.clone());
        self.children.push(child);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }

    /// 是否对应一个可导航路由
    pub fn is_routable(&self) -> bool {
        self.kind == MenuKind::Menu
    }
}

/// 递归按 sort_order 升序排序兄弟节点
pub fn sort_tree(nodes: &mut [MenuNode]) {
    nodes.sort_by_key(|n| n.sort_order);
    for node in nodes.iter_mut() {
        sort_tree(&mut node.children);
    }
}

/// 按钮实体，始终作为叶子挂在某个菜单下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub id: ButtonId,
    pub name: String,
    /// 按钮代码（如 "sys:user:export"）
    pub key: String,
    /// 按钮展示类型（渲染层语义，本层透传）
    pub kind: String,
    pub menu_id: MenuId,
    pub status: EntryStatus,
}

impl Button {
    pub fn new(name: impl Into<String>, key: impl Into<String>, menu_id: MenuId) -> Self {
        Self {
            id: ButtonId::new(),
            name: name.into(),
            key: key.into(),
            kind: "default".to_string(),
            menu_id,
            status: EntryStatus::Enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }
}
