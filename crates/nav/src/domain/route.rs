//! 路由描述符
//!
//! 由菜单/按钮派生的非持久化结构，交给渲染层的路由表使用

use serde::{Deserialize, Serialize};

/// 路由来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOrigin {
    Menu,
    Button,
}

/// 路由元信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMeta {
    pub icon: Option<String>,
    pub order: i32,
    pub origin: RouteOrigin,
}

/// 路由描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    pub name: String,
    pub title: String,
    /// 声明的权限要求；为空表示不作限制
    pub permissions: Vec<String>,
    /// 声明的角色要求；为空表示不作限制
    pub roles: Vec<String>,
    pub hidden: bool,
    pub keep_alive: bool,
    pub meta: RouteMeta,
    #[serde(default)]
    pub children: Vec<RouteConfig>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, name: impl Into<String>, origin: RouteOrigin) -> Self {
        let name = name.into();
        Self {
            path: path.into(),
            title: name.clone(),
            name,
            permissions: Vec::new(),
            roles: Vec::new(),
            hidden: false,
            keep_alive: false,
            meta: RouteMeta {
                icon: None,
                order: 0,
                origin,
            },
            children: Vec::new(),
        }
    }

    /// 是否完全不声明访问要求
    pub fn is_unrestricted(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_route() {
        let route = RouteConfig::new("/dashboard", "dashboard", RouteOrigin::Menu);
        assert!(route.is_unrestricted());

        let mut restricted = route.clone();
        restricted.permissions.push("sys:user:view".to_string());
        assert!(!restricted.is_unrestricted());
    }
}
