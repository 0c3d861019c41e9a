//! 应用层：过滤、路由生成、校验、守卫与导航编排

pub mod filter;
pub mod generator;
pub mod guard;
pub mod router;
pub mod validator;
