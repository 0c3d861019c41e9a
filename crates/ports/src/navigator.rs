//! 导航跳转 trait 定义
//!
//! 路由守卫通过此接口向渲染层调度跳转，自身不渲染任何内容

/// 导航跳转 trait
pub trait Navigator: Send + Sync {
    /// 调度一次跳转；target 为完整的目标路径（含查询参数）
    fn redirect(&self, target: &str);
}
