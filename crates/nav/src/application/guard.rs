//! 路由守卫
//!
//! 视图层的导航闸门：每次挂载或路径变更先走认证检查，再（可选）
//! 走权限校验，按结果放行、拒绝跳转或报错。拒绝态的跳转在单次
//! 导航内幂等——重复渲染不会触发第二次跳转

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use arbor_ports::{AuthState, Navigator};
use tracing::{debug, warn};

use super::validator::RouteValidator;

/// 守卫状态机
///
/// `Verifying → {Granted, Denied, Error}`；新导航回到 `Verifying`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// 校验中（含已认证但用户概要尚未就绪的等待态）
    Verifying,
    Granted,
    Denied,
    /// 校验过程本身出错；携带面向调用方的通用提示
    Error { message: String },
}

/// 校验异常的回调
pub type ErrorCallback = dyn Fn(&str) + Send + Sync;

/// 路由守卫
pub struct RouteGuard {
    auth: Arc<dyn AuthState>,
    validator: Arc<RouteValidator>,
    navigator: Arc<dyn Navigator>,
    sign_in_path: String,
    /// 是否在认证之外再做权限校验
    validate_permissions: bool,
    state: RwLock<GuardState>,
    redirecting: AtomicBool,
    on_error: Option<Arc<ErrorCallback>>,
}

impl RouteGuard {
    pub fn new(
        auth: Arc<dyn AuthState>,
        validator: Arc<RouteValidator>,
        navigator: Arc<dyn Navigator>,
        sign_in_path: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            validator,
            navigator,
            sign_in_path: sign_in_path.into(),
            validate_permissions: true,
            state: RwLock::new(GuardState::Verifying),
            redirecting: AtomicBool::new(false),
            on_error: None,
        }
    }

    /// 仅做认证检查，跳过权限校验
    pub fn auth_only(mut self) -> Self {
        self.validate_permissions = false;
        self
    }

    pub fn with_on_error(mut self, callback: Arc<ErrorCallback>) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// 当前状态快照
    pub fn state(&self) -> GuardState {
        self.state.read().expect("guard state lock poisoned").clone()
    }

    /// 处理一次导航（挂载或路径变更）
    pub async fn on_navigate(&self, path: &str) -> GuardState {
        self.set_state(GuardState::Verifying);
        // 新导航重置跳转闸
        self.redirecting.store(false, Ordering::SeqCst);

        let snapshot = self.auth.snapshot();
        if !snapshot.authenticated {
            debug!(path = %path, "Unauthenticated navigation denied");
            return self.deny_and_redirect(path);
        }

        // 已认证但概要未就绪：挂起在 Verifying，既不跳转也不放行
        if snapshot.user.is_none() {
            match self.auth.user_profile().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(path = %path, "User profile pending, guard holds");
                    return self.state();
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "User profile load failed");
                    return self.fail("permission verification failed");
                }
            }
        }

        if !self.validate_permissions {
            self.set_state(GuardState::Granted);
            return self.state();
        }

        match self.validator.validate(path, "read").await {
            Ok(report) if report.allowed => {
                self.set_state(GuardState::Granted);
                self.state()
            }
            Ok(report) => {
                debug!(
                    path = %path,
                    error = report.error.as_deref().unwrap_or(""),
                    "Navigation denied"
                );
                self.deny_and_redirect(path)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Route validation errored");
                self.fail("permission verification failed")
            }
        }
    }

    /// 拒绝并调度一次跳转（单次导航内幂等）
    pub(crate) fn deny_and_redirect(&self, original_path: &str) -> GuardState {
        self.set_state(GuardState::Denied);

        // swap 保证重复进入拒绝分支时只发出一次跳转
        if !self.redirecting.swap(true, Ordering::SeqCst) {
            let target = if original_path == "/" {
                self.sign_in_path.clone()
            } else {
                format!(
                    "{}?redirect={}",
                    self.sign_in_path,
                    urlencoding::encode(original_path)
                )
            };
            debug!(target = %target, "Scheduling sign-in redirect");
            self.navigator.redirect(&target);
        }
        self.state()
    }

    fn fail(&self, message: &str) -> GuardState {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
        self.set_state(GuardState::Error {
            message: message.to_string(),
        });
        self.state()
    }

    fn set_state(&self, state: GuardState) {
        *self.state.write().expect("guard state lock poisoned") = state;
    }
}
