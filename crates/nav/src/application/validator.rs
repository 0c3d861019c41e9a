//! 路由权限校验器
//!
//! 统一导航鉴权决策点：对 (path, action) 执行用户/角色/菜单/按钮
//! 四个独立子检查，全部通过才放行。子检查委托给注入的权限后端；
//! 单个子检查的传输失败被降级为该项不通过（fail-closed）并记录
//! 日志，不会让整次校验报错

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use arbor_errors::{AppError, AppResult};
use arbor_ports::{AuthState, GateCheck, GateDecision, PermissionGate};
use arbor_telemetry::{
    METRIC_VALIDATION_DURATION_MS, METRIC_VALIDATION_ERRORS_TOTAL, METRIC_VALIDATIONS_TOTAL,
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::infrastructure::cache::flight::FlightGroup;
use crate::infrastructure::cache::ttl_cache::TtlCache;

/// 四个子检查的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcheckOutcomes {
    pub user: bool,
    pub role: bool,
    pub menu: bool,
    pub button: bool,
}

impl SubcheckOutcomes {
    pub fn all_denied() -> Self {
        Self {
            user: false,
            role: false,
            menu: false,
            button: false,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.user && self.role && self.menu && self.button
    }
}

/// 校验结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// 四个子检查的逻辑与
    pub allowed: bool,
    pub subchecks: SubcheckOutcomes,
    /// 短路原因（如未认证）；子检查失败不在此列
    pub error: Option<String>,
    /// 整次校验的墙钟耗时（毫秒）
    pub elapsed_ms: u64,
}

impl ValidationReport {
    fn denied_outright(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            allowed: false,
            subchecks: SubcheckOutcomes::all_denied(),
            error: Some(error.into()),
            elapsed_ms,
        }
    }
}

/// 路由权限校验器
///
/// 同一 (user, path, action) 的并发校验通过 flight 组合并为一次
/// 执行；已出结果的校验可经注入的缓存记忆化
pub struct RouteValidator {
    gate: Arc<dyn PermissionGate>,
    auth: Arc<dyn AuthState>,
    memo: Option<Arc<TtlCache<ValidationReport>>>,
    flights: FlightGroup<ValidationReport>,
}

impl RouteValidator {
    pub fn new(gate: Arc<dyn PermissionGate>, auth: Arc<dyn AuthState>) -> Self {
        Self {
            gate,
            auth,
            memo: None,
            flights: FlightGroup::new(),
        }
    }

    /// 注入校验结果缓存
    pub fn with_memo(mut self, memo: Arc<TtlCache<ValidationReport>>) -> Self {
        self.memo = Some(memo);
        self
    }

    /// 校验当前用户能否以 action 访问 path
    pub async fn validate(&self, path: &str, action: &str) -> AppResult<ValidationReport> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(AppError::validation(format!("Invalid route path: {:?}", path)));
        }

        let start = Instant::now();
        let snapshot = self.auth.snapshot();

        // 未认证：短路拒绝，不触碰后端
        if !snapshot.authenticated {
            let report = ValidationReport::denied_outright(
                "user not authenticated",
                start.elapsed().as_millis() as u64,
            );
            self.record(&report);
            return Ok(report);
        }

        let Some(user) = snapshot.user else {
            // 已认证但概要未就绪：按拒绝处理，守卫层会在概要就绪前挂起
            let report = ValidationReport::denied_outright(
                "user profile not available",
                start.elapsed().as_millis() as u64,
            );
            self.record(&report);
            return Ok(report);
        };

        let key = format!("nav:validate:{}:{}:{}", user.id, path, action);
        let result = self
            .flights
            .run(&key, || self.check_subchecks(key.clone(), user.id.to_string(), path, action, start))
            .await;

        if result.is_err() {
            counter!(METRIC_VALIDATION_ERRORS_TOTAL).increment(1);
        }
        result
    }

    /// 批量校验（并发执行，完成顺序返回；同 key 的并发仍会被合并）
    pub async fn batch_validate(
        &self,
        requests: Vec<(String, String)>,
    ) -> AppResult<Vec<ValidationReport>> {
        use futures::stream::{self, StreamExt};

        let results: Vec<AppResult<ValidationReport>> = stream::iter(requests)
            .map(|(path, action)| async move { self.validate(&path, &action).await })
            .buffer_unordered(10) // 最多 10 个并发
            .collect()
            .await;

        results.into_iter().collect()
    }

    /// 执行四个子检查并聚合
    async fn check_subchecks(
        &self,
        memo_key: String,
        user_id: String,
        path: &str,
        action: &str,
        start: Instant,
    ) -> AppResult<ValidationReport> {
        if let Some(memo) = &self.memo {
            if let Some(mut report) = memo.get(&memo_key) {
                debug!(key = %memo_key, "Validation served from cache");
                report.elapsed_ms = start.elapsed().as_millis() as u64;
                return Ok(report);
            }
        }

        let check = GateCheck::new(user_id, path, action);
        let (user, role, menu, button) = tokio::join!(
            self.subcheck("user", self.gate.check_user(&check)),
            self.subcheck("role", self.gate.check_role(&check)),
            self.subcheck("menu", self.gate.check_menu(&check)),
            self.subcheck("button", self.gate.check_button(&check)),
        );

        let subchecks = SubcheckOutcomes {
            user,
            role,
            menu,
            button,
        };
        let report = ValidationReport {
            allowed: subchecks.all_passed(),
            subchecks,
            error: None,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        self.record(&report);
        if let Some(memo) = &self.memo {
            memo.set(memo_key, report.clone());
        }
        Ok(report)
    }

    /// 单个子检查；传输失败降级为不通过
    async fn subcheck(
        &self,
        name: &'static str,
        call: impl Future<Output = AppResult<GateDecision>>,
    ) -> bool {
        match call.await {
            Ok(decision) => {
                if !decision.allowed {
                    debug!(
                        subcheck = name,
                        reason = decision.reason.as_deref().unwrap_or("unspecified"),
                        "Subcheck denied"
                    );
                }
                decision.allowed
            }
            Err(e) => {
                warn!(subcheck = name, error = %e, "Subcheck call failed, treating as denied");
                false
            }
        }
    }

    fn record(&self, report: &ValidationReport) {
        counter!(
            METRIC_VALIDATIONS_TOTAL,
            "allowed" => report.allowed.to_string()
        )
        .increment(1);
        histogram!(METRIC_VALIDATION_DURATION_MS).record(report.elapsed_ms as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::{UserId, UserProfile};
    use arbor_errors::AppError;
    use arbor_ports::{AuthSnapshot, GateDecision};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // --- Mocks ---

    struct MockGate {
        user: bool,
        role: bool,
        menu: bool,
        button: bool,
        fail_role: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockGate {
        fn allowing(user: bool, role: bool, menu: bool, button: bool) -> Self {
            Self {
                user,
                role,
                menu,
                button,
                fail_role: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn decision(&self, allowed: bool) -> AppResult<GateDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if allowed {
                Ok(GateDecision::allow())
            } else {
                Ok(GateDecision::deny("denied by backend"))
            }
        }
    }

    #[async_trait]
    impl PermissionGate for MockGate {
        async fn check_user(&self, _check: &GateCheck) -> AppResult<GateDecision> {
            tokio::time::sleep(self.delay).await;
            self.decision(self.user)
        }

        async fn check_role(&self, _check: &GateCheck) -> AppResult<GateDecision> {
            if self.fail_role {
                self.calls.fetch_add(1, Ordering::SeqCst);
                return Err(AppError::external_service("gate unreachable"));
            }
            self.decision(self.role)
        }

        async fn check_menu(&self, _check: &GateCheck) -> AppResult<GateDecision> {
            self.decision(self.menu)
        }

        async fn check_button(&self, _check: &GateCheck) -> AppResult<GateDecision> {
            self.decision(self.button)
        }
    }

    struct MockAuth {
        snapshot: AuthSnapshot,
    }

    impl MockAuth {
        fn signed_in() -> Self {
            Self {
                snapshot: AuthSnapshot::authenticated(UserProfile::new(UserId::new(), "admin")),
            }
        }

        fn anonymous() -> Self {
            Self {
                snapshot: AuthSnapshot::anonymous(),
            }
        }
    }

    #[async_trait]
    impl AuthState for MockAuth {
        fn snapshot(&self) -> AuthSnapshot {
            self.snapshot.clone()
        }

        async fn user_profile(&self) -> AppResult<Option<UserProfile>> {
            Ok(self.snapshot.user.clone())
        }
    }

    fn validator(gate: MockGate, auth: MockAuth) -> (Arc<RouteValidator>, Arc<MockGate>) {
        let gate = Arc::new(gate);
        let validator = Arc::new(RouteValidator::new(gate.clone(), Arc::new(auth)));
        (validator, gate)
    }

    // --- Tests ---

    #[tokio::test]
    async fn test_and_semantics_over_all_combinations() {
        for mask in 0u8..16 {
            let flags = [
                mask & 1 != 0,
                mask & 2 != 0,
                mask & 4 != 0,
                mask & 8 != 0,
            ];
            let (validator, _) = validator(
                MockGate::allowing(flags[0], flags[1], flags[2], flags[3]),
                MockAuth::signed_in(),
            );

            let report = validator.validate("/system/user", "read").await.unwrap();
            assert_eq!(report.allowed, flags.iter().all(|f| *f), "mask {:#06b}", mask);
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_short_circuits_without_gate_calls() {
        let (validator, gate) = validator(
            MockGate::allowing(true, true, true, true),
            MockAuth::anonymous(),
        );

        let report = validator.validate("/system/user", "read").await.unwrap();

        assert!(!report.allowed);
        assert_eq!(report.error.as_deref(), Some("user not authenticated"));
        assert_eq!(gate.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gate_failure_is_fail_closed() {
        let mut gate = MockGate::allowing(true, true, true, true);
        gate.fail_role = true;
        let (validator, _) = validator(gate, MockAuth::signed_in());

        let report = validator.validate("/system/user", "read").await.unwrap();

        assert!(!report.allowed);
        assert!(!report.subchecks.role);
        assert!(report.subchecks.user && report.subchecks.menu && report.subchecks.button);
        // 传输失败不升级为校验错误
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected() {
        let (validator, _) = validator(
            MockGate::allowing(true, true, true, true),
            MockAuth::signed_in(),
        );

        assert!(validator.validate("", "read").await.is_err());
        assert!(validator.validate("system/user", "read").await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_validations_are_coalesced() {
        let mut gate = MockGate::allowing(true, true, true, true);
        gate.delay = Duration::from_millis(50);
        let (validator, gate) = validator(gate, MockAuth::signed_in());

        let mut handles = vec![];
        for _ in 0..8 {
            let validator = validator.clone();
            handles.push(tokio::spawn(async move {
                validator.validate("/system/user", "read").await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().allowed);
        }

        // 四个子检查只执行了一轮
        assert_eq!(gate.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_batch_validate_runs_all_requests() {
        let (validator, gate) = validator(
            MockGate::allowing(true, true, true, true),
            MockAuth::signed_in(),
        );

        let reports = validator
            .batch_validate(vec![
                ("/system/user".to_string(), "read".to_string()),
                ("/system/dept".to_string(), "read".to_string()),
                ("/system/role".to_string(), "write".to_string()),
            ])
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.allowed));
        assert_eq!(gate.calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_memoized_report_skips_backend() {
        let (gate, auth) = (
            MockGate::allowing(true, true, true, true),
            MockAuth::signed_in(),
        );
        let gate = Arc::new(gate);
        let memo = Arc::new(TtlCache::new(
            "validator-memo",
            crate::infrastructure::cache::ttl_cache::TtlCacheConfig::default(),
        ));
        let validator =
            RouteValidator::new(gate.clone(), Arc::new(auth)).with_memo(memo);

        let first = validator.validate("/system/user", "read").await.unwrap();
        let second = validator.validate("/system/user", "read").await.unwrap();

        assert!(first.allowed && second.allowed);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 4);
    }
}
