//! arbor-adapter-rest - 权限后端的 REST 适配器
//!
//! 每个子检查对应后端的一个检查端点，POST 请求体为 `GateCheck`，
//! 响应体为 `GateDecision`。只有传输层失败才重试；后端给出的
//! allow/deny 判定从不重试

use std::time::Duration;

use arbor_common::retry::{RetryConfig, is_retryable_error, with_conditional_retry};
use arbor_config::GateConfig;
use arbor_errors::{AppError, AppResult};
use arbor_ports::{GateCheck, GateDecision, PermissionGate};
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use tracing::debug;
use url::Url;

/// REST 权限后端
pub struct RestPermissionGate {
    client: reqwest::Client,
    base_url: Url,
    api_token: Secret<String>,
    retry: RetryConfig,
}

impl RestPermissionGate {
    pub fn new(config: &GateConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::validation(format!("Invalid gate base url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build http client: {}", e)))?;

        let mut retry = RetryConfig::default();
        retry.max_attempts = config.max_attempts;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
            retry,
        })
    }

    /// 端点相对路径，如 "permissions/check/user"
    fn endpoint(&self, level: &str) -> AppResult<Url> {
        self.base_url
            .join(&format!("permissions/check/{}", level))
            .map_err(|e| AppError::validation(format!("Invalid gate endpoint: {}", e)))
    }

    async fn post_check(&self, level: &'static str, check: &GateCheck) -> AppResult<GateDecision> {
        let url = self.endpoint(level)?;

        let decision = with_conditional_retry(
            &self.retry,
            level,
            || async {
                let response = self
                    .client
                    .post(url.clone())
                    .bearer_auth(self.api_token.expose_secret())
                    .json(check)
                    .send()
                    .await
                    .map_err(|e| AppError::external_service(e.to_string()))?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(AppError::external_service(format!(
                        "Permission gate server error: {}",
                        status
                    )));
                }
                if !status.is_success() {
                    return Err(AppError::external_service(format!(
                        "Permission gate rejected request: {}",
                        status
                    )));
                }

                response
                    .json::<GateDecision>()
                    .await
                    .map_err(|e| AppError::serialization(format!("Bad gate response: {}", e)))
            },
            is_retryable_transport_error,
        )
        .await?;

        debug!(
            level,
            resource = %check.resource,
            allowed = decision.allowed,
            "Gate decision"
        );
        Ok(decision)
    }
}

/// 重试条件：仅传输层失败与后端 5xx
fn is_retryable_transport_error(error: &AppError) -> bool {
    match error {
        AppError::ExternalService(msg) => {
            is_retryable_error(msg) || msg.contains("server error")
        }
        _ => false,
    }
}

#[async_trait]
impl PermissionGate for RestPermissionGate {
    async fn check_user(&self, check: &GateCheck) -> AppResult<GateDecision> {
        self.post_check("user", check).await
    }

    async fn check_role(&self, check: &GateCheck) -> AppResult<GateDecision> {
        self.post_check("role", check).await
    }

    async fn check_menu(&self, check: &GateCheck) -> AppResult<GateDecision> {
        self.post_check("menu", check).await
    }

    async fn check_button(&self, check: &GateCheck) -> AppResult<GateDecision> {
        self.post_check("button", check).await
    }
}
