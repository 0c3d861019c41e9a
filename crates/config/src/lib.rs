//! arbor-config - 配置加载库

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 权限后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// 权限检查服务的基础地址
    pub base_url: String,
    /// Bearer token
    pub api_token: Secret<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

/// 缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 权限判定结果缓存 TTL（秒）
    #[serde(default = "default_decision_ttl_secs")]
    pub decision_ttl_secs: u64,
    /// 权限快照（菜单/路由数据）缓存 TTL（秒）
    #[serde(default = "default_bundle_ttl_secs")]
    pub bundle_ttl_secs: u64,
    /// 单个缓存实例的最大条目数
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// 快照持久化文件路径（可选）
    pub snapshot_path: Option<String>,
}

fn default_decision_ttl_secs() -> u64 {
    300 // 5 分钟
}

fn default_bundle_ttl_secs() -> u64 {
    600 // 10 分钟
}

fn default_max_entries() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            decision_ttl_secs: default_decision_ttl_secs(),
            bundle_ttl_secs: default_bundle_ttl_secs(),
            max_entries: default_max_entries(),
            snapshot_path: None,
        }
    }
}

/// 路由守卫配置
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// 未认证/无权限时跳转的登录页路径
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
}

fn default_sign_in_path() -> String {
    "/auth/sign-in".to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            sign_in_path: default_sign_in_path(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub gate: GateConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("ARBOR_").split("_"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
