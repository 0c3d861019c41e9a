//! arbor-telemetry - 可观测性库

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 导航校验计数器（按 decision/allowed 维度打标签）
pub const METRIC_VALIDATIONS_TOTAL: &str = "navigation_validations_total";
/// 导航校验错误计数器
pub const METRIC_VALIDATION_ERRORS_TOTAL: &str = "navigation_validation_errors_total";
/// 导航校验耗时直方图（毫秒）
pub const METRIC_VALIDATION_DURATION_MS: &str = "navigation_validation_duration_ms";
/// 缓存命中计数器（按 cache 维度打标签）
pub const METRIC_CACHE_HITS_TOTAL: &str = "navigation_cache_hits_total";
/// 缓存未命中计数器
pub const METRIC_CACHE_MISSES_TOTAL: &str = "navigation_cache_misses_total";

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 初始化 Prometheus metrics 并注册指标描述
pub fn init_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    metrics::describe_counter!(
        METRIC_VALIDATIONS_TOTAL,
        "Route permission validations, labelled by decision and allowed"
    );
    metrics::describe_counter!(
        METRIC_VALIDATION_ERRORS_TOTAL,
        "Route permission validations that failed with an error"
    );
    metrics::describe_histogram!(
        METRIC_VALIDATION_DURATION_MS,
        "Wall-clock duration of a full route permission validation"
    );
    metrics::describe_counter!(METRIC_CACHE_HITS_TOTAL, "Navigation cache hits");
    metrics::describe_counter!(METRIC_CACHE_MISSES_TOTAL, "Navigation cache misses");

    handle
}
