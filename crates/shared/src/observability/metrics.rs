//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
///
/// 这些描述会出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "accrual_requests_total",
        "Total number of accrual service queries"
    );
    metrics::describe_histogram!(
        "accrual_request_duration_seconds",
        "Accrual service query duration in seconds"
    );
    metrics::describe_counter!(
        "orders_finalized_total",
        "Total number of orders moved to a terminal status"
    );
    metrics::describe_counter!(
        "accrual_rate_limited_total",
        "Total number of rate-limit signals received from the accrual service"
    );
    metrics::describe_histogram!(
        "accrual_dispatch_batch_size",
        "Number of orders dispatched per cycle"
    );
    metrics::describe_counter!("orders_registered_total", "Total number of ingested orders");
    metrics::describe_gauge!(
        "worker_last_run_timestamp_seconds",
        "Unix timestamp of the last completed worker cycle"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次积分服务查询
///
/// outcome 取值：verdict / rate_limited / transport_error / timeout
#[inline]
pub fn record_accrual_request(outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "accrual_requests_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "accrual_request_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration_secs);
}

/// 记录订单进入终态
#[inline]
pub fn record_order_finalized(status: &str) {
    metrics::counter!(
        "orders_finalized_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录限流信号
#[inline]
pub fn record_rate_limited(retry_after_secs: f64) {
    metrics::counter!("accrual_rate_limited_total").increment(1);
    metrics::gauge!("accrual_cooldown_seconds").set(retry_after_secs);
}

/// 记录单轮调度的批次大小
#[inline]
pub fn record_dispatch_batch(size: usize) {
    metrics::histogram!("accrual_dispatch_batch_size").record(size as f64);
}

/// 记录订单入库
#[inline]
pub fn record_order_registered(outcome: &str) {
    metrics::counter!(
        "orders_registered_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录 Worker 最近一次完成调度的时间，供告警判断 Worker 是否存活
#[inline]
pub fn set_worker_last_run(worker: &str) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    metrics::gauge!(
        "worker_last_run_timestamp_seconds",
        "worker" => worker.to_string()
    )
    .set(now);
}
