//! 命令执行器
//!
//! 将命令行参数转化为服务状态并启动 HTTP 服务器。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::commands::Cli;
use crate::models::{RewardRule, RewardType};
use crate::services::{AccrualServiceState, accrual_routes};
use crate::store::AccrualRegistry;

/// 内置积分规则
pub fn default_rules() -> Vec<RewardRule> {
    [
        ("Bork", 10.0, RewardType::Percent),
        ("Samsung", 5.0, RewardType::Percent),
        ("LG", 50.0, RewardType::Points),
    ]
    .into_iter()
    .map(|(match_text, reward, reward_type)| RewardRule {
        match_text: match_text.to_string(),
        reward,
        reward_type,
    })
    .collect()
}

/// 根据命令行参数构建应用
pub fn build_app(cli: &Cli) -> Router {
    let registry = AccrualRegistry::new(cli.ticks_until_final, cli.auto_accrual);

    if cli.seed_rules {
        for rule in default_rules() {
            if let Err(e) = registry.register_rule(rule) {
                warn!(error = %e, "登记内置积分规则失败");
            }
        }
        info!(rules = registry.rule_count(), "内置积分规则已登记");
    }

    let state = Arc::new(AccrualServiceState::new(registry, cli.rate_limit));

    // 健康检查端点独立于业务路由，便于运维监控
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(accrual_routes().with_state(state))
        .layer(TraceLayer::new_for_http())
}

/// 启动 HTTP 服务器直到收到 Ctrl+C
pub async fn run_server(cli: Cli) -> Result<()> {
    info!(
        port = cli.port,
        rate_limit = cli.rate_limit,
        ticks_until_final = cli.ticks_until_final,
        auto_accrual = ?cli.auto_accrual,
        "启动 Mock 积分服务"
    );

    let app = build_app(&cli);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await.context("绑定端口失败")?;

    info!("Mock 积分服务已启动: http://{}", addr);
    info!("可用端点:");
    info!("  GET  /health - 健康检查");
    info!("  GET  /api/orders/{{number}} - 查询订单积分");
    info!("  POST /api/orders - 登记订单");
    info!("  POST /api/goods - 登记积分规则");
    info!("按 Ctrl+C 停止服务");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务器运行失败")?;

    info!("Mock 积分服务已停止");
    Ok(())
}

/// 等待关闭信号
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "安装 Ctrl+C 信号处理器失败");
        std::future::pending::<()>().await;
    }
    info!("收到关闭信号，正在停止服务...");
}
