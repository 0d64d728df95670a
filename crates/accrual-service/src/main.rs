//! 积分处理 Worker
//!
//! 轮询待处理订单，向外部积分计算服务查询结论并为用户入账。

use std::sync::Arc;

use anyhow::Result;
use loyalty_shared::{config::AppConfig, database::Database, observability};
use tokio::sync::watch;
use tracing::{error, info};

use accrual_service::{
    client::HttpAccrualClient,
    repository::OrderRepository,
    worker::{AccrualWorkerPool, PoolConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置：config/default.toml -> 环境配置 -> 服务配置 -> 环境变量
    let config = AppConfig::load("accrual-worker")?;

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting accrual-worker...");
    info!(
        environment = %config.environment,
        accrual_base_url = %config.accrual.base_url,
        "Configuration loaded"
    );

    // 3. 初始化数据库连接，确认可达后执行迁移
    let db = Database::connect(&config.database).await?;
    db.health_check().await?;
    db.run_migrations().await?;
    info!("Database connection established");

    // 4. 组装 Worker 池
    let pool_config = PoolConfig::from_settings(&config.worker, &config.accrual);
    let repo = Arc::new(OrderRepository::new(db.pool().clone()));
    let client = Arc::new(HttpAccrualClient::new(
        config.accrual.base_url.clone(),
        pool_config.request_timeout,
    )?);
    let pool = AccrualWorkerPool::new(repo, client, pool_config);

    // 5. 关闭信号通过 watch 通道传给 Worker 池
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    pool.run(shutdown_rx).await;

    db.close().await;
    info!("accrual-worker shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 同时监听 Ctrl+C 和 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
