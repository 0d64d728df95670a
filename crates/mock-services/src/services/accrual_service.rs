//! Mock 积分计算服务
//!
//! 实现外部积分计算服务的 HTTP 协议，供本地开发和联调使用：
//!
//! - `GET /api/orders/{number}` 查询订单结论（200 / 204 / 429）
//! - `POST /api/orders` 登记订单及商品
//! - `POST /api/goods` 登记积分规则

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{debug, info, warn};

use super::rate_limit::RateLimiter;
use crate::models::{RegisterOrderRequest, RewardRule};
use crate::store::{AccrualRegistry, RegistryError};

/// 积分服务状态
pub struct AccrualServiceState {
    pub registry: AccrualRegistry,
    pub limiter: RateLimiter,
}

impl AccrualServiceState {
    pub fn new(registry: AccrualRegistry, limit_per_minute: u32) -> Self {
        Self {
            registry,
            limiter: RateLimiter::new(limit_per_minute),
        }
    }
}

// ============================================================================
// 路由定义
// ============================================================================

pub fn accrual_routes() -> Router<Arc<AccrualServiceState>> {
    Router::new()
        .route("/api/orders/{number}", get(get_order))
        .route("/api/orders", post(register_order))
        .route("/api/goods", post(register_rule))
}

// ============================================================================
// 路由处理器
// ============================================================================

/// 查询订单结论
///
/// GET /api/orders/{number}
async fn get_order(
    State(state): State<Arc<AccrualServiceState>>,
    Path(number): Path<String>,
) -> Response {
    if let Err(retry_after) = state.limiter.acquire().await {
        warn!(order_number = %number, retry_after_secs = retry_after.as_secs(), "请求超出限流");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after.as_secs().to_string())],
            format!(
                "No more than {} requests per minute allowed",
                state.limiter.limit_per_minute()
            ),
        )
            .into_response();
    }

    match state.registry.poll(&number) {
        Some(view) => {
            debug!(order_number = %number, status = ?view.status, "返回订单结论");
            Json(view).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// 登记订单
///
/// POST /api/orders
async fn register_order(
    State(state): State<Arc<AccrualServiceState>>,
    Json(request): Json<RegisterOrderRequest>,
) -> Response {
    let number = request.order.clone();
    match state.registry.register_order(request) {
        Ok(()) => {
            info!(order_number = %number, "订单已登记");
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => registry_error_response(e),
    }
}

/// 登记积分规则
///
/// POST /api/goods
async fn register_rule(
    State(state): State<Arc<AccrualServiceState>>,
    Json(rule): Json<RewardRule>,
) -> Response {
    let match_text = rule.match_text.clone();
    match state.registry.register_rule(rule) {
        Ok(()) => {
            info!(match_text = %match_text, "积分规则已登记");
            StatusCode::OK.into_response()
        }
        Err(e) => registry_error_response(e),
    }
}

fn registry_error_response(err: RegistryError) -> Response {
    let status = match err {
        RegistryError::InvalidOrderNumber(_) => StatusCode::BAD_REQUEST,
        RegistryError::OrderAlreadyRegistered(_) | RegistryError::RuleAlreadyExists(_) => {
            StatusCode::CONFLICT
        }
    };
    (status, err.to_string()).into_response()
}
