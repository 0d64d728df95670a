//! Mock 服务模块
//!
//! 提供模拟的积分计算服务 HTTP 接口。

pub mod accrual_service;
pub mod rate_limit;

pub use accrual_service::{AccrualServiceState, accrual_routes};
pub use rate_limit::RateLimiter;
