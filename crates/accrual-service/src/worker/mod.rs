//! 后台 Worker
//!
//! - `accrual_pool`: 积分处理 Worker 池，轮询待处理订单并向积分服务查询结论

pub mod accrual_pool;

pub use accrual_pool::{AccrualWorkerPool, CycleReport, OrderOutcome, PoolConfig};
