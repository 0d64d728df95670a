//! 订单仓储层
//!
//! 订单状态与用户余额的持久化，封装 SQL 细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责持久化与原子性，不包含调度逻辑
//! - 状态迁移使用条件更新，终态永不回退
//! - 定义 trait 接口以支持 mock 测试和内存实现

mod memory_repo;
mod order_repo;
mod traits;

pub use memory_repo::MemoryOrderRepository;
pub use order_repo::OrderRepository;
pub use traits::*;
