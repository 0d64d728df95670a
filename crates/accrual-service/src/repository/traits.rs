//! 仓储 Trait 定义
//!
//! 订单存储是订单状态与用户余额的唯一事实来源，也是原子性边界：
//! 单订单状态迁移、以及 PROCESSED 与余额入账的联合写入都由它保证。
//! 调度器不在内存中缓存任何订单状态。

use async_trait::async_trait;
use loyalty_shared::error::Result;
use rust_decimal::Decimal;

use crate::models::{CreateOrderOutcome, Order, UserBalance};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    // ==================== 入库与查询 ====================

    /// 以 NEW 状态写入订单，订单号冲突时区分同一用户与其他用户
    async fn create_order(&self, number: &str, user_id: &str) -> Result<CreateOrderOutcome>;

    async fn get_order(&self, number: &str) -> Result<Option<Order>>;

    /// 用户的订单，按上传时间倒序
    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>>;

    /// 用户余额，从未入账的用户返回零余额
    async fn get_balance(&self, user_id: &str) -> Result<UserBalance>;

    // ==================== 调度器使用 ====================

    /// 拉取 NEW / PROCESSING 订单，按上传时间升序
    async fn select_pending(&self, limit: usize) -> Result<Vec<Order>>;

    /// NEW -> PROCESSING，已是 PROCESSING 时为空操作
    ///
    /// 订单已处于终态时返回 `OrderAlreadyFinalized`
    async fn mark_processing(&self, number: &str) -> Result<()>;

    /// 进入 INVALID 终态
    ///
    /// 订单已处于终态时返回 `OrderAlreadyFinalized`
    async fn mark_invalid(&self, number: &str) -> Result<()>;

    /// 进入 PROCESSED 终态、写入积分并为用户入账，三者为同一原子操作
    ///
    /// 订单已处于终态时返回 `OrderAlreadyFinalized`，且不会入账
    async fn mark_processed_and_credit(
        &self,
        number: &str,
        accrual: Decimal,
        user_id: &str,
    ) -> Result<()>;
}
