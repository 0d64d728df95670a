//! 内存订单仓储
//!
//! 订单与余额放在同一把锁下，状态迁移与入账在一个临界区内完成，
//! 与 PostgreSQL 实现的事务语义一致。适用于测试和本地开发。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use loyalty_shared::error::{LoyaltyError, Result};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::traits::OrderRepositoryTrait;
use crate::models::{CreateOrderOutcome, Order, OrderStatus, UserBalance};

#[derive(Debug, Default)]
struct MemoryState {
    orders: HashMap<String, Order>,
    balances: HashMap<String, UserBalance>,
}

impl MemoryState {
    /// 按迁移图检查并取出可写的订单
    fn transition(&mut self, number: &str, next: OrderStatus) -> Result<&mut Order> {
        let order = self
            .orders
            .get_mut(number)
            .ok_or_else(|| LoyaltyError::order_not_found(number))?;

        if !order.status.can_transition_to(next) {
            return Err(LoyaltyError::OrderAlreadyFinalized {
                number: number.to_string(),
            });
        }
        Ok(order)
    }
}

/// 内存订单仓储
///
/// clone 后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条订单（测试用于构造任意状态和上传时间）
    pub fn insert_order(&self, order: Order) {
        self.state.lock().orders.insert(order.number.clone(), order);
    }
}

#[async_trait]
impl OrderRepositoryTrait for MemoryOrderRepository {
    async fn create_order(&self, number: &str, user_id: &str) -> Result<CreateOrderOutcome> {
        let mut state = self.state.lock();
        match state.orders.get(number) {
            Some(existing) if existing.user_id == user_id => Ok(CreateOrderOutcome::AlreadyUploaded),
            Some(_) => Ok(CreateOrderOutcome::OwnedByAnotherUser),
            None => {
                state
                    .orders
                    .insert(number.to_string(), Order::new(number, user_id));
                Ok(CreateOrderOutcome::Created)
            }
        }
    }

    async fn get_order(&self, number: &str) -> Result<Option<Order>> {
        Ok(self.state.lock().orders.get(number).cloned())
    }

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(orders)
    }

    async fn get_balance(&self, user_id: &str) -> Result<UserBalance> {
        Ok(self
            .state
            .lock()
            .balances
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn select_pending(&self, limit: usize) -> Result<Vec<Order>> {
        let mut pending: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| o.status.is_pending())
            .cloned()
            .collect();
        // 上传时间相同时按订单号排序，保证结果稳定
        pending.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.number.cmp(&b.number))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processing(&self, number: &str) -> Result<()> {
        let mut state = self.state.lock();
        let order = state.transition(number, OrderStatus::Processing)?;
        order.status = OrderStatus::Processing;
        Ok(())
    }

    async fn mark_invalid(&self, number: &str) -> Result<()> {
        let mut state = self.state.lock();
        let order = state.transition(number, OrderStatus::Invalid)?;
        order.status = OrderStatus::Invalid;
        Ok(())
    }

    async fn mark_processed_and_credit(
        &self,
        number: &str,
        accrual: Decimal,
        user_id: &str,
    ) -> Result<()> {
        if accrual.is_sign_negative() {
            return Err(LoyaltyError::Validation(format!(
                "积分不能为负数: {}",
                accrual
            )));
        }

        let mut state = self.state.lock();
        let order = state.transition(number, OrderStatus::Processed)?;
        if order.user_id != user_id {
            return Err(LoyaltyError::Validation(format!(
                "订单 {} 不属于用户 {}",
                number, user_id
            )));
        }
        order.status = OrderStatus::Processed;
        order.accrual = Some(accrual);

        let balance = state.balances.entry(user_id.to_string()).or_default();
        balance.current += accrual;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_order_outcomes() {
        let repo = MemoryOrderRepository::new();
        assert_eq!(
            repo.create_order("12345678903", "alice").await.unwrap(),
            CreateOrderOutcome::Created
        );
        assert_eq!(
            repo.create_order("12345678903", "alice").await.unwrap(),
            CreateOrderOutcome::AlreadyUploaded
        );
        assert_eq!(
            repo.create_order("12345678903", "bob").await.unwrap(),
            CreateOrderOutcome::OwnedByAnotherUser
        );

        let order = repo.get_order("12345678903").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.user_id, "alice");
    }

    #[tokio::test]
    async fn test_select_pending_oldest_first_and_skips_terminal() {
        let repo = MemoryOrderRepository::new();
        let now = Utc::now();
        repo.insert_order(Order::new("3", "u").with_uploaded_at(now));
        repo.insert_order(Order::new("1", "u").with_uploaded_at(now - Duration::seconds(20)));
        repo.insert_order(Order::new("2", "u").with_uploaded_at(now - Duration::seconds(10)));
        let mut done = Order::new("0", "u").with_uploaded_at(now - Duration::seconds(30));
        done.status = OrderStatus::Invalid;
        repo.insert_order(done);

        let pending = repo.select_pending(10).await.unwrap();
        let numbers: Vec<_> = pending.iter().map(|o| o.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2", "3"]);

        let limited = repo.select_pending(2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].number, "1");
    }

    #[tokio::test]
    async fn test_mark_processing_is_idempotent() {
        let repo = MemoryOrderRepository::new();
        repo.create_order("12345678903", "alice").await.unwrap();

        repo.mark_processing("12345678903").await.unwrap();
        repo.mark_processing("12345678903").await.unwrap();

        let order = repo.get_order("12345678903").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_mark_processing_missing_order() {
        let repo = MemoryOrderRepository::new();
        let err = repo.mark_processing("404").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_terminal_states_do_not_regress() {
        let repo = MemoryOrderRepository::new();
        repo.create_order("1", "alice").await.unwrap();
        repo.create_order("2", "alice").await.unwrap();

        repo.mark_invalid("1").await.unwrap();
        repo.mark_processed_and_credit("2", dec!(10), "alice")
            .await
            .unwrap();

        assert!(repo
            .mark_processed_and_credit("1", dec!(10), "alice")
            .await
            .unwrap_err()
            .is_finalize_conflict());
        assert!(repo.mark_invalid("2").await.unwrap_err().is_finalize_conflict());
        assert!(repo.mark_processing("2").await.unwrap_err().is_finalize_conflict());

        assert_eq!(
            repo.get_order("1").await.unwrap().unwrap().status,
            OrderStatus::Invalid
        );
        assert_eq!(
            repo.get_order("2").await.unwrap().unwrap().status,
            OrderStatus::Processed
        );
        assert_eq!(repo.get_balance("alice").await.unwrap().current, dec!(10));
    }

    #[tokio::test]
    async fn test_processed_credit_is_applied_once() {
        let repo = MemoryOrderRepository::new();
        repo.create_order("12345678903", "alice").await.unwrap();
        repo.mark_processing("12345678903").await.unwrap();

        repo.mark_processed_and_credit("12345678903", dec!(500), "alice")
            .await
            .unwrap();
        let again = repo
            .mark_processed_and_credit("12345678903", dec!(500), "alice")
            .await;

        assert!(again.unwrap_err().is_finalize_conflict());
        let balance = repo.get_balance("alice").await.unwrap();
        assert_eq!(balance.current, dec!(500));
        assert_eq!(balance.withdrawn, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_credit_rejects_foreign_owner() {
        let repo = MemoryOrderRepository::new();
        repo.create_order("12345678903", "alice").await.unwrap();

        let err = repo
            .mark_processed_and_credit("12345678903", dec!(5), "bob")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(repo.get_balance("bob").await.unwrap(), UserBalance::default());
        assert_eq!(
            repo.get_order("12345678903").await.unwrap().unwrap().status,
            OrderStatus::New
        );
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let repo = MemoryOrderRepository::new();
        let now = Utc::now();
        repo.insert_order(Order::new("1", "alice").with_uploaded_at(now - Duration::minutes(5)));
        repo.insert_order(Order::new("2", "alice").with_uploaded_at(now));
        repo.insert_order(Order::new("3", "bob").with_uploaded_at(now));

        let orders = repo.list_orders_by_user("alice").await.unwrap();
        let numbers: Vec<_> = orders.iter().map(|o| o.number.as_str()).collect();
        assert_eq!(numbers, vec!["2", "1"]);
    }
}
