//! 订单仓储（PostgreSQL）
//!
//! 状态迁移使用带条件的 UPDATE 实现比较并交换：
//! `WHERE status IN ('NEW', 'PROCESSING')` 保证终态不会被覆盖。
//! PROCESSED 写入与余额入账在同一事务内完成。

use async_trait::async_trait;
use loyalty_shared::error::{LoyaltyError, Result};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::traits::OrderRepositoryTrait;
use crate::models::{CreateOrderOutcome, Order, OrderStatus, UserBalance};

/// 订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 条件更新未命中时，判断是订单不存在还是已处于终态
    async fn explain_missed_update(conn: &mut PgConnection, number: &str) -> LoyaltyError {
        let status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE number = $1",
        )
        .bind(number)
        .fetch_optional(&mut *conn)
        .await;

        match status {
            Ok(Some(status)) if status.is_terminal() => LoyaltyError::OrderAlreadyFinalized {
                number: number.to_string(),
            },
            Ok(Some(status)) => LoyaltyError::Internal(format!(
                "订单 {} 状态 {} 未能完成迁移",
                number, status
            )),
            Ok(None) => LoyaltyError::order_not_found(number),
            Err(e) => LoyaltyError::Database(e),
        }
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    #[instrument(skip(self))]
    async fn create_order(&self, number: &str, user_id: &str) -> Result<CreateOrderOutcome> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (number, user_id, status, uploaded_at, updated_at)
            VALUES ($1, $2, 'NEW', NOW(), NOW())
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(number)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            return Ok(CreateOrderOutcome::Created);
        }

        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM orders WHERE number = $1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;

        match owner {
            Some(owner) if owner == user_id => Ok(CreateOrderOutcome::AlreadyUploaded),
            Some(_) => Ok(CreateOrderOutcome::OwnedByAnotherUser),
            // 冲突后又被删除，极少见；按新写入失败处理
            None => Err(LoyaltyError::Internal(format!("订单 {} 写入冲突后丢失", number))),
        }
    }

    async fn get_order(&self, number: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn get_balance(&self, user_id: &str) -> Result<UserBalance> {
        let balance = sqlx::query_as::<_, UserBalance>(
            "SELECT current, withdrawn FROM balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or_default())
    }

    async fn select_pending(&self, limit: usize) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT number, user_id, status, accrual, uploaded_at
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY uploaded_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn mark_processing(&self, number: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'PROCESSING', updated_at = NOW()
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let mut conn = self.pool.acquire().await?;
            return Err(Self::explain_missed_update(&mut *conn, number).await);
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_invalid(&self, number: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'INVALID', updated_at = NOW()
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let mut conn = self.pool.acquire().await?;
            return Err(Self::explain_missed_update(&mut *conn, number).await);
        }

        Ok(())
    }

    #[instrument(skip(self))]
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

        let mut tx = self.pool.begin().await?;

        // 并发结案时只有一个事务能命中条件更新，另一个在行锁释放后重新求值 WHERE 而落空
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'PROCESSED', accrual = $2, updated_at = NOW()
            WHERE number = $1 AND user_id = $3 AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(number)
        .bind(accrual)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let err = Self::explain_missed_update(&mut *tx, number).await;
            tx.rollback().await?;
            return Err(match err {
                LoyaltyError::Internal(_) => LoyaltyError::Validation(format!(
                    "订单 {} 不属于用户 {}",
                    number, user_id
                )),
                other => other,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO balances (user_id, current, withdrawn, updated_at)
            VALUES ($1, $2, 0, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET current = balances.current + EXCLUDED.current, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(accrual)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(order_number = number, user_id, %accrual, "订单结案并入账");
        Ok(())
    }
}
