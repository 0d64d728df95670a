//! 订单入库服务
//!
//! 用户上传订单号后在此校验并以 NEW 状态写入存储，
//! 之后由积分 Worker 池异步推进。校验失败的订单号不会进入存储。

use std::sync::Arc;

use loyalty_shared::error::{LoyaltyError, Result};
use loyalty_shared::observability::metrics;
use tracing::{info, instrument};

use crate::luhn;
use crate::models::{CreateOrderOutcome, Order, UserBalance};
use crate::repository::OrderRepositoryTrait;

/// 订单上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 新订单已接受，等待积分计算
    Accepted,
    /// 同一用户重复上传
    AlreadyUploaded,
}

impl RegisterOutcome {
    fn as_label(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyUploaded => "already_uploaded",
        }
    }
}

/// 订单服务
pub struct OrderService<R: OrderRepositoryTrait> {
    repo: Arc<R>,
}

impl<R: OrderRepositoryTrait> OrderService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// 上传订单号
    ///
    /// 订单号去除首尾空白后必须是非空数字串且通过 Luhn 校验
    #[instrument(skip(self))]
    pub async fn register_order(&self, user_id: &str, raw_number: &str) -> Result<RegisterOutcome> {
        let number = raw_number.trim();
        if !luhn::validate(number) {
            metrics::record_order_registered("invalid_number");
            return Err(LoyaltyError::InvalidOrderNumber {
                number: number.to_string(),
            });
        }

        let outcome = match self.repo.create_order(number, user_id).await? {
            CreateOrderOutcome::Created => RegisterOutcome::Accepted,
            CreateOrderOutcome::AlreadyUploaded => RegisterOutcome::AlreadyUploaded,
            CreateOrderOutcome::OwnedByAnotherUser => {
                metrics::record_order_registered("conflict");
                return Err(LoyaltyError::OrderOwnedByAnotherUser {
                    number: number.to_string(),
                });
            }
        };

        metrics::record_order_registered(outcome.as_label());
        if outcome == RegisterOutcome::Accepted {
            info!(order_number = number, user_id, "订单已接受");
        }
        Ok(outcome)
    }

    /// 用户订单列表，按上传时间倒序
    pub async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>> {
        self.repo.list_orders_by_user(user_id).await
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<UserBalance> {
        self.repo.get_balance(user_id).await
    }
}
