//! 订单与余额实体

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// 用户上传的订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    /// 订单号（数字串，全局唯一）
    pub number: String,
    /// 上传订单的用户
    pub user_id: String,
    pub status: OrderStatus,
    /// 仅在进入 PROCESSED 时写入
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    /// 创建新上传的订单（NEW 状态）
    pub fn new(number: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            user_id: user_id.into(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn with_uploaded_at(mut self, uploaded_at: DateTime<Utc>) -> Self {
        self.uploaded_at = uploaded_at;
        self
    }
}

/// 用户积分余额
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserBalance {
    /// 可用积分
    pub current: Decimal,
    /// 累计已使用积分
    pub withdrawn: Decimal,
}

/// 订单入库结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOrderOutcome {
    /// 新订单已写入
    Created,
    /// 同一用户重复上传
    AlreadyUploaded,
    /// 订单号已属于其他用户
    OwnedByAnotherUser,
}
