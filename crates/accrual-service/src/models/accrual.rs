//! 积分服务返回结果

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AccrualStatus;

/// 积分服务对单个订单的判定
///
/// 每次查询生成，调度器消费后即丢弃，不落库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualVerdict {
    pub order: String,
    pub status: AccrualStatus,
    /// 仅 PROCESSED 时存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
}

impl AccrualVerdict {
    pub fn new(order: impl Into<String>, status: AccrualStatus) -> Self {
        Self {
            order: order.into(),
            status,
            accrual: None,
        }
    }

    pub fn processed(order: impl Into<String>, accrual: Decimal) -> Self {
        Self {
            order: order.into(),
            status: AccrualStatus::Processed,
            accrual: Some(accrual),
        }
    }

    /// 积分服务尚未登记该订单
    pub fn unknown(order: impl Into<String>) -> Self {
        Self::new(order, AccrualStatus::Unknown)
    }

    /// 入账金额，PROCESSED 但未返回积分时视为 0
    pub fn accrual_amount(&self) -> Decimal {
        self.accrual.unwrap_or(Decimal::ZERO)
    }
}

/// 积分服务查询结果
///
/// 限流与业务判定分开表达：限流不是传输错误，由调度器做全局冷却
#[derive(Debug, Clone, PartialEq)]
pub enum AccrualResponse {
    Verdict(AccrualVerdict),
    RateLimited { retry_after: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_verdict_deserialize_with_accrual() {
        let json = r#"{"order":"12345678903","status":"PROCESSED","accrual":729.98}"#;
        let verdict: AccrualVerdict = serde_json::from_str(json).unwrap();
        assert_eq!(verdict.status, AccrualStatus::Processed);
        assert_eq!(verdict.accrual, Some(dec!(729.98)));
    }

    #[test]
    fn test_verdict_deserialize_without_accrual() {
        let json = r#"{"order":"12345678903","status":"REGISTERED"}"#;
        let verdict: AccrualVerdict = serde_json::from_str(json).unwrap();
        assert_eq!(verdict.status, AccrualStatus::Registered);
        assert_eq!(verdict.accrual, None);
        assert_eq!(verdict.accrual_amount(), Decimal::ZERO);
    }
}
