//! 枚举类型定义
//!
//! 订单状态支持数据库（sqlx）和 JSON（serde）序列化；
//! 积分服务状态只出现在外部协议中。

use serde::{Deserialize, Serialize};

/// 订单状态
///
/// 状态只能单调推进：
/// NEW -> PROCESSING -> INVALID | PROCESSED
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已上传，尚未被 Worker 处理
    #[default]
    New,
    /// 已被 Worker 领取，等待积分服务给出最终结论
    Processing,
    /// 积分服务判定无效（终态）
    Invalid,
    /// 积分计算完成并已入账（终态）
    Processed,
}

impl OrderStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 是否仍可被调度器拉取
    pub fn is_pending(self) -> bool {
        !self.is_terminal()
    }

    /// 状态迁移是否合法
    ///
    /// PROCESSING -> PROCESSING 为幂等重入；NEW 可直接进入终态，
    /// 避免标记 PROCESSING 失败后订单无法结案。
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match self {
            Self::New => matches!(next, Self::Processing | Self::Invalid | Self::Processed),
            Self::Processing => next != Self::New,
            Self::Invalid | Self::Processed => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 积分服务对订单的判定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// 订单已登记，尚未开始计算
    Registered,
    /// 正在计算
    Processing,
    /// 订单不参与积分计算
    Invalid,
    /// 计算完成
    Processed,
    /// 积分服务尚不认识该订单（HTTP 204）
    Unknown,
}

impl AccrualStatus {
    /// 是否为最终结论
    pub fn is_final(self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 4] = [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Invalid,
        OrderStatus::Processed,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::Processed.is_terminal());
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for from in [OrderStatus::Invalid, OrderStatus::Processed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
            }
        }
    }

    #[test]
    fn test_no_regression_to_new() {
        for from in ALL {
            assert!(!from.can_transition_to(OrderStatus::New));
        }
    }

    #[test]
    fn test_processing_edges() {
        assert!(OrderStatus::New.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Invalid));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Processed));
    }

    #[test]
    fn test_order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let parsed: OrderStatus = serde_json::from_str("\"PROCESSED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Processed);
    }

    #[test]
    fn test_accrual_status_serde() {
        let parsed: AccrualStatus = serde_json::from_str("\"REGISTERED\"").unwrap();
        assert_eq!(parsed, AccrualStatus::Registered);
        assert!(serde_json::from_str::<AccrualStatus>("\"DONE\"").is_err());
        assert!(AccrualStatus::Invalid.is_final());
        assert!(!AccrualStatus::Unknown.is_final());
    }
}
