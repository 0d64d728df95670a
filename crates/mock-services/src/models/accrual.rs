//! 积分计算服务模拟数据模型
//!
//! 字段命名与对外协议一致：订单查询返回 `{order, status, accrual?}`，
//! 积分以 JSON 数字表示。

use serde::{Deserialize, Serialize};

/// 订单在积分计算服务中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    pub fn is_final(self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

/// 订单中的商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Good {
    pub description: String,
    pub price: f64,
}

/// 积分规则的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardType {
    /// 按商品价格百分比
    #[serde(rename = "%")]
    Percent,
    /// 每件商品固定积分
    #[serde(rename = "pt")]
    Points,
}

/// 积分规则：商品描述包含 `match` 时按规则计分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    #[serde(rename = "match")]
    pub match_text: String,
    pub reward: f64,
    pub reward_type: RewardType,
}

impl RewardRule {
    pub fn matches(&self, good: &Good) -> bool {
        good.description.contains(&self.match_text)
    }

    pub fn reward_for(&self, good: &Good) -> f64 {
        match self.reward_type {
            RewardType::Percent => good.price * self.reward / 100.0,
            RewardType::Points => self.reward,
        }
    }
}

/// 登记订单请求
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterOrderRequest {
    pub order: String,
    #[serde(default)]
    pub goods: Vec<Good>,
}

/// 已登记的订单
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualOrder {
    pub number: String,
    pub goods: Vec<Good>,
    /// 预先计算好的结论，未命中任何规则时为 None（最终判为 INVALID）
    pub accrual: Option<f64>,
    /// 已被查询的次数，用于推进状态
    pub polls: u32,
}

impl AccrualOrder {
    /// 按查询次数推进状态：首次查询 REGISTERED，之后 PROCESSING，
    /// 达到 `ticks_until_final` 次后给出最终结论
    pub fn status_after_polls(&self, ticks_until_final: u32) -> AccrualStatus {
        if self.polls >= ticks_until_final {
            if self.accrual.is_some() {
                AccrualStatus::Processed
            } else {
                AccrualStatus::Invalid
            }
        } else if self.polls == 0 {
            AccrualStatus::Registered
        } else {
            AccrualStatus::Processing
        }
    }
}

/// 订单查询响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
}
