//! 模拟数据模型
//!
//! 积分计算服务的订单、商品与积分规则。

pub mod accrual;

pub use accrual::{
    AccrualOrder, AccrualStatus, Good, OrderView, RegisterOrderRequest, RewardRule, RewardType,
};
