//! 积分计算服务的内存登记表
//!
//! 使用 DashMap 实现的高并发内存存储。订单查询通过 entry API
//! 在单个分片锁内完成"读取状态 + 推进计数"，并发查询同一订单也不会跳过状态。

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

use crate::models::{AccrualOrder, AccrualStatus, Good, OrderView, RegisterOrderRequest, RewardRule};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("订单号格式错误: {0}")]
    InvalidOrderNumber(String),

    #[error("订单已登记: {0}")]
    OrderAlreadyRegistered(String),

    #[error("积分规则已存在: {0}")]
    RuleAlreadyExists(String),
}

/// 积分登记表
///
/// clone 后共享同一份数据
#[derive(Debug, Clone)]
pub struct AccrualRegistry {
    orders: Arc<DashMap<String, AccrualOrder>>,
    rules: Arc<DashMap<String, RewardRule>>,
    ticks_until_final: u32,
    /// 设置后，未登记的订单在首次查询时自动登记并按该积分结案
    auto_accrual: Option<f64>,
}

impl AccrualRegistry {
    pub fn new(ticks_until_final: u32, auto_accrual: Option<f64>) -> Self {
        Self {
            orders: Arc::new(DashMap::new()),
            rules: Arc::new(DashMap::new()),
            ticks_until_final,
            auto_accrual,
        }
    }

    /// 登记积分规则，同一匹配词只能登记一次
    pub fn register_rule(&self, rule: RewardRule) -> Result<(), RegistryError> {
        match self.rules.entry(rule.match_text.clone()) {
            Entry::Occupied(_) => Err(RegistryError::RuleAlreadyExists(rule.match_text)),
            Entry::Vacant(slot) => {
                slot.insert(rule);
                Ok(())
            }
        }
    }

    /// 登记订单，登记时即按当前规则计算积分
    pub fn register_order(&self, request: RegisterOrderRequest) -> Result<(), RegistryError> {
        if request.order.is_empty() || !request.order.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RegistryError::InvalidOrderNumber(request.order));
        }

        let accrual = self.compute_accrual(&request.goods);
        match self.orders.entry(request.order.clone()) {
            Entry::Occupied(_) => Err(RegistryError::OrderAlreadyRegistered(request.order)),
            Entry::Vacant(slot) => {
                slot.insert(AccrualOrder {
                    number: request.order,
                    goods: request.goods,
                    accrual,
                    polls: 0,
                });
                Ok(())
            }
        }
    }

    /// 查询订单并推进其状态，未登记返回 None
    pub fn poll(&self, number: &str) -> Option<OrderView> {
        let mut order = match self.orders.entry(number.to_string()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(slot) => {
                let accrual = self.auto_accrual?;
                slot.insert(AccrualOrder {
                    number: number.to_string(),
                    goods: Vec::new(),
                    accrual: Some(accrual),
                    polls: 0,
                })
            }
        };

        let status = order.status_after_polls(self.ticks_until_final);
        order.polls = order.polls.saturating_add(1);

        Some(OrderView {
            order: order.number.clone(),
            status,
            accrual: if status == AccrualStatus::Processed {
                order.accrual
            } else {
                None
            },
        })
    }

    /// 每件商品取匹配规则中积分最高的一条，没有任何商品命中规则时返回 None
    pub fn compute_accrual(&self, goods: &[Good]) -> Option<f64> {
        let mut matched = false;
        let mut total = 0.0;

        for good in goods {
            let best = self
                .rules
                .iter()
                .filter(|rule| rule.matches(good))
                .map(|rule| rule.reward_for(good))
                .fold(None, |best: Option<f64>, reward| {
                    Some(best.map_or(reward, |b| b.max(reward)))
                });

            if let Some(reward) = best {
                matched = true;
                total += reward;
            }
        }

        matched.then(|| (total * 100.0).round() / 100.0)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
