//! 领域模型
//!
//! 订单、余额以及积分服务返回的判定结果

mod accrual;
mod enums;
mod order;

pub use accrual::{AccrualResponse, AccrualVerdict};
pub use enums::{AccrualStatus, OrderStatus};
pub use order::{CreateOrderOutcome, Order, UserBalance};
