//! 外部积分服务客户端

mod accrual_client;

pub use accrual_client::*;
