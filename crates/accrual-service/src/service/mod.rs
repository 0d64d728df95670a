//! 服务层
//!
//! - `ingestion`: 订单上传与余额查询

pub mod ingestion;

pub use ingestion::{OrderService, RegisterOutcome};
