//! Mock Services
//!
//! 模拟外部积分计算服务，用于开发和测试环境。
//!
//! # 主要模块
//!
//! - `models`: 订单、商品与积分规则
//! - `store`: 内存登记表
//! - `services`: HTTP 路由与限流
//! - `cli`: 命令行入口
//!
//! # 使用示例
//!
//! ```rust
//! use mock_services::models::{AccrualStatus, RegisterOrderRequest};
//! use mock_services::store::AccrualRegistry;
//!
//! let registry = AccrualRegistry::new(0, Some(500.0));
//! let view = registry.poll("12345678903").unwrap();
//! assert_eq!(view.status, AccrualStatus::Processed);
//!
//! registry
//!     .register_order(RegisterOrderRequest { order: "79927398713".into(), goods: vec![] })
//!     .unwrap();
//! assert_eq!(registry.poll("79927398713").unwrap().status, AccrualStatus::Invalid);
//! ```

pub mod cli;
pub mod models;
pub mod services;
pub mod store;
