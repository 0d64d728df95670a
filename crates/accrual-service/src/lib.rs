//! 积分累计服务
//!
//! 用户上传订单号后，后台 Worker 池异步向外部积分计算服务查询结论，
//! 在订单结案时为用户余额入账。
//!
//! ## 核心功能
//!
//! - **订单校验**：Luhn 校验订单号，非法订单号不入库
//! - **订单入库**：以 NEW 状态写入订单，区分重复上传与他人订单
//! - **积分查询**：HTTP 客户端区分业务判定、限流与传输错误
//! - **Worker 池**：单调度器 + 固定 Worker，池级限流冷却，状态驱动的自然重试
//! - **原子入账**：PROCESSED 状态写入与余额入账在存储层一次完成
//!
//! ## 模块结构
//!
//! - `luhn`: 订单号校验
//! - `models`: 领域模型定义
//! - `error`: 积分客户端错误类型
//! - `repository`: 订单存储（PostgreSQL 与内存实现）
//! - `client`: 积分服务客户端
//! - `service`: 订单入库服务
//! - `worker`: 积分处理 Worker 池

pub mod client;
pub mod error;
pub mod luhn;
pub mod models;
pub mod repository;
pub mod service;
pub mod worker;

pub use client::{AccrualClient, HttpAccrualClient};
pub use error::AccrualError;
pub use models::*;
pub use repository::{MemoryOrderRepository, OrderRepository, OrderRepositoryTrait};
pub use service::{OrderService, RegisterOutcome};
pub use worker::{AccrualWorkerPool, CycleReport, PoolConfig};
