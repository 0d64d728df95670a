//! CLI 模块
//!
//! # 使用示例
//!
//! ```bash
//! # 默认端口 8081，第 3 次查询给出结论
//! mock-accrual --ticks-until-final 2 --seed-rules
//!
//! # 每分钟最多 10 次查询，未登记订单一律按 500 积分结案
//! mock-accrual --rate-limit 10 --auto-accrual 500
//! ```

pub mod commands;
pub mod runner;

pub use commands::Cli;
pub use runner::{build_app, run_server};
