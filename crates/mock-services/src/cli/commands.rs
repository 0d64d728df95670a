//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。

use clap::Parser;

/// Mock 积分计算服务
///
/// 订单按查询次数推进：首次查询 REGISTERED，随后 PROCESSING，
/// 达到 `--ticks-until-final` 次查询后返回 PROCESSED 或 INVALID。
#[derive(Parser, Debug)]
#[command(name = "mock-accrual")]
#[command(version, about = "积分计算服务模拟工具")]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// 服务端口
    #[arg(short, long, default_value = "8081", env = "MOCK_ACCRUAL_PORT")]
    pub port: u16,

    /// 每分钟允许的查询次数，0 表示不限流
    #[arg(long, default_value = "0")]
    pub rate_limit: u32,

    /// 订单给出最终结论前需要的查询次数
    #[arg(long, default_value = "2")]
    pub ticks_until_final: u32,

    /// 未登记订单自动登记并按该积分结案
    #[arg(long)]
    pub auto_accrual: Option<f64>,

    /// 启动时登记内置积分规则
    #[arg(long)]
    pub seed_rules: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["mock-accrual"]);
        assert_eq!(cli.port, 8081);
        assert_eq!(cli.rate_limit, 0);
        assert_eq!(cli.ticks_until_final, 2);
        assert_eq!(cli.auto_accrual, None);
        assert!(!cli.seed_rules);
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "mock-accrual",
            "--port",
            "9000",
            "--rate-limit",
            "10",
            "--auto-accrual",
            "500",
            "--seed-rules",
        ]);
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.rate_limit, 10);
        assert_eq!(cli.auto_accrual, Some(500.0));
        assert!(cli.seed_rules);
    }
}
