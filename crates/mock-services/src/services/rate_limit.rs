//! 固定窗口限流器
//!
//! 以分钟为窗口统计请求数，超出上限时返回需要等待的秒数（对应 Retry-After）。

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// 每分钟请求数限流器，上限为 0 表示不限流
#[derive(Debug)]
pub struct RateLimiter {
    limit_per_minute: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit_per_minute,
            window: Mutex::new(Window {
                started_at: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn limit_per_minute(&self) -> u32 {
        self.limit_per_minute
    }

    /// 记录一次请求；超限时返回窗口剩余时长（向上取整到秒，至少 1 秒）
    pub async fn acquire(&self) -> Result<(), Duration> {
        if self.limit_per_minute == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut window = self.window.lock().await;
        if now.duration_since(window.started_at) >= WINDOW {
            window.started_at = now;
            window.count = 0;
        }

        if window.count < self.limit_per_minute {
            window.count += 1;
            return Ok(());
        }

        let remaining = WINDOW.saturating_sub(now.duration_since(window.started_at));
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        Err(Duration::from_secs(secs.max(1)))
    }
}
