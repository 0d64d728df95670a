//! 积分服务 HTTP 客户端
//!
//! 协议：`GET {base}/api/orders/{number}`
//!
//! | 状态码 | 含义 |
//! |--------|------|
//! | 200 | JSON 判定 `{order, status, accrual?}` |
//! | 204 | 积分服务尚未登记该订单，视为 UNKNOWN |
//! | 429 | 限流，`Retry-After` 为冷却秒数，缺失时取 60 秒 |
//! | 其他 | 传输错误 |
//!
//! 客户端每次调用只发一个请求，不做重试。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header::RETRY_AFTER};
use tracing::{debug, warn};

use crate::error::AccrualError;
use crate::models::{AccrualResponse, AccrualStatus, AccrualVerdict};

/// Retry-After 缺失或无法解析时的冷却时长
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// 单次限流冷却的上限
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// 积分服务客户端接口
///
/// 调度器通过泛型注入，测试时替换为 mock 或脚本化实现
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualClient: Send + Sync {
    /// 查询单个订单的积分判定
    async fn fetch_accrual(&self, number: &str) -> Result<AccrualResponse, AccrualError>;
}

/// 基于 reqwest 的积分服务客户端
///
/// reqwest::Client 内部带连接池，clone 是廉价操作
#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAccrualClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AccrualError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccrualError::Request(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }

    fn map_send_error(&self, err: reqwest::Error) -> AccrualError {
        if err.is_timeout() {
            AccrualError::timeout(self.timeout)
        } else {
            AccrualError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch_accrual(&self, number: &str) -> Result<AccrualResponse, AccrualError> {
        let response = self
            .http
            .get(self.order_url(number))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        debug!(order_number = number, status = status.as_u16(), "积分服务已响应");

        match status {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
                parse_verdict(&body).map(AccrualResponse::Verdict)
            }
            StatusCode::NO_CONTENT => Ok(AccrualResponse::Verdict(AccrualVerdict::unknown(number))),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok()),
                );
                warn!(
                    order_number = number,
                    retry_after_secs = retry_after.as_secs(),
                    "积分服务限流"
                );
                Ok(AccrualResponse::RateLimited { retry_after })
            }
            other => Err(AccrualError::UnexpectedStatus {
                status: other.as_u16(),
            }),
        }
    }
}

/// 解析 200 响应体
///
/// 未知状态、负积分都视为响应格式错误
pub fn parse_verdict(body: &[u8]) -> Result<AccrualVerdict, AccrualError> {
    let verdict: AccrualVerdict = serde_json::from_slice(body)
        .map_err(|e| AccrualError::MalformedResponse(e.to_string()))?;

    if let Some(accrual) = verdict.accrual
        && accrual.is_sign_negative()
    {
        return Err(AccrualError::MalformedResponse(format!(
            "积分为负数: {accrual}"
        )));
    }

    if verdict.status == AccrualStatus::Unknown {
        return Err(AccrualError::MalformedResponse(
            "200 响应中不应出现 UNKNOWN 状态".to_string(),
        ));
    }

    Ok(verdict)
}

/// 解析 Retry-After 秒数，缺失或非整数时回退到 60 秒，超过一小时按一小时计
pub fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .min(MAX_RETRY_AFTER)
}
