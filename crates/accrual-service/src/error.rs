//! 积分服务客户端错误类型
//!
//! 只覆盖传输层故障（超时、连接失败、异常状态码、响应体无法解析）。
//! 这类错误由调度器通过下一轮重新拉取订单自然重试，客户端自身不重试。
//! 限流不属于错误，见 [`crate::models::AccrualResponse::RateLimited`]。

use std::time::Duration;

use loyalty_shared::error::LoyaltyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("积分服务请求失败: {0}")]
    Request(String),

    #[error("积分服务请求超时: {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("积分服务返回异常状态码: {status}")]
    UnexpectedStatus { status: u16 },

    #[error("积分服务响应格式错误: {0}")]
    MalformedResponse(String),
}

impl AccrualError {
    /// 超时错误，毫秒数超出 u64 时取 u64::MAX
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// 指标标签
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            _ => "transport_error",
        }
    }
}

impl From<AccrualError> for LoyaltyError {
    fn from(err: AccrualError) -> Self {
        let service = "accrual".to_string();
        match err {
            AccrualError::Timeout { .. } => LoyaltyError::ExternalServiceTimeout { service },
            other => LoyaltyError::ExternalService {
                service,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccrualError::UnexpectedStatus { status: 500 };
        assert_eq!(err.to_string(), "积分服务返回异常状态码: 500");

        let err = AccrualError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "积分服务请求超时: 5000ms");
        assert_eq!(err.outcome(), "timeout");
    }

    #[test]
    fn test_timeout_millis_saturate() {
        assert!(matches!(
            AccrualError::timeout(Duration::from_millis(1500)),
            AccrualError::Timeout { timeout_ms: 1500 }
        ));
        assert!(matches!(
            AccrualError::timeout(Duration::MAX),
            AccrualError::Timeout { timeout_ms: u64::MAX }
        ));
    }

    #[test]
    fn test_into_shared_error_is_retryable() {
        let shared: LoyaltyError = AccrualError::MalformedResponse("bad json".into()).into();
        assert_eq!(shared.code(), "EXTERNAL_SERVICE_ERROR");
        assert!(shared.is_retryable());

        let shared: LoyaltyError = AccrualError::Timeout { timeout_ms: 1 }.into();
        assert_eq!(shared.code(), "EXTERNAL_SERVICE_TIMEOUT");
    }
}
