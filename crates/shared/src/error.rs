//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 订单业务错误 ====================
    #[error("订单号格式无效: {number}")]
    InvalidOrderNumber { number: String },

    #[error("订单已被其他用户上传: {number}")]
    OrderOwnedByAnotherUser { number: String },

    #[error("订单已处于终态: {number}")]
    OrderAlreadyFinalized { number: String },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("外部服务超时: {service}")]
    ExternalServiceTimeout { service: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidOrderNumber { .. } => "INVALID_ORDER_NUMBER",
            Self::OrderOwnedByAnotherUser { .. } => "ORDER_OWNED_BY_ANOTHER_USER",
            Self::OrderAlreadyFinalized { .. } => "ORDER_ALREADY_FINALIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::ExternalServiceTimeout { .. } => "EXTERNAL_SERVICE_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::ExternalService { .. } | Self::ExternalServiceTimeout { .. }
        )
    }

    /// 是否为并发终态冲突（另一轮调度已完成该订单）
    pub fn is_finalize_conflict(&self) -> bool {
        matches!(self, Self::OrderAlreadyFinalized { .. })
    }

    pub fn order_not_found(number: &str) -> Self {
        Self::NotFound {
            entity: "Order".to_string(),
            id: number.to_string(),
        }
    }
}
