//! 错误定义模块

use thiserror::Error;

/// MediNodus系统统一错误类型
#[derive(Error, Debug)]
pub enum MedError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("认证失败: {0}")]
    Unauthorized(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("外部服务错误: {0}")]
    Upstream(String),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for MedError {
    fn from(err: config::ConfigError) -> Self {
        MedError::Config(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for MedError {
    fn from(err: sqlx::Error) -> Self {
        MedError::Database(err.to_string())
    }
}

/// MediNodus系统统一结果类型
pub type Result<T> = std::result::Result<T, MedError>;
