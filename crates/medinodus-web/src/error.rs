//! HTTP错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medinodus_core::MedError;
use serde_json::json;
use tracing::error;

/// 处理器错误，包装 `MedError` 并映射HTTP状态码
#[derive(Debug)]
pub struct ApiError(pub MedError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<MedError> for ApiError {
    fn from(err: MedError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MedError::Validation(_) => StatusCode::BAD_REQUEST,
            MedError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MedError::NotFound(_) => StatusCode::NOT_FOUND,
            MedError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 服务端错误只返回通用信息
        let message = match &self.0 {
            MedError::Validation(msg) | MedError::Unauthorized(msg) | MedError::NotFound(msg) => msg.clone(),
            other => {
                error!("Request failed: {}", other);
                "Internal server error".to_string()
            }
        };
        (status, Json(json!({ "detail": message }))).into_response()
    }
}
