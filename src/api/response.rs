//! 统一 API 响应格式
//!
//! 成功响应：{ code: 0, message, data }
//! 错误响应由 AppError 生成：{ code: "error_code", message }

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::error::AppError;

/// 统一成功响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data,
        }
    }

    /// 创建成功响应（带自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data,
        }
    }
}

/// 辅助函数：将数据包装为统一响应格式
pub fn success_response<T: Serialize>(data: T) -> Result<Json<ApiResponse<T>>, AppError> {
    Ok(Json(ApiResponse::success(data)))
}

/// 201 Created
pub fn created_response<T: Serialize>(
    data: T,
    message: impl Into<String>,
) -> Result<(StatusCode, Json<ApiResponse<T>>), AppError> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(data, message)),
    ))
}
