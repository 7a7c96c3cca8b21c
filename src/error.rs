use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    domain::MoneyError, repository::StoreError, service::price_oracle::OracleError,
};

// ============ 账本业务错误 ============

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("wallet {0} not found")]
    WalletNotFound(String),

    #[error("currency {0} not found")]
    CurrencyNotFound(String),

    #[error("invalid private key")]
    InvalidCredential,

    #[error("insufficient {currency} balance: required {required}, available {available}")]
    InsufficientFunds {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),

    #[error("{0}")]
    ValidationFailure(String),
}

impl From<OracleError> for LedgerError {
    fn from(err: OracleError) -> Self {
        LedgerError::QuoteUnavailable(err.to_string())
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        LedgerError::ValidationFailure(err.to_string())
    }
}

// ============ HTTP 错误 ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    WalletNotFound,
    CurrencyNotFound,
    InvalidCredentials,
    InsufficientBalance,
    QuoteUnavailable,
    ValidationFailed,
    DatabaseError,
    Internal,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::WalletNotFound => "wallet_not_found",
            AppErrorCode::CurrencyNotFound => "currency_not_found",
            AppErrorCode::InvalidCredentials => "invalid_credentials",
            AppErrorCode::InsufficientBalance => "insufficient_balance",
            AppErrorCode::QuoteUnavailable => "quote_unavailable",
            AppErrorCode::ValidationFailed => "validation_failed",
            AppErrorCode::DatabaseError => "database_error",
            AppErrorCode::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
        }
    }

    pub fn wallet_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::WalletNotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn currency_not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::CurrencyNotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn invalid_credentials(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidCredentials, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn insufficient_balance(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InsufficientBalance, StatusCode::BAD_REQUEST, msg)
    }

    pub fn quote_unavailable(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::QuoteUnavailable, StatusCode::BAD_GATEWAY, msg)
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::ValidationFailed, StatusCode::BAD_REQUEST, msg)
    }

    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::new(
            AppErrorCode::DatabaseError,
            StatusCode::INTERNAL_SERVER_ERROR,
            msg,
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::WalletNotFound(_) => Self::wallet_not_found(err.to_string()),
            LedgerError::CurrencyNotFound(_) => Self::currency_not_found(err.to_string()),
            LedgerError::InvalidCredential => Self::invalid_credentials(err.to_string()),
            LedgerError::InsufficientFunds { .. } => Self::insufficient_balance(err.to_string()),
            LedgerError::QuoteUnavailable(_) => Self::quote_unavailable(err.to_string()),
            LedgerError::ValidationFailure(_) => Self::validation_failed(err.to_string()),
            LedgerError::StoreFailure(store_err) => {
                // 原始存储错误只写日志，不返回给客户端
                tracing::error!(error = %store_err, "ledger store failure");
                Self::database_error("internal ledger error")
            }
        }
    }
}

// 请求体解析失败
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_failed(rejection.body_text())
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "unexpected error");
        Self::internal("internal error")
    }
}
