//! 钱包 API
//! 创建钱包、查询余额，以及充值 / 提现 / 兑换 / 转账

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    api::response::{created_response, success_response, ApiResponse},
    app_state::AppState,
    domain::{BalanceEntry, Currency, WalletStatus},
    error::AppError,
    service::{ConversionReceipt, MovementReceipt, TransferReceipt},
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 请求/响应模型
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
pub struct CreateWalletResponse {
    pub address: String,
    /// 只在创建时返回一次
    pub private_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub status: WalletStatus,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub address: String,
    pub balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub currency: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub currency: String,
    pub amount: Decimal,
    pub private_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub amount: Decimal,
    pub private_key: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub destination_address: String,
    pub currency: String,
    pub amount: Decimal,
    pub private_key: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_wallet))
        .route("/:address", get(get_wallet))
        .route("/:address/balances", get(get_balances))
        .route("/:address/deposits", post(deposit))
        .route("/:address/withdrawals", post(withdraw))
        .route("/:address/conversions", post(convert))
        .route("/:address/transfers", post(transfer))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /wallets
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ApiResponse<CreateWalletResponse>>), AppError> {
    let created = state.engine.create_wallet().await?;
    created_response(
        CreateWalletResponse {
            address: created.address.clone(),
            private_key: created.secret.expose().to_string(),
            created_at: created.created_at,
        },
        "wallet created; store the private key, it will not be shown again",
    )
}

/// GET /wallets/:address
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<WalletResponse>>, AppError> {
    let wallet = state.engine.get_wallet(&address).await?;
    success_response(WalletResponse {
        address: wallet.address,
        created_at: wallet.created_at,
        status: wallet.status,
    })
}

/// GET /wallets/:address/balances
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<BalancesResponse>>, AppError> {
    let balances = state.engine.get_balances(&address).await?;
    success_response(BalancesResponse { address, balances })
}

/// POST /wallets/:address/deposits
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MovementReceipt>>, AppError> {
    let Json(req) = payload?;
    let currency = normalize_currency(&req.currency)?;
    require_positive(req.amount)?;

    let receipt = state
        .engine
        .deposit(&address, &currency, req.amount)
        .await?;
    success_response(receipt)
}

/// POST /wallets/:address/withdrawals
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MovementReceipt>>, AppError> {
    let Json(req) = payload?;
    let currency = normalize_currency(&req.currency)?;
    require_positive(req.amount)?;

    let receipt = state
        .engine
        .withdraw(&address, &currency, req.amount, &req.private_key)
        .await?;
    success_response(receipt)
}

/// POST /wallets/:address/conversions
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ConversionReceipt>>, AppError> {
    let Json(req) = payload?;
    let from = normalize_currency(&req.from_currency)?;
    let to = normalize_currency(&req.to_currency)?;
    require_positive(req.amount)?;

    let receipt = state
        .engine
        .convert(&address, &from, &to, req.amount, &req.private_key)
        .await?;
    success_response(receipt)
}

/// POST /wallets/:address/transfers
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TransferReceipt>>, AppError> {
    let Json(req) = payload?;
    let currency = normalize_currency(&req.currency)?;
    require_positive(req.amount)?;

    let receipt = state
        .engine
        .transfer(
            &address,
            req.destination_address.trim(),
            &currency,
            req.amount,
            &req.private_key,
        )
        .await?;
    success_response(receipt)
}

/// GET /currencies
pub async fn list_currencies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Currency>>>, AppError> {
    let currencies = state.engine.list_currencies().await?;
    success_response(currencies)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 参数校验
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn normalize_currency(code: &str) -> Result<String, AppError> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::validation_failed(format!(
            "invalid currency code `{}`",
            code
        )));
    }
    Ok(code)
}

fn require_positive(amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation_failed(
            "amount must be greater than zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
        assert_eq!(normalize_currency("Btc").unwrap(), "BTC");
        assert!(normalize_currency("").is_err());
        assert!(normalize_currency("US D").is_err());
        assert!(normalize_currency("USD;--").is_err());
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive(dec!(0.01)).is_ok());
        assert!(require_positive(dec!(0)).is_err());
        assert!(require_positive(dec!(-5)).is_err());
    }

    #[test]
    fn test_request_accepts_string_and_number_amounts() {
        let req: DepositRequest =
            serde_json::from_str(r#"{"currency":"usd","amount":"100.5"}"#).unwrap();
        assert_eq!(req.amount, dec!(100.5));

        let req: DepositRequest =
            serde_json::from_str(r#"{"currency":"usd","amount":100}"#).unwrap();
        assert_eq!(req.amount, dec!(100));
    }
}
