//! 汇率服务（现货价格）
//!
//! Fetches a spot rate from a Coinbase-style endpoint
//! (`GET {base}/v2/prices/{FROM}-{TO}/spot` → `{"data": {"amount": "..."}}`).
//! The amount string is parsed straight into `Decimal`. There is no cache and
//! no fallback: any failure is returned to the caller.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::OracleConfig;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("price request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("price service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed price response: {0}")]
    Malformed(String),
    #[error("no rate available for {from}-{to}")]
    MissingRate { from: String, to: String },
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Units of `to` obtained for one unit of `from`.
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, OracleError>;
}

/// 现货价格响应
#[derive(Debug, Deserialize)]
struct SpotPriceResponse {
    data: Option<SpotPrice>,
}

#[derive(Debug, Deserialize)]
struct SpotPrice {
    amount: Option<String>,
}

pub struct CoinbasePriceOracle {
    client: reqwest::Client,
    base_url: String,
}

impl CoinbasePriceOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("wallet-ledger/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn spot_url(&self, from: &str, to: &str) -> String {
        format!("{}/v2/prices/{}-{}/spot", self.base_url, from, to)
    }
}

#[async_trait]
impl PriceOracle for CoinbasePriceOracle {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal, OracleError> {
        let url = self.spot_url(from, to);
        tracing::debug!(%url, "fetching spot price");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(from, to, %status, "price service error");
            return Err(OracleError::Status(status));
        }

        let body = response.text().await?;
        parse_spot_body(&body, from, to)
    }
}

fn parse_spot_body(body: &str, from: &str, to: &str) -> Result<Decimal, OracleError> {
    let parsed: SpotPriceResponse =
        serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;

    let amount = parsed
        .data
        .and_then(|d| d.amount)
        .ok_or_else(|| OracleError::MissingRate {
            from: from.to_string(),
            to: to.to_string(),
        })?;

    let rate = Decimal::from_str(amount.trim())
        .map_err(|_| OracleError::Malformed(format!("amount `{}` is not a decimal", amount)))?;
    if rate <= Decimal::ZERO {
        return Err(OracleError::Malformed(format!("non-positive rate {}", rate)));
    }
    Ok(rate)
}
