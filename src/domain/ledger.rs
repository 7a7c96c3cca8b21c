//! 账本领域模型：钱包、币种、余额、流水

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type CurrencyId = i32;

/// Currency set seeded into a fresh ledger (same as `migrations/0002_seed_currencies.sql`).
pub const DEFAULT_CURRENCIES: &[(&str, &str)] = &[
    ("BTC", "Bitcoin"),
    ("ETH", "Ethereum"),
    ("SOL", "Solana"),
    ("USD", "US Dollar"),
    ("BRL", "Brazilian Real"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    Active,
    Blocked,
    Closed,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "ACTIVE",
            WalletStatus::Blocked => "BLOCKED",
            WalletStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(WalletStatus::Active),
            "BLOCKED" => Ok(WalletStatus::Blocked),
            "CLOSED" => Ok(WalletStatus::Closed),
            other => Err(other.to_string()),
        }
    }
}

/// 托管钱包（地址 + 私钥哈希）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub address: String,
    pub secret_digest: String,
    pub created_at: DateTime<Utc>,
    pub status: WalletStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub id: CurrencyId,
    pub code: String,
    pub name: String,
}

/// One row of a wallet's balance listing, ordered by currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceEntry {
    pub code: String,
    pub name: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Deposit,
    Withdrawal,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Deposit => "DEPOSIT",
            MovementKind::Withdrawal => "WITHDRAWAL",
        }
    }
}

// ============ 流水（只追加） ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub address: String,
    pub currency_id: CurrencyId,
    pub amount: Decimal,
    pub kind: MovementKind,
    pub fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversion {
    pub address: String,
    pub from_currency_id: CurrencyId,
    pub to_currency_id: CurrencyId,
    pub source_amount: Decimal,
    pub destination_amount: Decimal,
    pub fee_rate: Decimal,
    pub fee: Decimal,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub source_address: String,
    pub destination_address: String,
    pub currency_id: CurrencyId,
    pub amount: Decimal,
    pub fee: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_status_round_trips_through_db_text() {
        for status in [WalletStatus::Active, WalletStatus::Blocked, WalletStatus::Closed] {
            assert_eq!(status.as_str().parse::<WalletStatus>(), Ok(status));
        }
        assert_eq!("ATIVA".parse::<WalletStatus>(), Err("ATIVA".to_string()));
    }

    #[test]
    fn test_default_currencies_have_unique_codes() {
        let mut codes: Vec<_> = DEFAULT_CURRENCIES.iter().map(|(c, _)| *c).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), DEFAULT_CURRENCIES.len());
    }
}
