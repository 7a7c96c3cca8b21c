// 账本存储抽象：读取接口 + 原子批量变更

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{
    BalanceEntry, Currency, CurrencyId, NewConversion, NewMovement, NewTransfer, Wallet,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("wallet address already exists: {0}")]
    DuplicateAddress(String),

    /// Raised by a conditional debit inside an atomic unit; the unit is rolled back.
    #[error(
        "insufficient balance for wallet {address} currency {currency_id}: required {required}, available {available}"
    )]
    InsufficientBalance {
        address: String,
        currency_id: CurrencyId,
        required: Decimal,
        available: Decimal,
    },

    #[error("no balance row for wallet {address} currency {currency_id}")]
    MissingBalanceRow {
        address: String,
        currency_id: CurrencyId,
    },

    /// A credit would push the balance past what the column can hold.
    #[error("balance overflow for wallet {address} currency {currency_id}")]
    BalanceOverflow {
        address: String,
        currency_id: CurrencyId,
    },

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("atomic unit aborted: {0}")]
    Aborted(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 原子单元中的一条语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMutation {
    RecordMovement(NewMovement),
    RecordConversion(NewConversion),
    RecordTransfer(NewTransfer),
    /// `balance += amount`
    Credit {
        address: String,
        currency_id: CurrencyId,
        amount: Decimal,
    },
    /// `balance -= amount`, only if `balance >= amount`
    Debit {
        address: String,
        currency_id: CurrencyId,
        amount: Decimal,
    },
}

impl LedgerMutation {
    pub fn credit(address: &str, currency_id: CurrencyId, amount: Decimal) -> Self {
        LedgerMutation::Credit {
            address: address.to_string(),
            currency_id,
            amount,
        }
    }

    pub fn debit(address: &str, currency_id: CurrencyId, amount: Decimal) -> Self {
        LedgerMutation::Debit {
            address: address.to_string(),
            currency_id,
            amount,
        }
    }

    /// The balance row a credit or debit touches.
    pub fn balance_key(&self) -> Option<(&str, CurrencyId)> {
        match self {
            LedgerMutation::Credit {
                address,
                currency_id,
                ..
            }
            | LedgerMutation::Debit {
                address,
                currency_id,
                ..
            } => Some((address.as_str(), *currency_id)),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerMutation::RecordMovement(_) => "record_movement",
            LedgerMutation::RecordConversion(_) => "record_conversion",
            LedgerMutation::RecordTransfer(_) => "record_transfer",
            LedgerMutation::Credit { .. } => "credit",
            LedgerMutation::Debit { .. } => "debit",
        }
    }
}

// ============ Store Trait ============

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 创建钱包并为每个已知币种初始化零余额（同一事务）
    async fn create_wallet(&self, address: &str, secret_digest: &str)
        -> Result<Wallet, StoreError>;

    async fn get_wallet(&self, address: &str) -> Result<Option<Wallet>, StoreError>;

    /// Balances of one wallet, ordered by currency code ascending.
    async fn get_balances(&self, address: &str) -> Result<Vec<BalanceEntry>, StoreError>;

    async fn get_balance(
        &self,
        address: &str,
        currency_code: &str,
    ) -> Result<Option<Decimal>, StoreError>;

    async fn get_currency_id(&self, code: &str) -> Result<Option<CurrencyId>, StoreError>;

    async fn list_currencies(&self) -> Result<Vec<Currency>, StoreError>;

    /// Applies `mutations` in order as one all-or-nothing unit.
    async fn run_atomic(&self, mutations: Vec<LedgerMutation>) -> Result<(), StoreError>;
}
