//! 账本交易引擎
//!
//! Every operation follows the same shape: validate with reads outside the
//! atomic unit, then hand all of its mutations to one `run_atomic` call. The
//! balance read only produces the descriptive error; the conditional debit in
//! the store is what actually prevents overdrafts under concurrency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::price_oracle::PriceOracle;
use crate::{
    domain::{
        self, BalanceEntry, Currency, CurrencyId, FeeSchedule, MovementKind, NewConversion,
        NewMovement, NewTransfer, Wallet, LEDGER_SCALE, MAX_LEDGER_AMOUNT,
    },
    error::LedgerError,
    infrastructure::credentials::{CredentialAuthority, Secret},
    repository::{LedgerMutation, LedgerStore, StoreError},
};

/// Address regeneration attempts on collision.
pub const MAX_ADDRESS_ATTEMPTS: usize = 5;

/// Result of wallet creation. The secret is never retrievable again.
#[derive(Debug)]
pub struct NewWallet {
    pub address: String,
    pub secret: Secret,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub address: String,
    pub currency: String,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReceipt {
    pub address: String,
    pub from_currency: String,
    pub to_currency: String,
    pub source_amount: Decimal,
    pub destination_amount: Decimal,
    pub rate: Decimal,
    pub fee_rate: Decimal,
    pub fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub source_address: String,
    pub destination_address: String,
    pub currency: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
}

pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    credentials: CredentialAuthority,
    fees: FeeSchedule,
}

impl LedgerEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        credentials: CredentialAuthority,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            store,
            oracle,
            credentials,
            fees,
        }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    // ============ 钱包管理 ============

    pub async fn create_wallet(&self) -> Result<NewWallet, LedgerError> {
        let secret = self.credentials.generate_secret();
        let digest = CredentialAuthority::hash_secret(secret.expose());

        for attempt in 1..=MAX_ADDRESS_ATTEMPTS {
            let address = self.credentials.generate_address();
            match self.store.create_wallet(&address, &digest).await {
                Ok(wallet) => {
                    tracing::info!(address = %wallet.address, "wallet created");
                    return Ok(NewWallet {
                        address: wallet.address,
                        secret,
                        created_at: wallet.created_at,
                    });
                }
                Err(StoreError::DuplicateAddress(_)) => {
                    tracing::warn!(attempt, "address collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Aborted(format!(
            "no free address after {} attempts",
            MAX_ADDRESS_ATTEMPTS
        ))
        .into())
    }

    pub async fn get_wallet(&self, address: &str) -> Result<Wallet, LedgerError> {
        self.store
            .get_wallet(address)
            .await?
            .ok_or_else(|| LedgerError::WalletNotFound(address.to_string()))
    }

    pub async fn get_balances(&self, address: &str) -> Result<Vec<BalanceEntry>, LedgerError> {
        self.get_wallet(address).await?;
        Ok(self.store.get_balances(address).await?)
    }

    pub async fn list_currencies(&self) -> Result<Vec<Currency>, LedgerError> {
        Ok(self.store.list_currencies().await?)
    }

    // ============ 账务操作 ============

    pub async fn deposit(
        &self,
        address: &str,
        currency: &str,
        amount: Decimal,
    ) -> Result<MovementReceipt, LedgerError> {
        ensure_positive(amount)?;
        self.get_wallet(address).await?;
        let currency_id = self.resolve_currency(currency).await?;

        let mutations = vec![
            LedgerMutation::RecordMovement(NewMovement {
                address: address.to_string(),
                currency_id,
                amount,
                kind: MovementKind::Deposit,
                fee: Decimal::ZERO,
            }),
            LedgerMutation::credit(address, currency_id, amount),
        ];
        self.commit(mutations, currency).await?;

        tracing::info!(address, currency, %amount, "deposit completed");
        Ok(MovementReceipt {
            address: address.to_string(),
            currency: currency.to_string(),
            kind: MovementKind::Deposit,
            amount,
            fee: Decimal::ZERO,
            total: amount,
        })
    }

    pub async fn withdraw(
        &self,
        address: &str,
        currency: &str,
        amount: Decimal,
        secret: &str,
    ) -> Result<MovementReceipt, LedgerError> {
        ensure_positive(amount)?;
        self.authenticate(address, secret).await?;
        let currency_id = self.resolve_currency(currency).await?;

        let breakdown = domain::debit_with_fee(amount, self.fees.withdrawal)?;
        self.ensure_covers(address, currency, breakdown.total).await?;

        let mutations = vec![
            LedgerMutation::RecordMovement(NewMovement {
                address: address.to_string(),
                currency_id,
                amount,
                kind: MovementKind::Withdrawal,
                fee: breakdown.fee,
            }),
            LedgerMutation::debit(address, currency_id, breakdown.total),
        ];
        self.commit(mutations, currency).await?;

        tracing::info!(
            address,
            currency,
            %amount,
            fee = %breakdown.fee,
            "withdrawal completed"
        );
        Ok(MovementReceipt {
            address: address.to_string(),
            currency: currency.to_string(),
            kind: MovementKind::Withdrawal,
            amount,
            fee: breakdown.fee,
            total: breakdown.total,
        })
    }

    pub async fn convert(
        &self,
        address: &str,
        from: &str,
        to: &str,
        amount: Decimal,
        secret: &str,
    ) -> Result<ConversionReceipt, LedgerError> {
        ensure_positive(amount)?;
        if from == to {
            return Err(LedgerError::ValidationFailure(
                "source and destination currencies must differ".into(),
            ));
        }
        self.authenticate(address, secret).await?;
        let from_id = self.resolve_currency(from).await?;
        let to_id = self.resolve_currency(to).await?;

        // 源币种不收手续费，只需覆盖兑换金额
        self.ensure_covers(address, from, amount).await?;

        let rate = self.oracle.get_rate(from, to).await.map_err(|e| {
            tracing::warn!(from, to, error = %e, "quote unavailable");
            LedgerError::from(e)
        })?;
        let breakdown = domain::convert(amount, rate, self.fees.conversion)?;
        if breakdown.net <= Decimal::ZERO {
            return Err(LedgerError::ValidationFailure(format!(
                "amount {} {} converts to nothing at rate {}",
                amount, from, rate
            )));
        }

        let mutations = vec![
            LedgerMutation::RecordConversion(NewConversion {
                address: address.to_string(),
                from_currency_id: from_id,
                to_currency_id: to_id,
                source_amount: amount,
                destination_amount: breakdown.net,
                fee_rate: breakdown.fee_rate.as_decimal(),
                fee: breakdown.fee,
                rate,
            }),
            LedgerMutation::debit(address, from_id, amount),
            LedgerMutation::credit(address, to_id, breakdown.net),
        ];
        self.commit(mutations, from).await?;

        tracing::info!(
            address,
            from,
            to,
            %amount,
            %rate,
            net = %breakdown.net,
            "conversion completed"
        );
        Ok(ConversionReceipt {
            address: address.to_string(),
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            source_amount: amount,
            destination_amount: breakdown.net,
            rate,
            fee_rate: breakdown.fee_rate.as_decimal(),
            fee: breakdown.fee,
        })
    }

    pub async fn transfer(
        &self,
        source: &str,
        destination: &str,
        currency: &str,
        amount: Decimal,
        secret: &str,
    ) -> Result<TransferReceipt, LedgerError> {
        ensure_positive(amount)?;
        if source == destination {
            return Err(LedgerError::ValidationFailure(
                "cannot transfer to the same wallet".into(),
            ));
        }
        self.authenticate(source, secret).await?;
        self.get_wallet(destination).await?;
        let currency_id = self.resolve_currency(currency).await?;

        let breakdown = domain::debit_with_fee(amount, self.fees.transfer)?;
        self.ensure_covers(source, currency, breakdown.total).await?;

        // 手续费留在系统内，目标钱包只收到 amount
        let mutations = vec![
            LedgerMutation::RecordTransfer(NewTransfer {
                source_address: source.to_string(),
                destination_address: destination.to_string(),
                currency_id,
                amount,
                fee: breakdown.fee,
            }),
            LedgerMutation::debit(source, currency_id, breakdown.total),
            LedgerMutation::credit(destination, currency_id, amount),
        ];
        self.commit(mutations, currency).await?;

        tracing::info!(
            source,
            destination,
            currency,
            %amount,
            fee = %breakdown.fee,
            "transfer completed"
        );
        Ok(TransferReceipt {
            source_address: source.to_string(),
            destination_address: destination.to_string(),
            currency: currency.to_string(),
            amount,
            fee: breakdown.fee,
            total: breakdown.total,
        })
    }

    // ============ 内部辅助 ============

    async fn authenticate(&self, address: &str, secret: &str) -> Result<Wallet, LedgerError> {
        let wallet = self.get_wallet(address).await?;
        if !CredentialAuthority::verify_secret(secret, &wallet.secret_digest) {
            tracing::warn!(address, "invalid private key");
            return Err(LedgerError::InvalidCredential);
        }
        Ok(wallet)
    }

    async fn resolve_currency(&self, code: &str) -> Result<CurrencyId, LedgerError> {
        self.store
            .get_currency_id(code)
            .await?
            .ok_or_else(|| LedgerError::CurrencyNotFound(code.to_string()))
    }

    async fn ensure_covers(
        &self,
        address: &str,
        currency: &str,
        required: Decimal,
    ) -> Result<(), LedgerError> {
        let available = self
            .store
            .get_balance(address, currency)
            .await?
            .unwrap_or(Decimal::ZERO);
        if available < required {
            tracing::warn!(address, currency, %required, %available, "insufficient balance");
            return Err(LedgerError::InsufficientFunds {
                currency: currency.to_string(),
                required,
                available,
            });
        }
        Ok(())
    }

    /// Runs the unit; a failed conditional debit surfaces as `InsufficientFunds`.
    async fn commit(
        &self,
        mutations: Vec<LedgerMutation>,
        debit_currency: &str,
    ) -> Result<(), LedgerError> {
        match self.store.run_atomic(mutations).await {
            Ok(()) => Ok(()),
            Err(StoreError::InsufficientBalance {
                address,
                required,
                available,
                ..
            }) => {
                tracing::warn!(
                    address = %address,
                    currency = debit_currency,
                    %required,
                    %available,
                    "conditional debit rejected"
                );
                Err(LedgerError::InsufficientFunds {
                    currency: debit_currency.to_string(),
                    required,
                    available,
                })
            }
            Err(StoreError::BalanceOverflow { address, .. }) => {
                tracing::warn!(address = %address, "credit would overflow balance");
                Err(LedgerError::ValidationFailure(format!(
                    "resulting balance of wallet {} would reach the ledger maximum of {}",
                    address, MAX_LEDGER_AMOUNT
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::ValidationFailure(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    if amount >= MAX_LEDGER_AMOUNT {
        return Err(LedgerError::ValidationFailure(format!(
            "amount {} must be below {}",
            amount, MAX_LEDGER_AMOUNT
        )));
    }
    if amount.normalize().scale() > LEDGER_SCALE {
        return Err(LedgerError::ValidationFailure(format!(
            "amount {} has more than {} decimal places",
            amount, LEDGER_SCALE
        )));
    }
    Ok(())
}
