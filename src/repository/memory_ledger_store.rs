//! 内存账本存储（本地开发与测试）
//!
//! `run_atomic` applies every mutation to a staged copy of the tables and only
//! swaps it in once all of them succeeded, so a failure at any index leaves no
//! partial effect. `fail_at_mutation` injects such a failure.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::ledger_store::{LedgerMutation, LedgerStore, StoreError};
use crate::domain::{
    ensure_storable, BalanceEntry, Currency, CurrencyId, NewConversion, NewMovement, NewTransfer,
    Wallet, WalletStatus, DEFAULT_CURRENCIES,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    currencies: Vec<Currency>,
    wallets: HashMap<String, Wallet>,
    balances: HashMap<(String, CurrencyId), Decimal>,
    movements: Vec<NewMovement>,
    conversions: Vec<NewConversion>,
    transfers: Vec<NewTransfer>,
}

impl Tables {
    fn currency_by_code(&self, code: &str) -> Option<&Currency> {
        self.currencies.iter().find(|c| c.code == code)
    }

    fn require_wallet(&self, address: &str) -> Result<(), StoreError> {
        if self.wallets.contains_key(address) {
            Ok(())
        } else {
            Err(StoreError::Aborted(format!("unknown wallet {}", address)))
        }
    }

    fn apply(&mut self, mutation: LedgerMutation) -> Result<(), StoreError> {
        match mutation {
            LedgerMutation::RecordMovement(m) => {
                self.require_wallet(&m.address)?;
                self.movements.push(m);
            }
            LedgerMutation::RecordConversion(c) => {
                self.require_wallet(&c.address)?;
                self.conversions.push(c);
            }
            LedgerMutation::RecordTransfer(t) => {
                self.require_wallet(&t.source_address)?;
                self.require_wallet(&t.destination_address)?;
                self.transfers.push(t);
            }
            LedgerMutation::Credit {
                address,
                currency_id,
                amount,
            } => match self.balances.get_mut(&(address.clone(), currency_id)) {
                Some(balance) => {
                    *balance = balance
                        .checked_add(amount)
                        .and_then(|sum| ensure_storable(sum).ok())
                        .ok_or(StoreError::BalanceOverflow {
                            address,
                            currency_id,
                        })?;
                }
                None => {
                    return Err(StoreError::MissingBalanceRow {
                        address,
                        currency_id,
                    })
                }
            },
            LedgerMutation::Debit {
                address,
                currency_id,
                amount,
            } => match self.balances.get_mut(&(address.clone(), currency_id)) {
                Some(balance) if *balance >= amount => *balance -= amount,
                Some(balance) => {
                    return Err(StoreError::InsufficientBalance {
                        address,
                        currency_id,
                        required: amount,
                        available: *balance,
                    })
                }
                None => {
                    return Err(StoreError::MissingBalanceRow {
                        address,
                        currency_id,
                    })
                }
            },
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    fail_at: Option<usize>,
}

#[derive(Debug)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    /// Store seeded with [`DEFAULT_CURRENCIES`].
    pub fn new() -> Self {
        Self::with_currencies(DEFAULT_CURRENCIES)
    }

    pub fn with_currencies(currencies: &[(&str, &str)]) -> Self {
        let currencies = currencies
            .iter()
            .zip(1..)
            .map(|((code, name), id)| Currency {
                id,
                code: code.to_string(),
                name: name.to_string(),
            })
            .collect();
        Self {
            state: Mutex::new(State {
                tables: Tables {
                    currencies,
                    ..Default::default()
                },
                fail_at: None,
            }),
        }
    }

    /// Makes the next `run_atomic` call fail when it reaches mutation `index`.
    pub async fn fail_at_mutation(&self, index: usize) {
        self.state.lock().await.fail_at = Some(index);
    }

    pub async fn movements(&self) -> Vec<NewMovement> {
        self.state.lock().await.tables.movements.clone()
    }

    pub async fn conversions(&self) -> Vec<NewConversion> {
        self.state.lock().await.tables.conversions.clone()
    }

    pub async fn transfers(&self) -> Vec<NewTransfer> {
        self.state.lock().await.tables.transfers.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_wallet(
        &self,
        address: &str,
        secret_digest: &str,
    ) -> Result<Wallet, StoreError> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;

        if tables.wallets.contains_key(address) {
            return Err(StoreError::DuplicateAddress(address.to_string()));
        }

        let wallet = Wallet {
            address: address.to_string(),
            secret_digest: secret_digest.to_string(),
            created_at: Utc::now(),
            status: WalletStatus::Active,
        };
        let currency_ids: Vec<CurrencyId> = tables.currencies.iter().map(|c| c.id).collect();
        for id in currency_ids {
            tables
                .balances
                .insert((address.to_string(), id), Decimal::ZERO);
        }
        tables.wallets.insert(address.to_string(), wallet.clone());
        Ok(wallet)
    }

    async fn get_wallet(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
        Ok(self.state.lock().await.tables.wallets.get(address).cloned())
    }

    async fn get_balances(&self, address: &str) -> Result<Vec<BalanceEntry>, StoreError> {
        let state = self.state.lock().await;
        let tables = &state.tables;

        let mut entries: Vec<BalanceEntry> = tables
            .currencies
            .iter()
            .filter_map(|c| {
                tables
                    .balances
                    .get(&(address.to_string(), c.id))
                    .map(|balance| BalanceEntry {
                        code: c.code.clone(),
                        name: c.name.clone(),
                        balance: *balance,
                    })
            })
            .collect();
        entries.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(entries)
    }

    async fn get_balance(
        &self,
        address: &str,
        currency_code: &str,
    ) -> Result<Option<Decimal>, StoreError> {
        let state = self.state.lock().await;
        let tables = &state.tables;
        Ok(tables
            .currency_by_code(currency_code)
            .and_then(|c| tables.balances.get(&(address.to_string(), c.id)))
            .copied())
    }

    async fn get_currency_id(&self, code: &str) -> Result<Option<CurrencyId>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tables.currency_by_code(code).map(|c| c.id))
    }

    async fn list_currencies(&self) -> Result<Vec<Currency>, StoreError> {
        let state = self.state.lock().await;
        let mut currencies = state.tables.currencies.clone();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(currencies)
    }

    async fn run_atomic(&self, mutations: Vec<LedgerMutation>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let fail_at = state.fail_at.take();
        let mut staged = state.tables.clone();

        for (index, mutation) in mutations.into_iter().enumerate() {
            if fail_at == Some(index) {
                return Err(StoreError::Aborted(format!(
                    "injected fault at mutation {}",
                    index
                )));
            }
            staged.apply(mutation)?;
        }

        state.tables = staged;
        Ok(())
    }
}
