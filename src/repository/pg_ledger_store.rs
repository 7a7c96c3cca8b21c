//! PostgreSQL 账本存储
//!
//! Every `run_atomic` call opens one transaction, executes the mutations as
//! parameterized statements on it and commits. Debits are conditional
//! (`WHERE balance >= $1`), so two concurrent withdrawals on the same row can
//! never both pass: the second `UPDATE` re-evaluates the predicate against the
//! committed row under READ COMMITTED.
//!
//! Before any statement runs, the unit locks every balance row it touches in
//! `(address, currency_id)` order. Two units that touch the same pair of rows
//! in opposite directions (A->B against B->A, USD->BTC against BTC->USD) then
//! queue on the first lock instead of deadlocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use super::ledger_store::{LedgerMutation, LedgerStore, StoreError};
use crate::{
    domain::{BalanceEntry, Currency, CurrencyId, Wallet, WalletStatus},
    infrastructure::db::PgPool,
};

const UNIQUE_VIOLATION: &str = "23505";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

type WalletRow = (String, String, DateTime<Utc>, String);

fn wallet_from_row(row: WalletRow) -> Result<Wallet, StoreError> {
    let (address, secret_digest, created_at, status) = row;
    let status = status
        .parse::<WalletStatus>()
        .map_err(|s| StoreError::CorruptRow(format!("unknown wallet status `{}`", s)))?;
    Ok(Wallet {
        address,
        secret_digest,
        created_at,
        status,
    })
}

fn has_sqlstate(err: &sqlx::Error, sqlstate: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| code == sqlstate)
            .unwrap_or(false),
        _ => false,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, UNIQUE_VIOLATION)
}

/// Distinct balance rows of a unit, sorted into lock order.
fn lock_order(mutations: &[LedgerMutation]) -> Vec<(&str, CurrencyId)> {
    let mut keys: Vec<_> = mutations
        .iter()
        .filter_map(|m| m.balance_key())
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_wallet(
        &self,
        address: &str,
        secret_digest: &str,
    ) -> Result<Wallet, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            INSERT INTO wallets (address, secret_hash, status)
            VALUES ($1, $2, 'ACTIVE')
            RETURNING address, secret_hash, created_at, status
            "#,
        )
        .bind(address)
        .bind(secret_digest)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateAddress(address.to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        // 为每个已知币种初始化零余额
        sqlx::query(
            "INSERT INTO wallet_balances (address, currency_id, balance)
             SELECT $1, id, 0 FROM currencies",
        )
        .bind(address)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        wallet_from_row(row)
    }

    async fn get_wallet(&self, address: &str) -> Result<Option<Wallet>, StoreError> {
        let row = sqlx::query_as::<_, WalletRow>(
            "SELECT address, secret_hash, created_at, status FROM wallets WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(wallet_from_row).transpose()
    }

    async fn get_balances(&self, address: &str) -> Result<Vec<BalanceEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, Decimal)>(
            r#"
            SELECT c.code, c.name, b.balance
            FROM wallet_balances b
            JOIN currencies c ON c.id = b.currency_id
            WHERE b.address = $1
            ORDER BY c.code
            "#,
        )
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(code, name, balance)| BalanceEntry {
                code,
                name,
                balance,
            })
            .collect())
    }

    async fn get_balance(
        &self,
        address: &str,
        currency_code: &str,
    ) -> Result<Option<Decimal>, StoreError> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT b.balance
            FROM wallet_balances b
            JOIN currencies c ON c.id = b.currency_id
            WHERE b.address = $1 AND c.code = $2
            "#,
        )
        .bind(address)
        .bind(currency_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }

    async fn get_currency_id(&self, code: &str) -> Result<Option<CurrencyId>, StoreError> {
        let id = sqlx::query_scalar::<_, CurrencyId>("SELECT id FROM currencies WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_currencies(&self) -> Result<Vec<Currency>, StoreError> {
        let rows = sqlx::query_as::<_, (CurrencyId, String, String)>(
            "SELECT id, code, name FROM currencies ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, code, name)| Currency { id, code, name })
            .collect())
    }

    async fn run_atomic(&self, mutations: Vec<LedgerMutation>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Err(e) = lock_balance_rows(&mut tx, &mutations).await {
            tracing::warn!(error = %e, "failed to lock balance rows, rolling back");
            rollback(tx).await;
            return Err(e);
        }

        for (index, mutation) in mutations.iter().enumerate() {
            if let Err(e) = apply(&mut tx, mutation).await {
                tracing::warn!(
                    index,
                    kind = mutation.kind(),
                    error = %e,
                    "atomic unit failed, rolling back"
                );
                rollback(tx).await;
                return Err(e);
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

/// 回滚失败只记录日志，调用方拿到的仍是原始错误
async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = %e, "rollback failed");
    }
}

async fn lock_balance_rows(
    tx: &mut Transaction<'_, Postgres>,
    mutations: &[LedgerMutation],
) -> Result<(), StoreError> {
    for (address, currency_id) in lock_order(mutations) {
        // 行不存在时交给后续的 credit/debit 报 MissingBalanceRow
        sqlx::query(
            "SELECT 1 FROM wallet_balances
             WHERE address = $1 AND currency_id = $2
             FOR UPDATE",
        )
        .bind(address)
        .bind(currency_id)
        .fetch_optional(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    mutation: &LedgerMutation,
) -> Result<(), StoreError> {
    match mutation {
        LedgerMutation::RecordMovement(m) => {
            sqlx::query(
                "INSERT INTO movements (address, currency_id, amount, kind, fee)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&m.address)
            .bind(m.currency_id)
            .bind(m.amount)
            .bind(m.kind.as_str())
            .bind(m.fee)
            .execute(&mut **tx)
            .await?;
        }
        LedgerMutation::RecordConversion(c) => {
            sqlx::query(
                r#"
                INSERT INTO conversions (
                    address, from_currency_id, to_currency_id,
                    source_amount, destination_amount, fee_rate, fee, rate
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&c.address)
            .bind(c.from_currency_id)
            .bind(c.to_currency_id)
            .bind(c.source_amount)
            .bind(c.destination_amount)
            .bind(c.fee_rate)
            .bind(c.fee)
            .bind(c.rate)
            .execute(&mut **tx)
            .await?;
        }
        LedgerMutation::RecordTransfer(t) => {
            sqlx::query(
                "INSERT INTO transfers (source_address, destination_address, currency_id, amount, fee)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&t.source_address)
            .bind(&t.destination_address)
            .bind(t.currency_id)
            .bind(t.amount)
            .bind(t.fee)
            .execute(&mut **tx)
            .await?;
        }
        LedgerMutation::Credit {
            address,
            currency_id,
            amount,
        } => {
            let result = sqlx::query(
                "UPDATE wallet_balances
                 SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP
                 WHERE address = $2 AND currency_id = $3",
            )
            .bind(amount)
            .bind(address)
            .bind(currency_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if has_sqlstate(&e, NUMERIC_VALUE_OUT_OF_RANGE) {
                    StoreError::BalanceOverflow {
                        address: address.clone(),
                        currency_id: *currency_id,
                    }
                } else {
                    StoreError::Database(e)
                }
            })?;

            if result.rows_affected() == 0 {
                return Err(StoreError::MissingBalanceRow {
                    address: address.clone(),
                    currency_id: *currency_id,
                });
            }
        }
        LedgerMutation::Debit {
            address,
            currency_id,
            amount,
        } => {
            let result = sqlx::query(
                "UPDATE wallet_balances
                 SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
                 WHERE address = $2 AND currency_id = $3 AND balance >= $1",
            )
            .bind(amount)
            .bind(address)
            .bind(currency_id)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 0 {
                let available = sqlx::query_scalar::<_, Decimal>(
                    "SELECT balance FROM wallet_balances WHERE address = $1 AND currency_id = $2",
                )
                .bind(address)
                .bind(currency_id)
                .fetch_optional(&mut **tx)
                .await?;

                return Err(match available {
                    Some(available) => StoreError::InsufficientBalance {
                        address: address.clone(),
                        currency_id: *currency_id,
                        required: *amount,
                        available,
                    },
                    None => StoreError::MissingBalanceRow {
                        address: address.clone(),
                        currency_id: *currency_id,
                    },
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_lock_order_is_sorted_and_distinct() {
        let forward = vec![
            LedgerMutation::debit("b", 1, dec!(1)),
            LedgerMutation::credit("a", 1, dec!(1)),
        ];
        let backward = vec![
            LedgerMutation::debit("a", 1, dec!(1)),
            LedgerMutation::credit("b", 1, dec!(1)),
        ];
        assert_eq!(lock_order(&forward), vec![("a", 1), ("b", 1)]);
        assert_eq!(lock_order(&forward), lock_order(&backward));

        // 同一钱包的双向兑换
        let usd_to_btc = vec![
            LedgerMutation::debit("a", 5, dec!(1)),
            LedgerMutation::credit("a", 2, dec!(1)),
            LedgerMutation::credit("a", 5, dec!(1)),
        ];
        assert_eq!(lock_order(&usd_to_btc), vec![("a", 2), ("a", 5)]);
    }
}
