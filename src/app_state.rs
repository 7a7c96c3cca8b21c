use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::db::PgPool,
    repository::PgLedgerStore,
    service::{CoinbasePriceOracle, LedgerEngine},
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<LedgerEngine>,
    /// 仅在 Postgres 存储下存在，用于健康检查
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(config: Arc<Config>, engine: Arc<LedgerEngine>, pool: Option<PgPool>) -> Self {
        Self {
            config,
            engine,
            pool,
        }
    }

    /// Postgres 存储 + Coinbase 汇率服务
    pub fn from_config(config: Arc<Config>, pool: PgPool) -> anyhow::Result<Self> {
        let fees = config.fees.schedule()?;
        let credentials = config.keys.authority()?;
        let oracle = CoinbasePriceOracle::new(&config.oracle)?;
        let store = PgLedgerStore::new(pool.clone());

        let engine = LedgerEngine::new(Arc::new(store), Arc::new(oracle), credentials, fees);
        tracing::info!(
            withdrawal_fee = %fees.withdrawal,
            conversion_fee = %fees.conversion,
            transfer_fee = %fees.transfer,
            oracle = %config.oracle.base_url,
            "ledger engine initialized"
        );

        Ok(Self::new(config, Arc::new(engine), Some(pool)))
    }
}
