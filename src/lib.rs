//! wallet-ledger - 托管多币种钱包账本
//!
//! 充值、提现、兑换、转账；每个操作在账本存储中原子提交

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode, LedgerError};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        domain::{FeeRate, FeeSchedule},
        error::{AppError, LedgerError},
        repository::{InMemoryLedgerStore, LedgerStore, PgLedgerStore},
        service::{LedgerEngine, PriceOracle},
    };
}
