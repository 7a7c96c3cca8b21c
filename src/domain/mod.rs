//! Domain 模块
//!
//! 账本领域模型与定点金额运算

pub mod ledger;
pub mod money;

// 重新导出常用类型
pub use ledger::{
    BalanceEntry, Currency, CurrencyId, MovementKind, NewConversion, NewMovement, NewTransfer,
    Wallet, WalletStatus, DEFAULT_CURRENCIES,
};
pub use money::{
    convert, debit_with_fee, ensure_storable, quantize, ConversionBreakdown, FeeBreakdown,
    FeeRate, FeeSchedule, MoneyError, LEDGER_SCALE, MAX_LEDGER_AMOUNT,
};
