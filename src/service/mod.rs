pub mod ledger_engine;
pub mod price_oracle;

pub use ledger_engine::{
    ConversionReceipt, LedgerEngine, MovementReceipt, NewWallet, TransferReceipt,
};
pub use price_oracle::{CoinbasePriceOracle, OracleError, PriceOracle};
