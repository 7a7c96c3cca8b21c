pub mod ledger_store;
pub mod memory_ledger_store;
pub mod pg_ledger_store;

pub use ledger_store::{LedgerMutation, LedgerStore, StoreError};
pub use memory_ledger_store::InMemoryLedgerStore;
pub use pg_ledger_store::PgLedgerStore;
