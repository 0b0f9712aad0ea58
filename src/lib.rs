// src/lib.rs
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod models;
pub mod monitoring;
pub mod persistence;
pub mod reconciliation;
pub mod seed;
pub mod store;

pub use directory::{DeviceDirectory, InMemoryDeviceDirectory};
pub use error::{LedgerError, LedgerResult};
pub use ledger::InventoryLedger;
pub use persistence::{MemoryRowStore, RowStore, SqliteRowStore};
