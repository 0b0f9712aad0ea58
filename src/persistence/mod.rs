// src/persistence/mod.rs
//! Row-store boundary: three logical tables with snake_case columns.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;

use crate::error::{LedgerError, LedgerResult};

pub mod memory;
pub mod rows;
pub mod sqlite;

pub use memory::MemoryRowStore;
pub use rows::{IssuedRow, ReceivedRow, StockRow};
pub use sqlite::SqliteRowStore;

pub const STOCK_TABLE: &str = "toner_stock";
pub const RECEIVED_TABLE: &str = "received_items";
pub const ISSUED_TABLE: &str = "issued_items";

/// A persisted row. Serialization must emit every column, with absent
/// optionals as `null`.
pub trait Row:
    Serialize + DeserializeOwned + for<'r> sqlx::FromRow<'r, SqliteRow> + Clone + Send + Sync + Unpin + 'static
{
    /// Имя таблицы в базе данных
    const TABLE: &'static str;

    /// Unique column used by `insert_or_replace`
    const CONFLICT_KEY: &'static str;

    fn id(&self) -> &str;

    /// Column/value pairs in a stable order.
    fn columns(&self) -> LedgerResult<Vec<(String, Value)>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(LedgerError::PersistenceError(format!(
                "{} row did not serialize to an object: {}",
                Self::TABLE,
                other
            ))),
        }
    }
}

/// Базовый trait для операций с хранилищем строк
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert, or overwrite the row whose `conflict_key` column matches.
    /// The stored row keeps its own `id` on conflict.
    async fn insert_or_replace<R: Row>(&self, row: &R, conflict_key: &str) -> LedgerResult<()>;

    async fn select_all<R: Row>(&self) -> LedgerResult<Vec<R>>;

    /// Overwrites every column of the row with this id.
    async fn update<R: Row>(&self, row: &R, id: &str) -> LedgerResult<()>;

    async fn delete<R: Row>(&self, id: &str) -> LedgerResult<()>;
}

pub(crate) fn ensure_column(columns: &[(String, Value)], table: &str, column: &str) -> LedgerResult<()> {
    if columns.iter().any(|(name, _)| name == column) {
        Ok(())
    } else {
        Err(LedgerError::validation(format!("Unknown column '{}' for table {}", column, table)))
    }
}
