// src/persistence/memory.rs
//! In-process row store. Used when no database is configured and in tests.
//! Conflict-key matching on text columns trims and folds case fully
//! (the ledger's model key). SQLite's `COLLATE NOCASE` is looser: it folds
//! ASCII case only and does not trim, so "HP 85A " or "éco" can sit next to
//! "HP 85A" / "ÉCO" there. `InventoryLedger::refresh` merges such rows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ensure_column, Row, RowStore};
use crate::error::{LedgerError, LedgerResult};

type RawRow = Map<String, Value>;

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<&'static str, Vec<RawRow>>,
    fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRowStore {
    inner: Arc<Mutex<Tables>>,
}

fn same_key(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(a), Value::String(b)) => a.trim().to_lowercase() == b.trim().to_lowercase(),
        (a, b) => a == b,
    }
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Tables>> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::PersistenceError("memory store lock poisoned".to_string()))
    }

    fn writable(&self) -> LedgerResult<MutexGuard<'_, Tables>> {
        let tables = self.lock()?;
        if tables.fail_writes {
            return Err(LedgerError::PersistenceError("row store unavailable".to_string()));
        }
        Ok(tables)
    }

    /// Makes every subsequent write fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut tables) = self.inner.lock() {
            tables.fail_writes = fail;
        }
    }

    pub fn raw_rows(&self, table: &str) -> Vec<RawRow> {
        self.inner
            .lock()
            .map(|tables| tables.rows.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.raw_rows(table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .map(|tables| tables.rows.values().all(Vec::is_empty))
            .unwrap_or(true)
    }
}

fn to_raw<R: Row>(row: &R) -> LedgerResult<RawRow> {
    Ok(row.columns()?.into_iter().collect())
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn insert_or_replace<R: Row>(&self, row: &R, conflict_key: &str) -> LedgerResult<()> {
        let columns = row.columns()?;
        ensure_column(&columns, R::TABLE, conflict_key)?;
        let mut raw: RawRow = columns.into_iter().collect();

        let mut tables = self.writable()?;
        let table = tables.rows.entry(R::TABLE).or_default();
        let key = raw.get(conflict_key).cloned().unwrap_or(Value::Null);

        match table
            .iter_mut()
            .find(|existing| existing.get(conflict_key).map_or(false, |v| same_key(v, &key)))
        {
            Some(existing) => {
                if let Some(id) = existing.get("id").cloned() {
                    raw.insert("id".to_string(), id);
                }
                *existing = raw;
            }
            None => table.push(raw),
        }
        Ok(())
    }

    async fn select_all<R: Row>(&self) -> LedgerResult<Vec<R>> {
        let raw = self.lock()?.rows.get(R::TABLE).cloned().unwrap_or_default();
        raw.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(LedgerError::from))
            .collect()
    }

    async fn update<R: Row>(&self, row: &R, id: &str) -> LedgerResult<()> {
        let mut raw = to_raw(row)?;
        raw.insert("id".to_string(), Value::String(id.to_string()));

        let mut tables = self.writable()?;
        let existing = tables
            .rows
            .get_mut(R::TABLE)
            .and_then(|table| table.iter_mut().find(|r| r.get("id").and_then(Value::as_str) == Some(id)))
            .ok_or_else(|| LedgerError::row_not_found(R::TABLE, id))?;
        *existing = raw;
        Ok(())
    }

    async fn delete<R: Row>(&self, id: &str) -> LedgerResult<()> {
        let mut tables = self.writable()?;
        let table = tables.rows.entry(R::TABLE).or_default();
        let before = table.len();
        table.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
        if table.len() == before {
            return Err(LedgerError::row_not_found(R::TABLE, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{StockRow, STOCK_TABLE};
    use chrono::NaiveDate;
    use tokio_test::{assert_err, assert_ok};

    fn stock(id: &str, model: &str, qty: i64) -> StockRow {
        StockRow {
            id: id.into(),
            model: model.into(),
            color: None,
            printer_id: None,
            printer_name: None,
            current_stock: qty,
            low_stock_threshold: 5,
            last_updated: NaiveDate::from_ymd_opt(2024, 1, 25).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_or_replace_matches_model_case_insensitively() {
        let store = MemoryRowStore::new();
        assert_ok!(store.insert_or_replace(&stock("1", "HP 85A", 18), "model").await);
        assert_ok!(store.insert_or_replace(&stock("2", " hp 85a", 20), "model").await);

        let rows: Vec<StockRow> = store.select_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "1");
        assert_eq!(rows[0].current_stock, 20);
    }

    #[tokio::test]
    async fn test_conflict_key_trims_and_folds_non_ascii() {
        let store = MemoryRowStore::new();
        store.insert_or_replace(&stock("1", "ÉCO", 4), "model").await.unwrap();
        store.insert_or_replace(&stock("2", " éco ", 5), "model").await.unwrap();
        assert_eq!(store.row_count(STOCK_TABLE), 1);
    }

    #[tokio::test]
    async fn test_absent_optionals_stored_as_null() {
        let store = MemoryRowStore::new();
        store.insert_or_replace(&stock("1", "HP 85A", 18), "model").await.unwrap();
        let raw = store.raw_rows(STOCK_TABLE);
        assert_eq!(raw[0].get("printer_id"), Some(&Value::Null));
        assert_eq!(raw[0].get("current_stock"), Some(&Value::from(18)));
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryRowStore::new();
        store.set_fail_writes(true);
        assert_err!(store.insert_or_replace(&stock("1", "HP 85A", 18), "model").await);
        assert!(store.is_empty());

        store.set_fail_writes(false);
        assert_ok!(store.insert_or_replace(&stock("1", "HP 85A", 18), "model").await);
        assert_eq!(store.row_count(STOCK_TABLE), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rows() {
        let store = MemoryRowStore::new();
        assert!(matches!(
            store.update(&stock("9", "HP 85A", 1), "9").await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            store.delete::<StockRow>("9").await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
