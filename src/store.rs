// src/store.rs
//! Stock Ledger Store: authoritative in-memory list of stock entries,
//! at most one per normalized model.

use chrono::{Local, NaiveDate};

use crate::models::StockEntry;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Default)]
pub struct StockLedgerStore {
    entries: Vec<StockEntry>,
}

impl StockLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the store from persisted rows. Rows sharing a normalized model
    /// (written by the older per-printer matching, or differing only in
    /// trailing spaces or non-ASCII case) are merged into the first one with
    /// their quantities summed. Returns the absorbed rows; the caller must
    /// retire them in the row store or they are counted again on the next load.
    pub fn from_entries(entries: Vec<StockEntry>) -> (Self, Vec<StockEntry>) {
        let mut store = Self::new();
        let mut absorbed = Vec::new();
        for entry in entries {
            match store.position(&entry.model) {
                Some(idx) => {
                    let kept = &mut store.entries[idx];
                    log::warn!(
                        "Merging duplicate stock row {} into {} for model '{}'",
                        entry.id, kept.id, kept.model
                    );
                    kept.current_stock = kept.current_stock.saturating_add(entry.current_stock.max(0));
                    kept.last_updated = kept.last_updated.max(entry.last_updated);
                    absorbed.push(entry);
                }
                None => store.entries.push(StockEntry {
                    current_stock: entry.current_stock.max(0),
                    low_stock_threshold: entry.low_stock_threshold.max(0),
                    ..entry
                }),
            }
        }
        (store, absorbed)
    }

    fn position(&self, model: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.matches_model(model))
    }

    /// Lookup by trimmed, case-insensitive model. Color and printer are
    /// accepted for interface compatibility and do not take part in matching.
    pub fn find_by_model(&self, model: &str, _color: Option<&str>, _printer_id: Option<&str>) -> Option<&StockEntry> {
        self.position(model).map(|idx| &self.entries[idx])
    }

    pub fn find(&self, id: &str) -> Option<&StockEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Replaces the entry with the same normalized model, or inserts.
    /// Stamps `last_updated`.
    pub fn upsert(&mut self, mut entry: StockEntry) -> &StockEntry {
        entry.last_updated = today();
        let idx = match self.position(&entry.model) {
            Some(idx) => {
                self.entries[idx] = entry;
                idx
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        &self.entries[idx]
    }

    /// Replaces the entry with this id in place (used for renames, where the
    /// model key itself changes). Caller has checked the new key is free.
    pub fn replace(&mut self, mut entry: StockEntry) -> Option<&StockEntry> {
        let idx = self.entries.iter().position(|e| e.id == entry.id)?;
        entry.last_updated = today();
        self.entries[idx] = entry;
        Some(&self.entries[idx])
    }

    /// Puts back a previous version verbatim (no timestamp).
    pub fn restore(&mut self, entry: StockEntry) {
        match self.entries.iter().position(|e| e.id == entry.id) {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<StockEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[StockEntry] {
        &self.entries
    }

    pub fn low_stock(&self) -> Vec<&StockEntry> {
        self.entries.iter().filter(|e| e.is_low_stock()).collect()
    }

    pub fn total_units(&self) -> i64 {
        self.entries.iter().map(|e| e.current_stock).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, model: &str, stock: i64) -> StockEntry {
        StockEntry {
            id: id.into(),
            model: model.into(),
            color: None,
            printer_id: None,
            printer_name: None,
            current_stock: stock,
            low_stock_threshold: 5,
            last_updated: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn test_find_by_model_ignores_case_and_whitespace() {
        let mut store = StockLedgerStore::new();
        store.upsert(entry("1", "HP 85A", 18));
        assert_eq!(store.find_by_model("  hp 85a ", None, None).unwrap().id, "1");
        assert_eq!(store.find_by_model("hp 85a", Some("Cyan"), Some("7")).unwrap().id, "1");
        assert!(store.find_by_model("HP 87A", None, None).is_none());
    }

    #[test]
    fn test_upsert_keeps_one_entry_per_model() {
        let mut store = StockLedgerStore::new();
        store.upsert(entry("1", "HP 85A", 18));
        store.upsert(entry("2", "hp 85a ", 3));
        assert_eq!(store.len(), 1);
        assert_eq!(store.entries()[0].id, "2");
        assert_eq!(store.entries()[0].current_stock, 3);
    }

    #[test]
    fn test_upsert_stamps_last_updated() {
        let mut store = StockLedgerStore::new();
        let stamped = store.upsert(entry("1", "HP 85A", 18)).last_updated;
        assert_eq!(stamped, today());
    }

    #[test]
    fn test_remove() {
        let mut store = StockLedgerStore::new();
        store.upsert(entry("1", "HP 85A", 18));
        assert!(store.remove("1").is_some());
        assert!(store.remove("1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_entries_merges_legacy_duplicates() {
        let (store, absorbed) = StockLedgerStore::from_entries(vec![
            entry("1", "HP 85A", 10),
            entry("2", "Canon 303", 8),
            entry("3", "hp 85a ", 4),
        ]);
        assert_eq!(store.len(), 2);
        let merged = store.find_by_model("HP 85A", None, None).unwrap();
        assert_eq!(merged.id, "1");
        assert_eq!(merged.current_stock, 14);
        let ids: Vec<_> = absorbed.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[test]
    fn test_from_entries_clamps_negative_rows() {
        let (store, absorbed) = StockLedgerStore::from_entries(vec![entry("1", "HP 85A", -4)]);
        assert!(absorbed.is_empty());
        assert_eq!(store.entries()[0].current_stock, 0);
    }

    #[test]
    fn test_low_stock_and_totals() {
        let mut store = StockLedgerStore::new();
        store.upsert(entry("1", "HP 85A", 18));
        store.upsert(entry("2", "Canon 303", 5));
        let low: Vec<_> = store.low_stock().iter().map(|e| e.id.clone()).collect();
        assert_eq!(low, vec!["2"]);
        assert_eq!(store.total_units(), 23);
    }
}
