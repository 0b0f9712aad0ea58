// src/persistence/rows.rs
//! Persisted shapes of the ledger entities. Field names are the column names.

use std::convert::TryFrom;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Row, ISSUED_TABLE, RECEIVED_TABLE, STOCK_TABLE};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{IssuedItem, ItemType, ReceivedItem, StockEntry, TonerColor, TonerType};

fn parse_item_type(raw: &str) -> LedgerResult<ItemType> {
    ItemType::parse(raw).ok_or_else(|| LedgerError::validation(format!("Unknown item type '{}'", raw)))
}

fn parse_color(raw: Option<String>) -> LedgerResult<Option<TonerColor>> {
    raw.filter(|c| !c.trim().is_empty())
        .map(|c| TonerColor::parse(&c).ok_or_else(|| LedgerError::validation(format!("Unknown toner color '{}'", c))))
        .transpose()
}

fn parse_toner_type(raw: Option<String>) -> LedgerResult<Option<TonerType>> {
    raw.filter(|t| !t.trim().is_empty())
        .map(|t| TonerType::parse(&t).ok_or_else(|| LedgerError::validation(format!("Unknown toner type '{}'", t))))
        .transpose()
}

/// Empty strings in optional columns are read back as absent.
fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

// ==================== TONER STOCK ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockRow {
    pub id: String,
    pub model: String,
    pub color: Option<String>,
    pub printer_id: Option<String>,
    pub printer_name: Option<String>,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub last_updated: NaiveDate,
}

impl Row for StockRow {
    const TABLE: &'static str = STOCK_TABLE;
    const CONFLICT_KEY: &'static str = "model";

    fn id(&self) -> &str {
        &self.id
    }
}

impl From<&StockEntry> for StockRow {
    fn from(entry: &StockEntry) -> Self {
        Self {
            id: entry.id.clone(),
            model: entry.model.clone(),
            color: entry.color.map(|c| c.as_str().to_string()),
            printer_id: entry.printer_id.clone(),
            printer_name: entry.printer_name.clone(),
            current_stock: entry.current_stock,
            low_stock_threshold: entry.low_stock_threshold,
            last_updated: entry.last_updated,
        }
    }
}

impl TryFrom<StockRow> for StockEntry {
    type Error = LedgerError;

    fn try_from(row: StockRow) -> LedgerResult<Self> {
        Ok(Self {
            id: row.id,
            model: row.model.trim().to_string(),
            color: parse_color(row.color)?,
            printer_id: non_empty(row.printer_id),
            printer_name: non_empty(row.printer_name),
            current_stock: row.current_stock,
            low_stock_threshold: row.low_stock_threshold,
            last_updated: row.last_updated,
        })
    }
}

// ==================== RECEIVED ITEMS ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReceivedRow {
    pub id: String,
    pub item_type: String,
    pub toner_model: Option<String>,
    pub toner_color: Option<String>,
    pub toner_type: Option<String>,
    pub printer_id: Option<String>,
    pub printer_name: Option<String>,
    pub quantity: i64,
    pub supplier: String,
    pub received_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Row for ReceivedRow {
    const TABLE: &'static str = RECEIVED_TABLE;
    const CONFLICT_KEY: &'static str = "id";

    fn id(&self) -> &str {
        &self.id
    }
}

impl From<&ReceivedItem> for ReceivedRow {
    fn from(item: &ReceivedItem) -> Self {
        Self {
            id: item.id.clone(),
            item_type: item.item_type.as_str().to_string(),
            toner_model: item.toner_model.clone(),
            toner_color: item.toner_color.map(|c| c.as_str().to_string()),
            toner_type: item.toner_type.map(|t| t.as_str().to_string()),
            printer_id: item.printer_id.clone(),
            printer_name: item.printer_name.clone(),
            quantity: item.quantity,
            supplier: item.supplier.clone(),
            received_date: item.received_date,
            notes: item.notes.clone(),
            created_at: item.created_at,
        }
    }
}

impl TryFrom<ReceivedRow> for ReceivedItem {
    type Error = LedgerError;

    fn try_from(row: ReceivedRow) -> LedgerResult<Self> {
        Ok(Self {
            id: row.id,
            item_type: parse_item_type(&row.item_type)?,
            toner_model: non_empty(row.toner_model),
            toner_color: parse_color(row.toner_color)?,
            toner_type: parse_toner_type(row.toner_type)?,
            printer_id: non_empty(row.printer_id),
            printer_name: non_empty(row.printer_name),
            quantity: row.quantity,
            supplier: row.supplier,
            received_date: row.received_date,
            notes: non_empty(row.notes),
            created_at: row.created_at,
        })
    }
}

// ==================== ISSUED ITEMS ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssuedRow {
    pub id: String,
    pub item_type: String,
    pub toner_model: Option<String>,
    pub toner_color: Option<String>,
    pub toner_type: Option<String>,
    pub printer_id: Option<String>,
    pub printer_name: Option<String>,
    pub quantity: i64,
    pub issued_to: String,
    pub issued_date: NaiveDate,
    pub asset_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Row for IssuedRow {
    const TABLE: &'static str = ISSUED_TABLE;
    const CONFLICT_KEY: &'static str = "id";

    fn id(&self) -> &str {
        &self.id
    }
}

impl From<&IssuedItem> for IssuedRow {
    fn from(item: &IssuedItem) -> Self {
        Self {
            id: item.id.clone(),
            item_type: item.item_type.as_str().to_string(),
            toner_model: item.toner_model.clone(),
            toner_color: item.toner_color.map(|c| c.as_str().to_string()),
            toner_type: item.toner_type.map(|t| t.as_str().to_string()),
            printer_id: item.printer_id.clone(),
            printer_name: item.printer_name.clone(),
            quantity: item.quantity,
            issued_to: item.issued_to.clone(),
            issued_date: item.issued_date,
            asset_id: item.asset_id.clone(),
            notes: item.notes.clone(),
            created_at: item.created_at,
        }
    }
}

impl TryFrom<IssuedRow> for IssuedItem {
    type Error = LedgerError;

    fn try_from(row: IssuedRow) -> LedgerResult<Self> {
        Ok(Self {
            id: row.id,
            item_type: parse_item_type(&row.item_type)?,
            toner_model: non_empty(row.toner_model),
            toner_color: parse_color(row.toner_color)?,
            toner_type: parse_toner_type(row.toner_type)?,
            printer_id: non_empty(row.printer_id),
            printer_name: non_empty(row.printer_name),
            quantity: row.quantity,
            issued_to: row.issued_to,
            issued_date: row.issued_date,
            asset_id: non_empty(row.asset_id),
            notes: non_empty(row.notes),
            created_at: row.created_at,
        })
    }
}
