// src/models/stock.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{double_option, TonerColor};

/// Ключ уникальности складской позиции: trimmed, case-folded model.
pub fn normalize_model(model: &str) -> String {
    model.trim().to_lowercase()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub id: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<TonerColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub last_updated: NaiveDate,
}

impl StockEntry {
    pub fn model_key(&self) -> String {
        normalize_model(&self.model)
    }

    pub fn matches_model(&self, model: &str) -> bool {
        self.model_key() == normalize_model(model)
    }

    /// Low stock is derived, never stored. Equality counts as low.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.low_stock_threshold
    }
}

/// Позиция с вычисляемым статусом (для отчётов)
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StockStatusView {
    #[serde(flatten)]
    pub entry: StockEntry,
    pub is_low_stock: bool,
}

impl From<&StockEntry> for StockStatusView {
    fn from(entry: &StockEntry) -> Self {
        Self {
            entry: entry.clone(),
            is_low_stock: entry.is_low_stock(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockEntryRequest {
    #[validate(length(min = 1, max = 100, message = "Model must be between 1 and 100 characters"))]
    pub model: String,
    pub color: Option<TonerColor>,
    #[validate(length(max = 100, message = "Printer ID cannot exceed 100 characters"))]
    pub printer_id: Option<String>,
    #[validate(range(min = 0, max = 100000, message = "Low stock threshold must be non-negative"))]
    pub low_stock_threshold: Option<i64>,
}

impl CreateStockEntryRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            color: None,
            printer_id: None,
            low_stock_threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = Some(threshold);
        self
    }
}

/// Patch for an existing entry. `None` leaves a field untouched;
/// `Some(None)` clears an optional one. Quantity is not editable here.
#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockEntryRequest {
    #[validate(length(min = 1, max = 100, message = "Model must be between 1 and 100 characters"))]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<TonerColor>>,
    #[serde(default, deserialize_with = "double_option")]
    pub printer_id: Option<Option<String>>,
    #[validate(range(min = 0, max = 100000, message = "Low stock threshold must be non-negative"))]
    pub low_stock_threshold: Option<i64>,
}
