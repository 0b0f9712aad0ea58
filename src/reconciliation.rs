// src/reconciliation.rs
//! Reconciliation Engine. `apply_delta` is the only code path that changes
//! a stock quantity; everything else goes through it.

use uuid::Uuid;

use crate::directory::DeviceDirectory;
use crate::error::{validate_required, LedgerError, LedgerResult};
use crate::models::{CreateStockEntryRequest, StockEntry, TonerColor};
use crate::store::{today, StockLedgerStore};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// One stock movement against a toner model.
#[derive(Debug, Clone, Copy)]
pub struct StockDelta<'a> {
    pub model: &'a str,
    pub change: i64,
    pub color: Option<TonerColor>,
    pub printer_id: Option<&'a str>,
}

impl<'a> StockDelta<'a> {
    pub fn new(model: &'a str, change: i64) -> Self {
        Self {
            model,
            change,
            color: None,
            printer_id: None,
        }
    }

    pub fn with_color(mut self, color: Option<TonerColor>) -> Self {
        self.color = color;
        self
    }

    pub fn with_printer(mut self, printer_id: Option<&'a str>) -> Self {
        self.printer_id = printer_id.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Applies a quantity change to the entry for `delta.model`, creating it when
/// absent. The balance is clamped at zero. Returns the stored entry.
pub fn apply_delta<D>(
    store: &mut StockLedgerStore,
    directory: &D,
    delta: StockDelta<'_>,
    default_threshold: i64,
) -> LedgerResult<StockEntry>
where
    D: DeviceDirectory + ?Sized,
{
    validate_required(delta.model, "model")?;
    let model = delta.model.trim();
    let existing = store.find_by_model(model, None, None);

    let previous = existing.map(|e| e.current_stock).unwrap_or(0);
    let raw_stock = previous.checked_add(delta.change).ok_or_else(|| {
        LedgerError::validation(format!(
            "Stock change {:+} for '{}' is out of range (current {})",
            delta.change, model, previous
        ))
    })?;
    let new_stock = raw_stock.max(0);

    let (printer_id, printer_name) = match delta.printer_id {
        Some(id) => (Some(id.to_string()), directory.printer_label(id)),
        None => (
            existing.and_then(|e| e.printer_id.clone()),
            existing.and_then(|e| e.printer_name.clone()),
        ),
    };

    let entry = StockEntry {
        id: existing
            .map(|e| e.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        // first-seen casing is the stored one
        model: existing.map(|e| e.model.clone()).unwrap_or_else(|| model.to_string()),
        color: delta.color.or_else(|| existing.and_then(|e| e.color)),
        printer_id,
        printer_name,
        current_stock: new_stock,
        low_stock_threshold: existing
            .map(|e| e.low_stock_threshold)
            .unwrap_or(default_threshold),
        last_updated: today(),
    };

    if raw_stock < 0 {
        log::warn!(
            "Stock for '{}' clamped at zero ({} {:+})",
            entry.model, previous, delta.change
        );
    }
    log::info!(
        "📦 Stock '{}': {} -> {} ({:+})",
        entry.model, previous, new_stock, delta.change
    );

    let stored = store.upsert(entry).clone();
    if stored.is_low_stock() {
        log::warn!(
            "⚠️ Low stock for '{}': {} left (threshold {})",
            stored.model, stored.current_stock, stored.low_stock_threshold
        );
    }
    Ok(stored)
}

/// Issuance pre-check: the model must have an entry holding at least
/// `quantity` units.
pub fn check_issuable<'s>(store: &'s StockLedgerStore, model: &str, quantity: i64) -> LedgerResult<&'s StockEntry> {
    let entry = store
        .find_by_model(model, None, None)
        .ok_or_else(|| LedgerError::no_stock_entry(model.trim()))?;
    if entry.current_stock < quantity {
        return Err(LedgerError::insufficient_stock(&entry.model, entry.current_stock, quantity));
    }
    Ok(entry)
}

/// Explicit creation path: seeds a zero-quantity entry.
pub fn create_entry<D>(
    store: &mut StockLedgerStore,
    directory: &D,
    request: &CreateStockEntryRequest,
    default_threshold: i64,
) -> LedgerResult<StockEntry>
where
    D: DeviceDirectory + ?Sized,
{
    validate_required(&request.model, "model")?;
    let model = request.model.trim();
    if store.find_by_model(model, None, None).is_some() {
        return Err(LedgerError::duplicate_model(model));
    }

    let printer_id = request
        .printer_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let entry = StockEntry {
        id: Uuid::new_v4().to_string(),
        model: model.to_string(),
        color: request.color,
        printer_id: printer_id.map(str::to_string),
        printer_name: printer_id.and_then(|id| directory.printer_label(id)),
        current_stock: 0,
        low_stock_threshold: request.low_stock_threshold.unwrap_or(default_threshold),
        last_updated: today(),
    };

    log::info!("Created stock entry for '{}' (threshold {})", entry.model, entry.low_stock_threshold);
    Ok(store.upsert(entry).clone())
}
