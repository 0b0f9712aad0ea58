// src/ledger.rs
//! Transaction Recorder and stock-entry service. One `InventoryLedger` owns the
//! stock book and both transaction histories; every mutation goes through it,
//! and every quantity change goes through `reconciliation::apply_delta`.
//!
//! Writes are awaited before an operation returns. A failed write leaves the
//! local change in place (create and stock-entry update excepted, which roll
//! back) and comes back as `PersistenceError`; the next `refresh` reconciles.

use std::collections::BTreeSet;
use std::convert::TryFrom;
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::config::LedgerConfig;
use crate::directory::DeviceDirectory;
use crate::error::{validate_required, LedgerError, LedgerResult};
use crate::models::{
    normalize_model, CreateStockEntryRequest, IssueItemRequest, IssuedItem, ReceiveItemRequest,
    ReceivedItem, StockEntry, StockStatusView, StockSummary, TonerColor, UpdateIssuedItemRequest,
    UpdateReceivedItemRequest, UpdateStockEntryRequest,
};
use crate::monitoring::{LedgerMetrics, MetricsSnapshot};
use crate::persistence::{
    IssuedRow, ReceivedRow, Row, RowStore, StockRow, ISSUED_TABLE, RECEIVED_TABLE, STOCK_TABLE,
};
use crate::reconciliation::{self, check_issuable, create_entry, StockDelta};
use crate::store::StockLedgerStore;

/// A row-store call queued by an operation after its local mutation.
enum PendingWrite {
    Stock(StockRow),
    DeleteStock(String),
    Received(ReceivedRow),
    UpdateReceived(ReceivedRow),
    DeleteReceived(String),
    Issued(IssuedRow),
    UpdateIssued(IssuedRow),
    DeleteIssued(String),
}

fn label_printer<D: DeviceDirectory + ?Sized>(
    directory: &D,
    printer_id: &Option<String>,
    printer_name: &mut Option<String>,
) {
    if printer_name.is_none() {
        if let Some(id) = printer_id.as_deref().filter(|id| !id.trim().is_empty()) {
            *printer_name = directory.printer_label(id);
        }
    }
}

fn convert_rows<R, T>(rows: Vec<R>, table: &str) -> Vec<T>
where
    R: Row,
    T: TryFrom<R, Error = LedgerError>,
{
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id().to_string();
            match T::try_from(row) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Skipping unreadable {} row {}: {}", table, id, e);
                    None
                }
            }
        })
        .collect()
}

pub struct InventoryLedger<S: RowStore, D: DeviceDirectory> {
    config: LedgerConfig,
    stock: StockLedgerStore,
    received: Vec<ReceivedItem>,
    issued: Vec<IssuedItem>,
    rows: S,
    directory: D,
    last_error: Option<String>,
    /// Stock rows merged into another row whose delete has not gone through yet
    retired_stock_rows: BTreeSet<String>,
    metrics: Arc<LedgerMetrics>,
}

impl<S: RowStore, D: DeviceDirectory> InventoryLedger<S, D> {
    /// Empty ledger; call `refresh` to load persisted state.
    pub fn new(config: LedgerConfig, rows: S, directory: D) -> Self {
        Self {
            config,
            stock: StockLedgerStore::new(),
            received: Vec::new(),
            issued: Vec::new(),
            rows,
            directory,
            last_error: None,
            retired_stock_rows: BTreeSet::new(),
            metrics: Arc::new(LedgerMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<LedgerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn load(config: LedgerConfig, rows: S, directory: D) -> LedgerResult<Self> {
        let mut ledger = Self::new(config, rows, directory);
        ledger.refresh().await?;
        Ok(ledger)
    }

    // ==================== ERROR BOOKKEEPING ====================

    fn rejected(&self, err: LedgerError) -> LedgerError {
        self.metrics.record_rejection();
        log::warn!("Rejected: {}", err);
        err
    }

    fn persistence_failed(&mut self, err: LedgerError) -> LedgerError {
        let err = err.into_persistence();
        log::error!("❌ {}", err);
        self.metrics.record_persistence_failure();
        self.last_error = Some(err.to_string());
        err
    }

    /// Runs every queued write, even after a failure, and returns the first error.
    async fn flush(&mut self, writes: Vec<PendingWrite>) -> LedgerResult<()> {
        let mut first_error = None;
        for write in writes {
            let result = match &write {
                PendingWrite::Stock(row) => self.rows.insert_or_replace(row, StockRow::CONFLICT_KEY).await,
                PendingWrite::DeleteStock(id) => self.rows.delete::<StockRow>(id).await,
                PendingWrite::Received(row) => self.rows.insert_or_replace(row, ReceivedRow::CONFLICT_KEY).await,
                PendingWrite::UpdateReceived(row) => self.rows.update(row, &row.id).await,
                PendingWrite::DeleteReceived(id) => self.rows.delete::<ReceivedRow>(id).await,
                PendingWrite::Issued(row) => self.rows.insert_or_replace(row, IssuedRow::CONFLICT_KEY).await,
                PendingWrite::UpdateIssued(row) => self.rows.update(row, &row.id).await,
                PendingWrite::DeleteIssued(id) => self.rows.delete::<IssuedRow>(id).await,
            };
            if let Err(e) = result {
                let e = self.persistence_failed(e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply_local(&mut self, delta: StockDelta<'_>) -> LedgerResult<StockEntry> {
        reconciliation::apply_delta(
            &mut self.stock,
            &self.directory,
            delta,
            self.config.default_low_stock_threshold,
        )
    }

    /// Reverses `reverse` (when its model still has an entry) and applies
    /// `forward` on a copy of the stock book. Nothing is committed here.
    fn rebalanced(
        &self,
        reverse: Option<StockDelta<'_>>,
        forward: Option<StockDelta<'_>>,
    ) -> LedgerResult<(StockLedgerStore, Vec<StockRow>)> {
        let threshold = self.config.default_low_stock_threshold;
        let mut scratch = self.stock.clone();
        let mut touched = Vec::new();

        if let Some(delta) = reverse {
            if scratch.find_by_model(delta.model, None, None).is_some() {
                reconciliation::apply_delta(&mut scratch, &self.directory, delta, threshold)?;
                touched.push(normalize_model(delta.model));
            }
        }
        if let Some(delta) = forward {
            if delta.change < 0 {
                check_issuable(&scratch, delta.model, -delta.change)?;
            }
            reconciliation::apply_delta(&mut scratch, &self.directory, delta, threshold)?;
            touched.push(normalize_model(delta.model));
        }

        touched.sort();
        touched.dedup();
        let rows = touched
            .iter()
            .filter_map(|model| scratch.find_by_model(model, None, None))
            .map(StockRow::from)
            .collect();
        Ok((scratch, rows))
    }

    // ==================== RECEIVED ====================

    #[tracing::instrument(skip(self, request), fields(item_type = %request.item_type, quantity = request.quantity))]
    pub async fn record_received(&mut self, request: ReceiveItemRequest) -> LedgerResult<ReceivedItem> {
        request.check().map_err(|e| self.rejected(e))?;

        let mut item = request.into_item(Uuid::new_v4().to_string());
        label_printer(&self.directory, &item.printer_id, &mut item.printer_name);

        let mut writes = vec![PendingWrite::Received(ReceivedRow::from(&item))];
        if let Some(model) = item.stock_model() {
            let delta = StockDelta::new(model, item.quantity)
                .with_color(item.toner_color)
                .with_printer(item.printer_id.as_deref());
            let entry = self.apply_local(delta)?;
            writes.push(PendingWrite::Stock(StockRow::from(&entry)));
        }

        log::info!(
            "📥 Received {} × {} from {}",
            item.quantity,
            item.toner_model.as_deref().unwrap_or(item.item_type.as_str()),
            item.supplier
        );
        self.received.insert(0, item.clone());
        self.metrics.record_receipt();

        self.flush(writes).await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn edit_received(&mut self, id: &str, patch: UpdateReceivedItemRequest) -> LedgerResult<ReceivedItem> {
        patch.check().map_err(|e| self.rejected(e))?;
        let idx = self
            .received
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| self.rejected(LedgerError::received_item_not_found(id)))?;

        let before = self.received[idx].clone();
        let mut after = before.clone();
        let relabel = patch.printer_id.is_some() && patch.printer_name.is_none();
        after.apply(patch);
        after.toner_model = after.toner_model.map(|m| m.trim().to_string());
        after.supplier = after.supplier.trim().to_string();
        if relabel {
            after.printer_name = None;
            label_printer(&self.directory, &after.printer_id, &mut after.printer_name);
        }

        let mut writes = Vec::new();
        let moved = before.stock_model().map(normalize_model) != after.stock_model().map(normalize_model)
            || before.quantity != after.quantity;
        if self.config.rebalance_on_edit && moved {
            let reverse = before.stock_model().map(|m| StockDelta::new(m, -before.quantity));
            let forward = after.stock_model().map(|m| {
                StockDelta::new(m, after.quantity)
                    .with_color(after.toner_color)
                    .with_printer(after.printer_id.as_deref())
            });
            let (stock, rows) = self.rebalanced(reverse, forward).map_err(|e| self.rejected(e))?;
            self.stock = stock;
            writes.extend(rows.into_iter().map(PendingWrite::Stock));
        }

        writes.push(PendingWrite::UpdateReceived(ReceivedRow::from(&after)));
        self.received[idx] = after.clone();
        log::info!("Updated received item {}", id);

        self.flush(writes).await?;
        Ok(after)
    }

    /// Removes the record and takes its quantity back out of stock.
    #[tracing::instrument(skip(self))]
    pub async fn delete_received(&mut self, id: &str) -> LedgerResult<ReceivedItem> {
        let idx = self
            .received
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| self.rejected(LedgerError::received_item_not_found(id)))?;
        let item = self.received.remove(idx);

        let mut writes = Vec::new();
        if let Some(model) = item.stock_model() {
            if self.stock.find_by_model(model, None, None).is_some() {
                let entry = self.apply_local(StockDelta::new(model, -item.quantity))?;
                writes.push(PendingWrite::Stock(StockRow::from(&entry)));
            } else {
                log::warn!("No stock entry for '{}', receipt {} removed without compensation", model, item.id);
            }
        }
        writes.push(PendingWrite::DeleteReceived(item.id.clone()));
        log::info!("🗑️ Deleted received item {}", id);

        self.flush(writes).await?;
        Ok(item)
    }

    // ==================== ISSUED ====================

    #[tracing::instrument(skip(self, request), fields(item_type = %request.item_type, quantity = request.quantity))]
    pub async fn record_issued(&mut self, request: IssueItemRequest) -> LedgerResult<IssuedItem> {
        request.check().map_err(|e| self.rejected(e))?;
        if let Some(model) = request.stock_model() {
            check_issuable(&self.stock, model, request.quantity)
                .map(|_| ())
                .map_err(|e| self.rejected(e))?;
        }

        let mut item = request.into_item(Uuid::new_v4().to_string());
        label_printer(&self.directory, &item.printer_id, &mut item.printer_name);

        let mut writes = vec![PendingWrite::Issued(IssuedRow::from(&item))];
        if let Some(model) = item.stock_model() {
            let entry = self.apply_local(StockDelta::new(model, -item.quantity))?;
            writes.push(PendingWrite::Stock(StockRow::from(&entry)));
        }

        log::info!(
            "📤 Issued {} × {} to {}",
            item.quantity,
            item.toner_model.as_deref().unwrap_or(item.item_type.as_str()),
            item.issued_to
        );
        self.issued.insert(0, item.clone());
        self.metrics.record_issue();

        self.flush(writes).await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn edit_issued(&mut self, id: &str, patch: UpdateIssuedItemRequest) -> LedgerResult<IssuedItem> {
        patch.check().map_err(|e| self.rejected(e))?;
        let idx = self
            .issued
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| self.rejected(LedgerError::issued_item_not_found(id)))?;

        let before = self.issued[idx].clone();
        let mut after = before.clone();
        let relabel = patch.printer_id.is_some() && patch.printer_name.is_none();
        after.apply(patch);
        after.toner_model = after.toner_model.map(|m| m.trim().to_string());
        after.issued_to = after.issued_to.trim().to_string();
        if relabel {
            after.printer_name = None;
            label_printer(&self.directory, &after.printer_id, &mut after.printer_name);
        }

        let mut writes = Vec::new();
        let moved = before.stock_model().map(normalize_model) != after.stock_model().map(normalize_model)
            || before.quantity != after.quantity;
        if self.config.rebalance_on_edit && moved {
            let reverse = before.stock_model().map(|m| StockDelta::new(m, before.quantity));
            let forward = after.stock_model().map(|m| StockDelta::new(m, -after.quantity));
            let (stock, rows) = self.rebalanced(reverse, forward).map_err(|e| self.rejected(e))?;
            self.stock = stock;
            writes.extend(rows.into_iter().map(PendingWrite::Stock));
        }

        writes.push(PendingWrite::UpdateIssued(IssuedRow::from(&after)));
        self.issued[idx] = after.clone();
        log::info!("Updated issued item {}", id);

        self.flush(writes).await?;
        Ok(after)
    }

    /// Removes the record and puts its quantity back into stock.
    #[tracing::instrument(skip(self))]
    pub async fn delete_issued(&mut self, id: &str) -> LedgerResult<IssuedItem> {
        let idx = self
            .issued
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| self.rejected(LedgerError::issued_item_not_found(id)))?;
        let item = self.issued.remove(idx);

        let mut writes = Vec::new();
        if let Some(model) = item.stock_model() {
            if self.stock.find_by_model(model, None, None).is_some() {
                let entry = self.apply_local(StockDelta::new(model, item.quantity))?;
                writes.push(PendingWrite::Stock(StockRow::from(&entry)));
            } else {
                log::warn!("No stock entry for '{}', issuance {} removed without compensation", model, item.id);
            }
        }
        writes.push(PendingWrite::DeleteIssued(item.id.clone()));
        log::info!("🗑️ Deleted issued item {}", id);

        self.flush(writes).await?;
        Ok(item)
    }

    // ==================== STOCK ENTRIES ====================

    /// Direct quantity change for `model`, persisted like any other movement.
    #[tracing::instrument(skip(self))]
    pub async fn apply_delta(
        &mut self,
        model: &str,
        change: i64,
        color: Option<TonerColor>,
        printer_id: Option<&str>,
    ) -> LedgerResult<StockEntry> {
        let delta = StockDelta::new(model, change).with_color(color).with_printer(printer_id);
        let entry = self.apply_local(delta).map_err(|e| self.rejected(e))?;
        self.flush(vec![PendingWrite::Stock(StockRow::from(&entry))]).await?;
        Ok(entry)
    }

    /// Seeds a zero-quantity entry. Rolled back if the row cannot be written.
    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    pub async fn create_stock_entry(&mut self, request: CreateStockEntryRequest) -> LedgerResult<StockEntry> {
        request.validate().map_err(|e| self.rejected(e.into()))?;
        let entry = create_entry(
            &mut self.stock,
            &self.directory,
            &request,
            self.config.default_low_stock_threshold,
        )
        .map_err(|e| self.rejected(e))?;

        let row = StockRow::from(&entry);
        if let Err(e) = self.rows.insert_or_replace(&row, StockRow::CONFLICT_KEY).await {
            self.stock.remove(&entry.id);
            log::warn!("Rolled back creation of '{}'", entry.model);
            return Err(self.persistence_failed(e));
        }
        Ok(entry)
    }

    /// Changes descriptive fields of an entry. The quantity is left alone.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_stock_entry(&mut self, id: &str, patch: UpdateStockEntryRequest) -> LedgerResult<StockEntry> {
        patch.validate().map_err(|e| self.rejected(e.into()))?;
        let before = self
            .stock
            .find(id)
            .cloned()
            .ok_or_else(|| self.rejected(LedgerError::stock_entry_not_found(id)))?;

        let mut after = before.clone();
        if let Some(model) = patch.model {
            validate_required(&model, "model").map_err(|e| self.rejected(e))?;
            let model = model.trim();
            if let Some(other) = self.stock.find_by_model(model, None, None) {
                if other.id != before.id {
                    return Err(self.rejected(LedgerError::duplicate_model(model)));
                }
            }
            after.model = model.to_string();
        }
        if let Some(color) = patch.color {
            after.color = color;
        }
        if let Some(printer_id) = patch.printer_id {
            let printer_id = printer_id
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            after.printer_name = printer_id.as_deref().and_then(|p| self.directory.printer_label(p));
            after.printer_id = printer_id;
        }
        if let Some(threshold) = patch.low_stock_threshold {
            after.low_stock_threshold = threshold;
        }

        let stored = self
            .stock
            .replace(after)
            .cloned()
            .ok_or_else(|| LedgerError::stock_entry_not_found(id))?;

        // by id: a rename changes the conflict key
        if let Err(e) = self.rows.update(&StockRow::from(&stored), &stored.id).await {
            self.stock.restore(before);
            log::warn!("Reverted update of stock entry {}", id);
            return Err(self.persistence_failed(e));
        }
        log::info!("Updated stock entry '{}'", stored.model);
        Ok(stored)
    }

    /// Stocktake correction: sets the entry to `counted` units.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&mut self, id: &str, counted: i64) -> LedgerResult<StockEntry> {
        if counted < 0 {
            return Err(self.rejected(LedgerError::validation("Counted quantity cannot be negative")));
        }
        let (model, current) = self
            .stock
            .find(id)
            .map(|e| (e.model.clone(), e.current_stock))
            .ok_or_else(|| self.rejected(LedgerError::stock_entry_not_found(id)))?;

        let entry = self.apply_local(StockDelta::new(&model, counted - current))?;
        log::info!("Stocktake for '{}': {} -> {}", model, current, counted);
        self.flush(vec![PendingWrite::Stock(StockRow::from(&entry))]).await?;
        Ok(entry)
    }

    /// Explicit removal. Historical transactions are kept.
    #[tracing::instrument(skip(self))]
    pub async fn delete_stock_entry(&mut self, id: &str) -> LedgerResult<StockEntry> {
        let removed = match self.stock.remove(id) {
            Some(entry) => entry,
            None => return Err(self.rejected(LedgerError::stock_entry_not_found(id))),
        };
        log::info!("🗑️ Deleted stock entry '{}'", removed.model);
        self.flush(vec![PendingWrite::DeleteStock(removed.id.clone())]).await?;
        Ok(removed)
    }

    // ==================== RELOAD ====================

    /// Replaces the in-memory state with what the row store holds.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&mut self) -> LedgerResult<()> {
        let stock_rows: Vec<StockRow> = match self.rows.select_all().await {
            Ok(rows) => rows,
            Err(e) => return Err(self.persistence_failed(e)),
        };
        let received_rows: Vec<ReceivedRow> = match self.rows.select_all().await {
            Ok(rows) => rows,
            Err(e) => return Err(self.persistence_failed(e)),
        };
        let issued_rows: Vec<IssuedRow> = match self.rows.select_all().await {
            Ok(rows) => rows,
            Err(e) => return Err(self.persistence_failed(e)),
        };

        let mut entries: Vec<StockEntry> = convert_rows(stock_rows, STOCK_TABLE);
        let present: BTreeSet<String> = entries.iter().map(|e| e.id.clone()).collect();
        self.retired_stock_rows.retain(|id| present.contains(id));
        let stale: Vec<String> = self.retired_stock_rows.iter().cloned().collect();
        entries.retain(|e| !self.retired_stock_rows.contains(&e.id));

        let mut received: Vec<ReceivedItem> = convert_rows(received_rows, RECEIVED_TABLE);
        let mut issued: Vec<IssuedItem> = convert_rows(issued_rows, ISSUED_TABLE);

        received.sort_by(|a, b| b.received_date.cmp(&a.received_date));
        issued.sort_by(|a, b| b.issued_date.cmp(&a.issued_date));
        for item in &mut received {
            label_printer(&self.directory, &item.printer_id, &mut item.printer_name);
        }
        for item in &mut issued {
            label_printer(&self.directory, &item.printer_id, &mut item.printer_name);
        }

        let (stock, absorbed) = StockLedgerStore::from_entries(entries);
        self.stock = stock;
        self.received = received;
        self.issued = issued;
        self.last_error = None;
        self.metrics.record_refresh();

        log::info!(
            "🔄 Loaded {} stock entries, {} receipts, {} issuances",
            self.stock.len(),
            self.received.len(),
            self.issued.len()
        );
        self.retire_stock_rows(absorbed, stale).await
    }

    /// Persists a load-time merge: each surviving row is rewritten with the
    /// summed quantity, then the absorbed rows are deleted. From the moment
    /// its survivor is written, an absorbed row is ignored by later loads.
    async fn retire_stock_rows(&mut self, absorbed: Vec<StockEntry>, stale: Vec<String>) -> LedgerResult<()> {
        let mut first_error = None;

        let mut survivors: Vec<StockEntry> = Vec::new();
        for entry in &absorbed {
            if let Some(kept) = self.stock.find_by_model(&entry.model, None, None) {
                if !survivors.iter().any(|s| s.id == kept.id) {
                    survivors.push(kept.clone());
                }
            }
        }
        for kept in survivors {
            if let Err(e) = self.rows.update(&StockRow::from(&kept), &kept.id).await {
                first_error.get_or_insert(self.persistence_failed(e));
                continue;
            }
            for entry in absorbed.iter().filter(|e| kept.matches_model(&e.model)) {
                self.retired_stock_rows.insert(entry.id.clone());
            }
        }

        let pending: Vec<String> = stale
            .into_iter()
            .chain(absorbed.into_iter().map(|e| e.id))
            .filter(|id| self.retired_stock_rows.contains(id))
            .collect();
        for id in pending {
            match self.rows.delete::<StockRow>(&id).await {
                Ok(()) => {
                    log::info!("Retired duplicate stock row {}", id);
                    self.retired_stock_rows.remove(&id);
                }
                Err(e) => {
                    first_error.get_or_insert(self.persistence_failed(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ==================== QUERIES ====================

    pub fn get_stock_by_model(&self, model: &str, color: Option<&str>, printer_id: Option<&str>) -> Option<&StockEntry> {
        self.stock.find_by_model(model, color, printer_id)
    }

    pub fn stock_entries(&self) -> &[StockEntry] {
        self.stock.entries()
    }

    pub fn stock_status(&self) -> Vec<StockStatusView> {
        self.stock.entries().iter().map(StockStatusView::from).collect()
    }

    pub fn low_stock_entries(&self) -> Vec<&StockEntry> {
        self.stock.low_stock()
    }

    /// Newest first.
    pub fn received_items(&self) -> &[ReceivedItem] {
        &self.received
    }

    /// Newest first.
    pub fn issued_items(&self) -> &[IssuedItem] {
        &self.issued
    }

    pub fn summary(&self) -> StockSummary {
        StockSummary {
            total_models: self.stock.len(),
            total_units: self.stock.total_units(),
            low_stock_models: self.stock.low_stock().len(),
            received_records: self.received.len(),
            issued_records: self.issued.len(),
        }
    }

    /// Message of the last failed write, cleared by a successful `refresh`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn row_store(&self) -> &S {
        &self.rows
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::tests::sample_directory;
    use crate::directory::InMemoryDeviceDirectory;
    use crate::models::ItemType;
    use crate::persistence::MemoryRowStore;
    use chrono::NaiveDate;
    use tokio_test::{assert_err, assert_ok};

    type TestLedger = InventoryLedger<MemoryRowStore, InMemoryDeviceDirectory>;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn ledger() -> TestLedger {
        InventoryLedger::new(LedgerConfig::default(), MemoryRowStore::new(), sample_directory())
    }

    fn rebalancing_ledger() -> TestLedger {
        let config = LedgerConfig {
            rebalance_on_edit: true,
            ..LedgerConfig::default()
        };
        InventoryLedger::new(config, MemoryRowStore::new(), sample_directory())
    }

    fn stock_of<S: RowStore, D: DeviceDirectory>(ledger: &InventoryLedger<S, D>, model: &str) -> Option<i64> {
        ledger.get_stock_by_model(model, None, None).map(|e| e.current_stock)
    }

    async fn receive<S: RowStore, D: DeviceDirectory>(
        ledger: &mut InventoryLedger<S, D>,
        model: &str,
        qty: i64,
    ) -> ReceivedItem {
        ledger
            .record_received(ReceiveItemRequest::toner(model, qty, "Tech Supplies Ltd", date(15)))
            .await
            .unwrap()
    }

    async fn issue<S: RowStore, D: DeviceDirectory>(
        ledger: &mut InventoryLedger<S, D>,
        model: &str,
        qty: i64,
    ) -> LedgerResult<IssuedItem> {
        ledger
            .record_issued(IssueItemRequest::toner(model, qty, "John Doe", date(20)))
            .await
    }

    // ==================== SCENARIOS ====================

    #[tokio::test]
    async fn test_walkthrough_create_receive_issue_delete() {
        let mut ledger = ledger();

        // A: explicit creation at zero is already low stock
        let created = ledger
            .create_stock_entry(CreateStockEntryRequest::new("HP 85A").with_threshold(5))
            .await
            .unwrap();
        assert_eq!(created.current_stock, 0);
        assert!(created.is_low_stock());

        // B
        receive(&mut ledger, "HP 85A", 20).await;
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(20));

        // C
        let issued = issue(&mut ledger, "HP 85A", 5).await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(15));
        let err = issue(&mut ledger, "HP 85A", 16).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { available: 15, requested: 16, .. }));
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(15));
        assert_eq!(ledger.issued_items().len(), 1);

        // E
        ledger.delete_issued(&issued.id).await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(20));

        // F
        let err = ledger
            .create_stock_entry(CreateStockEntryRequest::new("hp 85a"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateModel(_)));
        assert_eq!(ledger.stock_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_issue_without_stock_entry_fails_and_creates_nothing() {
        let mut ledger = ledger();
        let err = issue(&mut ledger, "Canon 303", 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::NoStockEntry(_)));
        assert!(ledger.stock_entries().is_empty());
        assert!(ledger.issued_items().is_empty());
        assert!(ledger.row_store().is_empty());
        assert_eq!(ledger.metrics().rejections_total, 1);
    }

    #[tokio::test]
    async fn test_invalid_quantity_is_rejected_before_any_change() {
        let mut ledger = ledger();
        let result = ledger
            .record_received(ReceiveItemRequest::toner("HP 85A", 0, "Office Depot", date(15)))
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
        assert!(ledger.received_items().is_empty());
        assert!(ledger.stock_entries().is_empty());
    }

    // ==================== PROPERTIES ====================

    #[tokio::test]
    async fn test_conservation_and_uniqueness_across_casings() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 20).await;
        receive(&mut ledger, " hp 85a", 7).await;
        issue(&mut ledger, "HP 85a ", 4).await.unwrap();
        issue(&mut ledger, "hp 85A", 3).await.unwrap();

        assert_eq!(ledger.stock_entries().len(), 1);
        assert_eq!(ledger.stock_entries()[0].model, "HP 85A");
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(20 + 7 - 4 - 3));
        assert_eq!(ledger.row_store().row_count(STOCK_TABLE), 1);
    }

    #[tokio::test]
    async fn test_non_toner_items_do_not_move_stock() {
        let mut ledger = ledger();
        let mut request = ReceiveItemRequest::toner("", 10, "Office Depot", date(15));
        request.item_type = ItemType::Keyboard;
        request.toner_model = None;
        ledger.record_received(request).await.unwrap();

        assert_eq!(ledger.received_items().len(), 1);
        assert!(ledger.stock_entries().is_empty());
        assert_eq!(ledger.row_store().row_count(RECEIVED_TABLE), 1);
    }

    #[tokio::test]
    async fn test_compensation_is_idempotent() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 87A", 12).await;
        let item = receive(&mut ledger, "HP 87A", 4).await;
        let before_delete = stock_of(&ledger, "HP 87A").unwrap();

        ledger.delete_received(&item.id).await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 87A"), Some(before_delete - 4));
        receive(&mut ledger, "HP 87A", 4).await;
        assert_eq!(stock_of(&ledger, "HP 87A"), Some(before_delete));
    }

    #[tokio::test]
    async fn test_deleting_a_receipt_never_goes_negative() {
        let mut ledger = ledger();
        let item = receive(&mut ledger, "Canon 303", 8).await;
        issue(&mut ledger, "Canon 303", 6).await.unwrap();

        ledger.delete_received(&item.id).await.unwrap();
        assert_eq!(stock_of(&ledger, "Canon 303"), Some(0));
    }

    #[tokio::test]
    async fn test_delete_compensation_skipped_without_entry() {
        let mut ledger = ledger();
        let item = receive(&mut ledger, "HP 85A", 3).await;
        let entry_id = ledger.stock_entries()[0].id.clone();
        ledger.delete_stock_entry(&entry_id).await.unwrap();

        ledger.delete_received(&item.id).await.unwrap();
        assert!(ledger.stock_entries().is_empty());
        assert!(ledger.received_items().is_empty());
    }

    #[tokio::test]
    async fn test_low_stock_boundary() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 6).await;
        assert!(ledger.low_stock_entries().is_empty());

        issue(&mut ledger, "HP 85A", 1).await.unwrap();
        let low = ledger.low_stock_entries();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].current_stock, 5);
        assert!(ledger.stock_status()[0].is_low_stock);
    }

    #[tokio::test]
    async fn test_printer_name_comes_from_directory() {
        let mut ledger = ledger();
        let mut request = ReceiveItemRequest::toner("HP 85A", 5, "Office Depot", date(15));
        request.printer_id = Some("2".into());
        let item = ledger.record_received(request).await.unwrap();

        let label = "HD0002 - Jane Smith (LaserJet Pro)";
        assert_eq!(item.printer_name.as_deref(), Some(label));
        assert_eq!(ledger.stock_entries()[0].printer_name.as_deref(), Some(label));
    }

    // ==================== EDITS ====================

    #[tokio::test]
    async fn test_edit_does_not_rebalance_by_default() {
        let mut ledger = ledger();
        let item = receive(&mut ledger, "HP 85A", 20).await;

        let patch = UpdateReceivedItemRequest {
            quantity: Some(25),
            supplier: Some("Office Depot".into()),
            ..Default::default()
        };
        let edited = ledger.edit_received(&item.id, patch).await.unwrap();

        assert_eq!(edited.quantity, 25);
        assert_eq!(edited.supplier, "Office Depot");
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(20));
    }

    #[tokio::test]
    async fn test_edit_rebalances_when_enabled() {
        let mut ledger = rebalancing_ledger();
        let item = receive(&mut ledger, "HP 85A", 20).await;

        let patch = UpdateReceivedItemRequest {
            quantity: Some(25),
            ..Default::default()
        };
        ledger.edit_received(&item.id, patch).await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(25));

        // moving the receipt to another model
        let patch = UpdateReceivedItemRequest {
            toner_model: Some(Some("HP 87A".into())),
            ..Default::default()
        };
        ledger.edit_received(&item.id, patch).await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(0));
        assert_eq!(stock_of(&ledger, "HP 87A"), Some(25));
    }

    #[tokio::test]
    async fn test_rebalanced_issue_edit_respects_available_stock() {
        let mut ledger = rebalancing_ledger();
        receive(&mut ledger, "HP 85A", 10).await;
        let issued = issue(&mut ledger, "HP 85A", 4).await.unwrap();

        let patch = UpdateIssuedItemRequest {
            quantity: Some(11),
            ..Default::default()
        };
        let err = ledger.edit_issued(&issued.id, patch).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { available: 10, requested: 11, .. }));
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(6));
        assert_eq!(ledger.issued_items()[0].quantity, 4);

        let patch = UpdateIssuedItemRequest {
            quantity: Some(10),
            ..Default::default()
        };
        ledger.edit_issued(&issued.id, patch).await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(0));
    }

    #[tokio::test]
    async fn test_edit_unknown_record_is_not_found() {
        let mut ledger = ledger();
        let result = ledger.edit_issued("missing", UpdateIssuedItemRequest::default()).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert_err!(ledger.delete_received("missing").await);
    }

    // ==================== STOCK ENTRIES ====================

    #[tokio::test]
    async fn test_update_stock_entry_rename_and_relabel() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 9).await;
        receive(&mut ledger, "HP 87A", 2).await;
        let id = ledger.get_stock_by_model("HP 85A", None, None).unwrap().id.clone();

        let clash = UpdateStockEntryRequest {
            model: Some("hp 87a".into()),
            ..Default::default()
        };
        let err = ledger.update_stock_entry(&id, clash).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateModel(_)));

        let patch = UpdateStockEntryRequest {
            model: Some("HP 85X".into()),
            printer_id: Some(Some("2".into())),
            low_stock_threshold: Some(10),
            ..Default::default()
        };
        let updated = ledger.update_stock_entry(&id, patch).await.unwrap();
        assert_eq!(updated.model, "HP 85X");
        assert_eq!(updated.current_stock, 9);
        assert!(updated.is_low_stock());
        assert_eq!(updated.printer_name.as_deref(), Some("HD0002 - Jane Smith (LaserJet Pro)"));
        assert!(ledger.get_stock_by_model("HP 85A", None, None).is_none());

        let rows = ledger.row_store().raw_rows(STOCK_TABLE);
        assert!(rows.iter().any(|r| r["model"] == "HP 85X"));
    }

    #[tokio::test]
    async fn test_adjust_stock_sets_counted_quantity() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 20).await;
        let id = ledger.stock_entries()[0].id.clone();

        let entry = ledger.adjust_stock(&id, 13).await.unwrap();
        assert_eq!(entry.current_stock, 13);
        assert!(matches!(
            ledger.adjust_stock(&id, -1).await,
            Err(LedgerError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_public_apply_delta_persists() {
        let mut ledger = ledger();
        let entry = ledger.apply_delta("HP 85A", 4, Some(TonerColor::Black), None).await.unwrap();
        assert_eq!(entry.current_stock, 4);
        assert_eq!(ledger.row_store().row_count(STOCK_TABLE), 1);
        assert_err!(ledger.apply_delta(" ", 4, None, None).await);
    }

    #[tokio::test]
    async fn test_summary() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 20).await;
        receive(&mut ledger, "Canon 303", 3).await;
        issue(&mut ledger, "HP 85A", 2).await.unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.total_models, 2);
        assert_eq!(summary.total_units, 21);
        assert_eq!(summary.low_stock_models, 1);
        assert_eq!(summary.received_records, 2);
        assert_eq!(summary.issued_records, 1);
    }

    // ==================== PERSISTENCE ====================

    #[tokio::test]
    async fn test_write_failure_keeps_local_change_and_reports() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 10).await;
        ledger.row_store().set_fail_writes(true);

        let err = issue(&mut ledger, "HP 85A", 3).await.unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceError(_)));
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(7));
        assert_eq!(ledger.issued_items().len(), 1);
        assert!(ledger.last_error().is_some());
        assert_eq!(ledger.metrics().persistence_failures_total, 2);

        // reload from the store reconciles to what was persisted
        ledger.row_store().set_fail_writes(false);
        assert_ok!(ledger.refresh().await);
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(10));
        assert!(ledger.issued_items().is_empty());
        assert!(ledger.last_error().is_none());
    }

    #[tokio::test]
    async fn test_failed_create_is_rolled_back() {
        let mut ledger = ledger();
        ledger.row_store().set_fail_writes(true);

        let err = ledger
            .create_stock_entry(CreateStockEntryRequest::new("HP 85A"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceError(_)));
        assert!(ledger.stock_entries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_stock_update_is_reverted() {
        let mut ledger = ledger();
        receive(&mut ledger, "HP 85A", 4).await;
        let id = ledger.stock_entries()[0].id.clone();
        ledger.row_store().set_fail_writes(true);

        let patch = UpdateStockEntryRequest {
            low_stock_threshold: Some(1),
            ..Default::default()
        };
        assert_err!(ledger.update_stock_entry(&id, patch).await);
        assert_eq!(ledger.stock_entries()[0].low_stock_threshold, 5);
    }

    #[tokio::test]
    async fn test_refresh_round_trip_orders_history() {
        let rows = MemoryRowStore::new();
        let mut writer = InventoryLedger::new(LedgerConfig::default(), rows.clone(), sample_directory());
        writer
            .record_received(ReceiveItemRequest::toner("HP 85A", 20, "Tech Supplies Ltd", date(15)))
            .await
            .unwrap();
        writer
            .record_received(ReceiveItemRequest::toner("HP 87A", 12, "Office Depot", date(22)))
            .await
            .unwrap();
        issue(&mut writer, "HP 85A", 2).await.unwrap();

        let reader = InventoryLedger::load(LedgerConfig::default(), rows, InMemoryDeviceDirectory::default())
            .await
            .unwrap();
        assert_eq!(reader.summary(), writer.summary());
        assert_eq!(reader.received_items()[0].received_date, date(22));
        assert_eq!(stock_of(&reader, "hp 85a"), Some(18));
    }

    #[tokio::test]
    async fn test_long_note_edit_rejected_before_change() {
        let mut ledger = ledger();
        let item = receive(&mut ledger, "HP 85A", 3).await;

        let patch = UpdateReceivedItemRequest {
            notes: Some(Some("x".repeat(1001))),
            ..Default::default()
        };
        let err = ledger.edit_received(&item.id, patch).await.unwrap_err();
        assert!(matches!(err, LedgerError::ValidationError(_)));
        assert_eq!(ledger.received_items()[0].notes, None);
        assert!(ledger.last_error().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_delta_is_rejected() {
        let mut ledger = ledger();
        ledger.apply_delta("HP 85A", 5, None, None).await.unwrap();

        let err = ledger.apply_delta("HP 85A", i64::MAX, None, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::ValidationError(_)));
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(5));
    }

    #[tokio::test]
    async fn test_shared_metrics_handle() {
        let metrics = Arc::new(LedgerMetrics::new());
        let mut ledger = ledger().with_metrics(metrics.clone());
        receive(&mut ledger, "HP 85A", 3).await;
        assert_eq!(metrics.snapshot().receipts_total, 1);
        assert_eq!(metrics.snapshot(), ledger.metrics());
    }

    // ==================== SQLITE ====================

    async fn sqlite_rows() -> crate::persistence::SqliteRowStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        crate::persistence::SqliteRowStore::new(pool)
    }

    async fn insert_stock_row(rows: &crate::persistence::SqliteRowStore, id: &str, model: &str, qty: i64) {
        sqlx::query(
            "INSERT INTO toner_stock (id, model, current_stock, low_stock_threshold, last_updated) VALUES (?, ?, ?, 5, '2024-01-25')",
        )
            .bind(id)
            .bind(model)
            .bind(qty)
            .execute(rows.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_legacy_duplicates_are_merged_once_in_the_store() {
        let rows = sqlite_rows().await;
        // NOCASE neither trims nor folds non-ASCII case
        insert_stock_row(&rows, "1", "HP 85A", 10).await;
        insert_stock_row(&rows, "3", "HP 85A ", 4).await;
        insert_stock_row(&rows, "4", "ÉCO 12", 2).await;
        insert_stock_row(&rows, "5", "éco 12", 1).await;

        let mut ledger = InventoryLedger::load(LedgerConfig::default(), rows.clone(), sample_directory())
            .await
            .unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(14));
        assert_eq!(stock_of(&ledger, "éco 12"), Some(3));

        receive(&mut ledger, "HP 85A", 1).await;
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(15));
        ledger.refresh().await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(15));

        receive(&mut ledger, "HP 85A", 1).await;
        ledger.refresh().await.unwrap();
        assert_eq!(stock_of(&ledger, "HP 85A"), Some(16));
        assert_eq!(stock_of(&ledger, "ÉCO 12"), Some(3));

        let persisted: Vec<StockRow> = rows.select_all().await.unwrap();
        let mut ids: Vec<_> = persisted.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "4"]);
        assert!(ledger.last_error().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_through_the_ledger() {
        let rows = sqlite_rows().await;
        let mut ledger = InventoryLedger::new(LedgerConfig::default(), rows.clone(), sample_directory());
        receive(&mut ledger, "HP 85A", 20).await;
        let issued = issue(&mut ledger, "HP 85A", 5).await.unwrap();
        ledger.delete_issued(&issued.id).await.unwrap();
        issue(&mut ledger, "hp 85a", 2).await.unwrap();

        let reloaded = InventoryLedger::load(LedgerConfig::default(), rows, sample_directory())
            .await
            .unwrap();
        assert_eq!(reloaded.summary(), ledger.summary());
        assert_eq!(stock_of(&reloaded, "HP 85A"), Some(18));
    }
}
