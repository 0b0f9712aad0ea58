// src/monitoring.rs
use serde::Serialize;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::directory::DeviceDirectory;
use crate::ledger::InventoryLedger;
use crate::persistence::RowStore;

#[derive(Debug, Default)]
pub struct LedgerMetrics {
    receipts: AtomicU64,
    issues: AtomicU64,
    rejections: AtomicU64,
    persistence_failures: AtomicU64,
    refreshes: AtomicU64,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub receipts_total: u64,
    pub issues_total: u64,
    pub rejections_total: u64,
    pub persistence_failures_total: u64,
    pub refreshes_total: u64,
}

impl LedgerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_receipt(&self) {
        self.receipts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_issue(&self) {
        self.issues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            receipts_total: self.receipts.load(Ordering::Relaxed),
            issues_total: self.issues.load(Ordering::Relaxed),
            rejections_total: self.rejections.load(Ordering::Relaxed),
            persistence_failures_total: self.persistence_failures.load(Ordering::Relaxed),
            refreshes_total: self.refreshes.load(Ordering::Relaxed),
        }
    }
}

/// Logs every entry at or below its threshold.
pub fn report_low_stock<S: RowStore, D: DeviceDirectory>(ledger: &InventoryLedger<S, D>) -> usize {
    let low = ledger.low_stock_entries();
    for entry in &low {
        log::warn!(
            "⚠️ Low stock: '{}' has {} left (threshold {})",
            entry.model, entry.current_stock, entry.low_stock_threshold
        );
    }
    if low.is_empty() {
        log::info!("✅ All {} toner models above threshold", ledger.stock_entries().len());
    }
    low.len()
}

/// Periodically reloads the ledger from its row store, which also clears a
/// stale `last_error`. Returns `None` for a zero interval.
pub fn start_refresh_task<S, D>(
    ledger: Arc<Mutex<InventoryLedger<S, D>>>,
    every: Duration,
) -> Option<JoinHandle<()>>
where
    S: RowStore + 'static,
    D: DeviceDirectory + 'static,
{
    if every.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately; startup has already loaded
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let mut ledger = ledger.lock().await;
            match ledger.refresh().await {
                Ok(()) => {
                    let low = report_low_stock(&*ledger);
                    log::debug!("Periodic refresh done, {} low-stock models", low);
                }
                Err(e) => log::error!("Periodic refresh failed: {}", e),
            }
        }
    }))
}
