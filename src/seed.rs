// src/seed.rs - Demo data for an empty ledger
use chrono::NaiveDate;

use crate::directory::DeviceDirectory;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::InventoryLedger;
use crate::models::{IssueItemRequest, ItemType, ReceiveItemRequest, TonerColor};
use crate::persistence::RowStore;

fn day(d: u32) -> LedgerResult<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .ok_or_else(|| LedgerError::validation(format!("invalid seed date 2024-01-{}", d)))
}

/// Replays the sample office data. Does nothing unless the ledger is empty.
/// Returns whether anything was written.
pub async fn seed_demo_data<S, D>(ledger: &mut InventoryLedger<S, D>) -> LedgerResult<bool>
where
    S: RowStore,
    D: DeviceDirectory,
{
    let summary = ledger.summary();
    if summary.total_models > 0 || summary.received_records > 0 || summary.issued_records > 0 {
        log::debug!("Ledger already holds data, skipping demo seed");
        return Ok(false);
    }

    log::info!("🌱 Seeding demo inventory data...");

    let mut toner = ReceiveItemRequest::toner("HP 85A", 20, "Tech Supplies Ltd", day(15)?);
    toner.toner_color = Some(TonerColor::Black);
    toner.notes = Some("Bulk order for Q1".to_string());
    ledger.record_received(toner).await?;

    let mut keyboards = ReceiveItemRequest::toner("", 10, "Office Depot", day(20)?);
    keyboards.item_type = ItemType::Keyboard;
    keyboards.toner_model = None;
    keyboards.notes = Some("Wireless keyboards".to_string());
    ledger.record_received(keyboards).await?;

    let mut issue = IssueItemRequest::toner("HP 85A", 2, "John Doe", day(25)?);
    issue.notes = Some("For office printer".to_string());
    ledger.record_issued(issue).await?;

    // on hand without receipt records
    ledger.apply_delta("HP 87A", 12, Some(TonerColor::Black), None).await?;
    ledger.apply_delta("Canon 303", 8, Some(TonerColor::Black), None).await?;

    log::info!("✅ Demo data seeded");
    Ok(true)
}
