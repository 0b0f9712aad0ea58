// src/models/transaction.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{double_option, ItemType, TonerColor, TonerType};
use crate::error::{validate_max_length, validate_quantity, validate_required, LedgerResult};

/// Returns the toner model a transaction moves, if it moves stock at all.
fn stock_model(item_type: ItemType, toner_model: &Option<String>) -> Option<&str> {
    if item_type != ItemType::Toner {
        return None;
    }
    toner_model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
}

const MODEL_MAX_LEN: usize = 100;
const PRINTER_ID_MAX_LEN: usize = 100;
const NOTES_MAX_LEN: usize = 1000;

/// Length check for a patch field that may set or clear a value.
fn check_patch_text(value: &Option<Option<String>>, field: &str, max: usize) -> LedgerResult<()> {
    match value {
        Some(Some(text)) => validate_max_length(text, field, max),
        _ => Ok(()),
    }
}

/// Checks shared by both patch requests.
fn check_patch_fields(
    toner_model: &Option<Option<String>>,
    printer_id: &Option<Option<String>>,
    notes: &Option<Option<String>>,
) -> LedgerResult<()> {
    check_patch_text(toner_model, "Toner model", MODEL_MAX_LEN)?;
    check_patch_text(printer_id, "Printer ID", PRINTER_ID_MAX_LEN)?;
    check_patch_text(notes, "Notes", NOTES_MAX_LEN)
}

// ==================== RECEIVED ====================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedItem {
    pub id: String,
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toner_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toner_color: Option<TonerColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toner_type: Option<TonerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    pub quantity: i64,
    pub supplier: String,
    pub received_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ReceivedItem {
    pub fn stock_model(&self) -> Option<&str> {
        stock_model(self.item_type, &self.toner_model)
    }

    pub fn apply(&mut self, patch: UpdateReceivedItemRequest) {
        if let Some(item_type) = patch.item_type {
            self.item_type = item_type;
        }
        if let Some(model) = patch.toner_model {
            self.toner_model = model;
        }
        if let Some(color) = patch.toner_color {
            self.toner_color = color;
        }
        if let Some(toner_type) = patch.toner_type {
            self.toner_type = toner_type;
        }
        if let Some(printer_id) = patch.printer_id {
            self.printer_id = printer_id;
        }
        if let Some(printer_name) = patch.printer_name {
            self.printer_name = printer_name;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(supplier) = patch.supplier {
            self.supplier = supplier;
        }
        if let Some(date) = patch.received_date {
            self.received_date = date;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveItemRequest {
    pub item_type: ItemType,
    #[validate(length(max = 100, message = "Toner model cannot exceed 100 characters"))]
    pub toner_model: Option<String>,
    pub toner_color: Option<TonerColor>,
    pub toner_type: Option<TonerType>,
    #[validate(length(max = 100, message = "Printer ID cannot exceed 100 characters"))]
    pub printer_id: Option<String>,
    pub printer_name: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i64,
    #[validate(length(min = 1, max = 255, message = "Supplier must be between 1 and 255 characters"))]
    pub supplier: String,
    pub received_date: NaiveDate,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

impl ReceiveItemRequest {
    /// Minimal toner receipt; other fields can be set on the returned value.
    pub fn toner(model: impl Into<String>, quantity: i64, supplier: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            item_type: ItemType::Toner,
            toner_model: Some(model.into()),
            toner_color: None,
            toner_type: None,
            printer_id: None,
            printer_name: None,
            quantity,
            supplier: supplier.into(),
            received_date: date,
            notes: None,
        }
    }

    pub fn check(&self) -> LedgerResult<()> {
        self.validate()?;
        validate_quantity(self.quantity)?;
        validate_required(&self.supplier, "supplier")
    }

    pub fn into_item(self, id: String) -> ReceivedItem {
        ReceivedItem {
            id,
            item_type: self.item_type,
            toner_model: self.toner_model.map(|m| m.trim().to_string()),
            toner_color: self.toner_color,
            toner_type: self.toner_type,
            printer_id: self.printer_id,
            printer_name: self.printer_name,
            quantity: self.quantity,
            supplier: self.supplier.trim().to_string(),
            received_date: self.received_date,
            notes: self.notes,
            created_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReceivedItemRequest {
    pub item_type: Option<ItemType>,
    #[serde(default, deserialize_with = "double_option")]
    pub toner_model: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub toner_color: Option<Option<TonerColor>>,
    #[serde(default, deserialize_with = "double_option")]
    pub toner_type: Option<Option<TonerType>>,
    #[serde(default, deserialize_with = "double_option")]
    pub printer_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub printer_name: Option<Option<String>>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "Supplier must be between 1 and 255 characters"))]
    pub supplier: Option<String>,
    pub received_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateReceivedItemRequest {
    pub fn check(&self) -> LedgerResult<()> {
        self.validate()?;
        if let Some(ref supplier) = self.supplier {
            validate_required(supplier, "supplier")?;
        }
        check_patch_fields(&self.toner_model, &self.printer_id, &self.notes)
    }
}

// ==================== ISSUED ====================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedItem {
    pub id: String,
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toner_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toner_color: Option<TonerColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toner_type: Option<TonerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    pub quantity: i64,
    pub issued_to: String,
    pub issued_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl IssuedItem {
    pub fn stock_model(&self) -> Option<&str> {
        stock_model(self.item_type, &self.toner_model)
    }

    pub fn apply(&mut self, patch: UpdateIssuedItemRequest) {
        if let Some(item_type) = patch.item_type {
            self.item_type = item_type;
        }
        if let Some(model) = patch.toner_model {
            self.toner_model = model;
        }
        if let Some(color) = patch.toner_color {
            self.toner_color = color;
        }
        if let Some(toner_type) = patch.toner_type {
            self.toner_type = toner_type;
        }
        if let Some(printer_id) = patch.printer_id {
            self.printer_id = printer_id;
        }
        if let Some(printer_name) = patch.printer_name {
            self.printer_name = printer_name;
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(issued_to) = patch.issued_to {
            self.issued_to = issued_to;
        }
        if let Some(date) = patch.issued_date {
            self.issued_date = date;
        }
        if let Some(asset_id) = patch.asset_id {
            self.asset_id = asset_id;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssueItemRequest {
    pub item_type: ItemType,
    #[validate(length(max = 100, message = "Toner model cannot exceed 100 characters"))]
    pub toner_model: Option<String>,
    pub toner_color: Option<TonerColor>,
    pub toner_type: Option<TonerType>,
    #[validate(length(max = 100, message = "Printer ID cannot exceed 100 characters"))]
    pub printer_id: Option<String>,
    pub printer_name: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i64,
    #[validate(length(min = 1, max = 255, message = "Recipient must be between 1 and 255 characters"))]
    pub issued_to: String,
    pub issued_date: NaiveDate,
    pub asset_id: Option<String>,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

impl IssueItemRequest {
    pub fn toner(model: impl Into<String>, quantity: i64, issued_to: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            item_type: ItemType::Toner,
            toner_model: Some(model.into()),
            toner_color: None,
            toner_type: None,
            printer_id: None,
            printer_name: None,
            quantity,
            issued_to: issued_to.into(),
            issued_date: date,
            asset_id: None,
            notes: None,
        }
    }

    pub fn check(&self) -> LedgerResult<()> {
        self.validate()?;
        validate_quantity(self.quantity)?;
        validate_required(&self.issued_to, "issuedTo")
    }

    pub fn stock_model(&self) -> Option<&str> {
        stock_model(self.item_type, &self.toner_model)
    }

    pub fn into_item(self, id: String) -> IssuedItem {
        IssuedItem {
            id,
            item_type: self.item_type,
            toner_model: self.toner_model.map(|m| m.trim().to_string()),
            toner_color: self.toner_color,
            toner_type: self.toner_type,
            printer_id: self.printer_id,
            printer_name: self.printer_name,
            quantity: self.quantity,
            issued_to: self.issued_to.trim().to_string(),
            issued_date: self.issued_date,
            asset_id: self.asset_id,
            notes: self.notes,
            created_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssuedItemRequest {
    pub item_type: Option<ItemType>,
    #[serde(default, deserialize_with = "double_option")]
    pub toner_model: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub toner_color: Option<Option<TonerColor>>,
    #[serde(default, deserialize_with = "double_option")]
    pub toner_type: Option<Option<TonerType>>,
    #[serde(default, deserialize_with = "double_option")]
    pub printer_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub printer_name: Option<Option<String>>,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: Option<i64>,
    #[validate(length(min = 1, max = 255, message = "Recipient must be between 1 and 255 characters"))]
    pub issued_to: Option<String>,
    pub issued_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub asset_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateIssuedItemRequest {
    pub fn check(&self) -> LedgerResult<()> {
        self.validate()?;
        if let Some(ref issued_to) = self.issued_to {
            validate_required(issued_to, "issuedTo")?;
        }
        check_patch_fields(&self.toner_model, &self.printer_id, &self.notes)
    }
}
