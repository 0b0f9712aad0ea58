// src/error.rs
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum LedgerError {
    ValidationError(String),
    InsufficientStock {
        model: String,
        available: i64,
        requested: i64,
    },
    NoStockEntry(String),
    DuplicateModel(String),
    NotFound(String),
    PersistenceError(String),
    DatabaseError(sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Shape of an error as reported to callers (UI toasts, JSON logs).
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub success: bool,
    pub kind: &'static str,
    pub message: String,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LedgerError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            LedgerError::InsufficientStock { model, available, requested } => write!(
                f,
                "Insufficient stock for '{}'. Available: {}, Requested: {}",
                model, available, requested
            ),
            LedgerError::NoStockEntry(model) => write!(f, "No stock entry for toner model '{}'", model),
            LedgerError::DuplicateModel(model) => {
                write!(f, "Stock entry for toner model '{}' already exists", model)
            }
            LedgerError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            LedgerError::PersistenceError(msg) => write!(f, "Persistence Error: {}", msg),
            LedgerError::DatabaseError(err) => write!(f, "Database Error: {}", err),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::DatabaseError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for LedgerError {
    fn from(err: validator::ValidationErrors) -> Self {
        LedgerError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::PersistenceError(format!("Row encoding failed: {}", err))
    }
}

impl LedgerError {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::ValidationError(_) => "validation",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::NoStockEntry(_) => "no_stock_entry",
            LedgerError::DuplicateModel(_) => "duplicate_model",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::PersistenceError(_) | LedgerError::DatabaseError(_) => "persistence",
        }
    }

    /// Ошибки, при которых состояние ledger не менялось
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            LedgerError::PersistenceError(_) | LedgerError::DatabaseError(_)
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            success: false,
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    /// Any store-side failure, folded into the single persistence kind.
    pub fn into_persistence(self) -> Self {
        match self {
            LedgerError::DatabaseError(err) => LedgerError::PersistenceError(err.to_string()),
            LedgerError::NotFound(msg) => LedgerError::PersistenceError(format!("Row missing: {}", msg)),
            other => other,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::ValidationError(msg.into())
    }

    pub fn insufficient_stock(model: &str, available: i64, requested: i64) -> Self {
        LedgerError::InsufficientStock {
            model: model.to_string(),
            available,
            requested,
        }
    }

    pub fn no_stock_entry(model: &str) -> Self {
        LedgerError::NoStockEntry(model.to_string())
    }

    pub fn duplicate_model(model: &str) -> Self {
        LedgerError::DuplicateModel(model.to_string())
    }

    pub fn stock_entry_not_found(id: &str) -> Self {
        LedgerError::NotFound(format!("Stock entry with ID '{}' not found", id))
    }

    pub fn received_item_not_found(id: &str) -> Self {
        LedgerError::NotFound(format!("Received item with ID '{}' not found", id))
    }

    pub fn issued_item_not_found(id: &str) -> Self {
        LedgerError::NotFound(format!("Issued item with ID '{}' not found", id))
    }

    pub fn row_not_found(table: &str, id: &str) -> Self {
        LedgerError::NotFound(format!("Row '{}' not found in {}", id, table))
    }
}

// Функции валидации
pub fn validate_quantity(quantity: i64) -> Result<(), LedgerError> {
    if quantity <= 0 {
        return Err(LedgerError::ValidationError("Quantity must be greater than zero".to_string()));
    }
    if quantity > 1_000_000 {
        return Err(LedgerError::ValidationError("Quantity too large".to_string()));
    }
    Ok(())
}

/// Lengths are counted in characters, like SQLite's `length()`.
pub fn validate_max_length(value: &str, field: &str, max: usize) -> Result<(), LedgerError> {
    if value.chars().count() > max {
        return Err(LedgerError::ValidationError(format!("{} cannot exceed {} characters", field, max)));
    }
    Ok(())
}

pub fn validate_required(value: &str, field: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}
