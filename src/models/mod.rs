// src/models/mod.rs

// 1. Объявляем модули
pub mod device;
pub mod enums;
pub mod stock;
pub mod transaction;

// 2. Ре-экспортируем содержимое, чтобы структуры были доступны как crate::models::StructName
pub use device::*;
pub use enums::*;
pub use stock::*;
pub use transaction::*;

use serde::{Deserialize, Deserializer, Serialize};

// ==================== COMMON / SHARED ====================

/// Keeps "field present and null" apart from "field absent" in patch requests:
/// absent -> `None` (via `#[serde(default)]`), null -> `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Сводка для дашборда
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub total_models: usize,
    pub total_units: i64,
    pub low_stock_models: usize,
    pub received_records: usize,
    pub issued_records: usize,
}
