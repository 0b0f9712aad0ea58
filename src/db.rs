// src/db.rs - Database migrations and setup

use sqlx::SqlitePool;
use anyhow::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Device registry, owned by the device module; the ledger only reads it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            asset_number TEXT CHECK(asset_number IS NULL OR length(asset_number) <= 50),
            type TEXT NOT NULL CHECK(type IN (
                'Computer', 'Laptop', 'Printer', 'Monitor', 'Phone', 'Other'
            )),
            serial_number TEXT NOT NULL,
            model_number TEXT,
            assigned_to TEXT,
            status TEXT NOT NULL DEFAULT 'Active',
            date_assigned TEXT,
            notes TEXT,
            department TEXT,
            warranty TEXT
        )
        "#,
    )
        .execute(pool)
        .await?;

    // One row per toner model; NOCASE makes the upsert key case-insensitive
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS toner_stock (
            id TEXT PRIMARY KEY,
            model TEXT NOT NULL UNIQUE COLLATE NOCASE CHECK(length(model) > 0 AND length(model) <= 100),
            color TEXT,
            printer_id TEXT,
            printer_name TEXT,
            current_stock INTEGER NOT NULL DEFAULT 0 CHECK(current_stock >= 0),
            low_stock_threshold INTEGER NOT NULL DEFAULT 5 CHECK(low_stock_threshold >= 0),
            last_updated TEXT NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS received_items (
            id TEXT PRIMARY KEY,
            item_type TEXT NOT NULL CHECK(item_type IN (
                'Toner', 'Keyboard', 'Mouse', 'Cable', 'Monitor', 'Other'
            )),
            toner_model TEXT,
            toner_color TEXT,
            toner_type TEXT,
            printer_id TEXT,
            printer_name TEXT,
            quantity INTEGER NOT NULL CHECK(quantity > 0),
            supplier TEXT NOT NULL CHECK(length(supplier) > 0 AND length(supplier) <= 255),
            received_date TEXT NOT NULL,
            notes TEXT CHECK(notes IS NULL OR length(notes) <= 1000),
            created_at DATETIME
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issued_items (
            id TEXT PRIMARY KEY,
            item_type TEXT NOT NULL CHECK(item_type IN (
                'Toner', 'Keyboard', 'Mouse', 'Cable', 'Monitor', 'Other'
            )),
            toner_model TEXT,
            toner_color TEXT,
            toner_type TEXT,
            printer_id TEXT,
            printer_name TEXT,
            quantity INTEGER NOT NULL CHECK(quantity > 0),
            issued_to TEXT NOT NULL CHECK(length(issued_to) > 0 AND length(issued_to) <= 255),
            issued_date TEXT NOT NULL,
            asset_id TEXT,
            notes TEXT CHECK(notes IS NULL OR length(notes) <= 1000),
            created_at DATETIME
        )
        "#,
    )
        .execute(pool)
        .await?;

    // ==================== INDEXES ====================
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_received_items_date ON received_items(received_date)",
        "CREATE INDEX IF NOT EXISTS idx_received_items_model ON received_items(toner_model)",
        "CREATE INDEX IF NOT EXISTS idx_issued_items_date ON issued_items(issued_date)",
        "CREATE INDEX IF NOT EXISTS idx_issued_items_model ON issued_items(toner_model)",
        "CREATE INDEX IF NOT EXISTS idx_devices_type ON devices(type)",
    ];
    for sql in indexes {
        sqlx::query(sql).execute(pool).await?;
    }

    log::info!("Database migrations completed");
    Ok(())
}
