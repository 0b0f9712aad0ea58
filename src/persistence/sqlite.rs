// src/persistence/sqlite.rs
//! SQLite-backed row store (sqlx).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

use super::{ensure_column, Row, RowStore};
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone)]
pub struct SqliteRowStore {
    pool: SqlitePool,
}

impl SqliteRowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => query.bind(int),
            None => query.bind(number.as_f64()),
        },
        Value::String(text) => query.bind(text.clone()),
        other => query.bind(other.to_string()),
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn insert_or_replace<R: Row>(&self, row: &R, conflict_key: &str) -> LedgerResult<()> {
        let columns = row.columns()?;
        ensure_column(&columns, R::TABLE, conflict_key)?;

        let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let assignments = names
            .iter()
            .filter(|name| **name != "id")
            .map(|name| format!("{name} = excluded.{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
            R::TABLE,
            names.join(", "),
            placeholders,
            conflict_key,
            assignments
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in &columns {
            query = bind_value(query, value);
        }
        query.execute(&self.pool).await?;

        log::debug!("Upserted {} row {} on {}", R::TABLE, row.id(), conflict_key);
        Ok(())
    }

    async fn select_all<R: Row>(&self) -> LedgerResult<Vec<R>> {
        let sql = format!("SELECT * FROM {}", R::TABLE);
        let rows = sqlx::query_as::<_, R>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn update<R: Row>(&self, row: &R, id: &str) -> LedgerResult<()> {
        let columns: Vec<(String, Value)> = row
            .columns()?
            .into_iter()
            .filter(|(name, _)| name != "id")
            .collect();
        let assignments = columns
            .iter()
            .map(|(name, _)| format!("{} = ?", name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", R::TABLE, assignments);

        let mut query = sqlx::query(&sql);
        for (_, value) in &columns {
            query = bind_value(query, value);
        }
        let result = query.bind(id.to_string()).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::row_not_found(R::TABLE, id));
        }
        Ok(())
    }

    async fn delete<R: Row>(&self, id: &str) -> LedgerResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
        let result = sqlx::query(&sql)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::row_not_found(R::TABLE, id));
        }
        Ok(())
    }
}
